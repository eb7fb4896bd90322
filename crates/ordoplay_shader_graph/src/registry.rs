// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function registry.
//!
//! Every generated or precompiled function body is registered under its
//! name exactly once per compilation pass. Callers emit dependencies before
//! the functions that call them, so iteration order is a valid declaration
//! order.

use crate::writer::ShaderWriter;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Destination for function bodies, keyed by function name
pub trait FunctionSink {
    /// Whether a body is already registered under `name`
    fn contains(&self, name: &str) -> bool;

    /// Register `body` under `name` unless one is present; returns whether it was inserted
    fn insert_body(&mut self, name: &str, body: String) -> bool;

    /// Generate and register a function body once
    ///
    /// `generate` only runs when no body exists yet for `name`.
    fn provide_function<F>(&mut self, name: &str, generate: F) -> bool
    where
        F: FnOnce(&mut ShaderWriter),
        Self: Sized,
    {
        if self.contains(name) {
            return false;
        }
        let mut writer = ShaderWriter::new();
        generate(&mut writer);
        let inserted = self.insert_body(name, writer.finish());
        if inserted {
            tracing::debug!("Registered shader function {}", name);
        }
        inserted
    }
}

/// Pass-scoped function registry
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, String>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a function body by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.functions.get(name).map(String::as_str)
    }

    /// Registered names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Name/body pairs, in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.functions.iter().map(|(name, body)| (name.as_str(), body.as_str()))
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// All bodies concatenated in registration order
    pub fn to_source(&self) -> String {
        let mut source = String::new();
        for body in self.functions.values() {
            source.push_str(body);
            source.push('\n');
        }
        source
    }
}

impl FunctionSink for FunctionRegistry {
    fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn insert_body(&mut self, name: &str, body: String) -> bool {
        if self.functions.contains_key(name) {
            return false;
        }
        self.functions.insert(name.to_string(), body);
        true
    }
}

/// Function registry shared by compilations running on several threads
///
/// Bodies are generated outside the lock. When two threads race on one
/// name the first insertion wins and the other body is dropped.
#[derive(Debug, Clone, Default)]
pub struct SharedFunctionRegistry {
    inner: Arc<Mutex<FunctionRegistry>>,
}

impl SharedFunctionRegistry {
    /// Create an empty shared registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> FunctionRegistry {
        self.inner.lock().clone()
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl FunctionSink for SharedFunctionRegistry {
    fn contains(&self, name: &str) -> bool {
        self.inner.lock().contains(name)
    }

    fn insert_body(&mut self, name: &str, body: String) -> bool {
        self.inner.lock().insert_body(name, body)
    }
}

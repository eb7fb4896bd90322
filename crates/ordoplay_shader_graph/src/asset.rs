// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sub-graph assets and their resolution.

use crate::shader_graph::ShaderGraph;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Serialized handle of a sub-graph asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetHandle(pub Uuid);

impl AssetHandle {
    /// Create a new random handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A named sub-graph definition as stored by the asset database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubGraphAsset {
    /// Asset handle
    pub handle: AssetHandle,
    /// Asset display name, used in generated function names
    pub name: String,
    /// The sub-graph definition
    pub graph: ShaderGraph,
}

impl SubGraphAsset {
    /// Create an asset with a fresh handle
    pub fn new(name: impl Into<String>, graph: ShaderGraph) -> Self {
        Self {
            handle: AssetHandle::new(),
            name: name.into(),
            graph,
        }
    }

    /// Set the handle
    pub fn with_handle(mut self, handle: AssetHandle) -> Self {
        self.handle = handle;
        self
    }
}

/// Resolves serialized handles to live sub-graph definitions
///
/// Resolution must be free of side effects; it is called repeatedly during
/// slot refresh, requirement queries and code generation.
pub trait AssetResolver {
    /// Look up a sub-graph asset
    fn resolve(&self, handle: AssetHandle) -> Option<Arc<SubGraphAsset>>;
}

/// Resolver that knows no assets
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetResolver for NoAssets {
    fn resolve(&self, _handle: AssetHandle) -> Option<Arc<SubGraphAsset>> {
        None
    }
}

/// In-memory asset store; owns every sub-graph definition it holds
#[derive(Debug, Default)]
pub struct AssetStore {
    assets: IndexMap<AssetHandle, Arc<SubGraphAsset>>,
}

impl AssetStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an asset, returning the shared definition
    pub fn insert(&mut self, asset: SubGraphAsset) -> Arc<SubGraphAsset> {
        let handle = asset.handle;
        let asset = Arc::new(asset);
        if self.assets.insert(handle, Arc::clone(&asset)).is_some() {
            tracing::debug!("Replaced sub-graph asset {:?}", handle);
        }
        asset
    }

    /// Remove an asset
    pub fn remove(&mut self, handle: AssetHandle) -> Option<Arc<SubGraphAsset>> {
        self.assets.shift_remove(&handle)
    }

    /// Get an asset by handle
    pub fn get(&self, handle: AssetHandle) -> Option<&Arc<SubGraphAsset>> {
        self.assets.get(&handle)
    }

    /// All assets, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SubGraphAsset>> {
        self.assets.values()
    }

    /// Number of assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetResolver for AssetStore {
    fn resolve(&self, handle: AssetHandle) -> Option<Arc<SubGraphAsset>> {
        self.assets.get(&handle).cloned()
    }
}

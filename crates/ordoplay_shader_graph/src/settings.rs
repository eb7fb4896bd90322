// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler settings.
//!
//! Settings are stored as RON so they can live next to the graph assets
//! they apply to. Every field has a default, so a settings file only needs
//! to name what it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Floating point precision used for every emitted scalar, vector and matrix type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Precision {
    /// Full 32-bit precision (`float`)
    #[default]
    Float,
    /// Half precision (`half`)
    Half,
}

impl Precision {
    /// Scalar type keyword for this precision
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Half => "half",
        }
    }
}

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid RON
    #[error("Invalid settings file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The settings could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),
}

/// Settings controlling how a graph is turned into shader text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Precision of emitted numeric types
    pub precision: Precision,
    /// Type name of the surface context passed to every sub-graph function
    pub context_type: String,
    /// Argument name of the surface context
    pub context_argument: String,
    /// Name of the generated entry function for the root graph
    pub entry_point: String,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            precision: Precision::Float,
            context_type: "SurfaceInputs".to_string(),
            context_argument: "IN".to_string(),
            entry_point: "SurfaceMain".to_string(),
        }
    }
}

impl CompilerSettings {
    /// Parse settings from a RON string
    pub fn from_ron_str(source: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(source)?)
    }

    /// Serialize settings to a pretty-printed RON string
    pub fn to_ron_string(&self) -> Result<String, SettingsError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron_str(&content)?;
        tracing::debug!("Loaded compiler settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }
}

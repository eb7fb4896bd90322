// SPDX-License-Identifier: MIT OR Apache-2.0
//! Crate-level error type.

use crate::graph::ConnectionError;
use crate::property::PropertyError;
use crate::settings::SettingsError;
use crate::slot::SlotError;
use crate::validation::ValidationError;

/// Any error raised while building or compiling a shader graph
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The graph was rejected before code generation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Slot synchronisation failed
    #[error(transparent)]
    Slot(#[from] SlotError),

    /// A property could not be mapped
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// A connection could not be made
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Settings could not be loaded
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Result alias for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

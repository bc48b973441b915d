// src/error.rs

//! Error types for spacktree
//!
//! Every failure in the provisioning workflow is fatal. The library reports
//! them through [`Error`]; the workflow wraps them in [`StageError`] so the
//! operator can see which stage (and which item) stopped the run.

use std::path::Path;
use thiserror::Error;

use crate::bootstrap::ProvisionStage;

/// Errors produced by the provisioning stages
#[derive(Debug, Error)]
pub enum Error {
    /// The Spack source archive could not be downloaded
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The archive is corrupt or does not have the expected layout
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// A filesystem operation failed
    #[error("I/O error: {0}")]
    IoError(String),

    /// A template is malformed or its placeholders do not match the parameters
    #[error("Template format error: {0}")]
    FormatError(String),

    /// A Spack subcommand could not be run or exited non-zero
    #[error("`{command}` failed: {reason}")]
    ExternalToolError { command: String, reason: String },

    /// The config file or a CLI value is invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A path needed by the activation script could not be located
    #[error("Resolution error: {0}")]
    ResolveError(String),
}

impl Error {
    /// Build an [`Error::IoError`] that names the path involved
    pub fn io(action: &str, path: &Path, err: std::io::Error) -> Self {
        Error::IoError(format!("Failed to {} {}: {}", action, path.display(), err))
    }
}

/// Result alias for spacktree operations
pub type Result<T> = std::result::Result<T, Error>;

/// A stage failure with the item being processed when it happened
#[derive(Debug, Error)]
#[error("{stage} stage failed{}: {source}", on_item(.item))]
pub struct StageError {
    pub stage: ProvisionStage,
    /// Package spec, compiler spec or path the stage was working on
    pub item: Option<String>,
    #[source]
    pub source: Error,
}

impl StageError {
    pub fn new(stage: ProvisionStage, source: Error) -> Self {
        Self {
            stage,
            item: None,
            source,
        }
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }
}

fn on_item(item: &Option<String>) -> String {
    item.as_ref()
        .map(|item| format!(" on {}", item))
        .unwrap_or_default()
}

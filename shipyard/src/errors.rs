//! Error types for the deployment engine

use thiserror::Error;

/// Main error type for the deployment engine
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unsupported platform '{platform}': {reason}")]
    UnsupportedPlatform { platform: String, reason: String },

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Transfer error: {0}")]
    TransferError(String),

    #[error("Deployment cancelled")]
    Cancelled,

    #[error("A deployment is already in progress")]
    DeploymentInProgress,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}

impl DeployError {
    /// True for the cancellation outcome, which is a terminal state of its
    /// own rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeployError::Cancelled)
    }
}

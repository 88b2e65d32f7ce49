//! Error types for CLI operations.

use contracts::ContractError;
use sync_coordinator::ResetError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ContractError),

    /// Command-line input that clap cannot check on its own
    #[error("Invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    /// Reset aborted
    #[error("Reset failed: {0}")]
    Reset(#[from] ResetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

//! Layered error definitions
//!
//! Categorized by source: config / store / general

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Store Errors =====
    /// A store lifecycle call (`stop` / `clear` / `start`) rejected
    #[error("store {operation} failed: {message}")]
    Store { operation: String, message: String },

    /// The store refused a call because of its current state
    #[error("store is {state}, cannot {operation}")]
    StoreState { state: String, operation: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create store failure error
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create store state error
    pub fn store_state(state: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::StoreState {
            state: state.into(),
            operation: operation.into(),
        }
    }
}

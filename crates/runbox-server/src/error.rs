//! Error types for the runbox server.

use runbox_core::SandboxError;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur in the runbox server.
///
/// None of these reach an `/execute` caller as an HTTP error; request-level
/// errors are rendered into a failure payload.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Sandbox construction error
    #[error("Sandbox setup failed: {0}")]
    Sandbox(#[from] SandboxError),

    /// Request body that could not be read as an execute request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a new invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new configuration error.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Sandbox(_) => "sandbox_error",
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::Config(_) => "config_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

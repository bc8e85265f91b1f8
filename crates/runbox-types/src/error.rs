//! Error types for payload encoding and decoding.

use thiserror::Error;

/// Errors raised while converting between wire payloads and execution results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    /// A file's content was not valid base64.
    #[error("Invalid base64 content for file '{filename}': {message}")]
    InvalidBase64 { filename: String, message: String },

    /// The `success` flag disagrees with the `error` field.
    #[error("Inconsistent payload: {message}")]
    InconsistentPayload { message: String },
}

impl PayloadError {
    /// Create a new invalid base64 error.
    pub fn invalid_base64(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBase64 {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a new inconsistent payload error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentPayload {
            message: message.into(),
        }
    }
}

/// Result type for payload operations.
pub type PayloadResult<T> = Result<T, PayloadError>;

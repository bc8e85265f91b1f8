//! Error types for the execution pipeline
//!
//! Every variant here is an internal fault from the caller's point of view:
//! non-zero exits and timeouts are ordinary outcomes and never surface as a
//! `SandboxError`. The [`Sandbox`](crate::Sandbox) converts any error that
//! escapes a run into a failure result using [`describe_error`].

use std::error::Error as StdError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to spawn interpreter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error during execution: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not prepare workspace: {0}")]
    Workspace(String),
    #[error("Failed to harvest '{path}': {source}")]
    Harvest {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Output reader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Render an error together with its chain of causes, one per line.
pub fn describe_error(err: &(dyn StdError + 'static)) -> String {
    let mut description = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        // thiserror messages often already embed their source
        if !description.contains(&cause_text) {
            description.push_str("\nCaused by: ");
            description.push_str(&cause_text);
        }
        source = cause.source();
    }
    description
}

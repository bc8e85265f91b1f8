//! Execution results and their wire representation.
//!
//! [`ExecutionResult`] is what the server produces and what clients end up
//! with after decoding; file contents are raw bytes. [`TransportPayload`] is
//! the same value with every file base64-encoded, and serializes to the flat
//! JSON object used on the wire:
//!
//! ```json
//! {"success": true, "output": "2\n", "error": null, "files": {}}
//! ```
//!
//! Both are tagged enums so that "error is present iff the run failed" holds
//! by construction. The flat JSON shape is produced and validated through a
//! private intermediate struct.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PayloadError, PayloadResult};

/// Harvested files keyed by bare file name.
pub type FileMap = BTreeMap<String, Vec<u8>>;

/// Harvested files keyed by bare file name, contents base64-encoded.
pub type EncodedFileMap = BTreeMap<String, String>;

/// Error reported when a run exceeds its wall-clock budget.
pub const TIMEOUT_MESSAGE: &str = "Execution timed out";

/// Error reported when a request carries no code.
pub const NO_CODE_MESSAGE: &str = "No code provided";

/// Outcome of one code submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The interpreter exited with status 0.
    Success { output: String, files: FileMap },
    /// The run failed: non-zero exit, timeout, rejected input or internal fault.
    ///
    /// `files` is only set when a failed run left partial output behind.
    Failure {
        output: String,
        error: String,
        files: Option<FileMap>,
    },
}

impl ExecutionResult {
    pub fn success(output: impl Into<String>, files: FileMap) -> Self {
        Self::Success {
            output: output.into(),
            files,
        }
    }

    pub fn failure(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failure {
            output: output.into(),
            error: error.into(),
            files: None,
        }
    }

    /// A failure with no output, used for faults that happen outside the user's code.
    pub fn fault(error: impl Into<String>) -> Self {
        Self::failure(String::new(), error)
    }

    pub fn timed_out() -> Self {
        Self::fault(TIMEOUT_MESSAGE)
    }

    pub fn no_code() -> Self {
        Self::fault(NO_CODE_MESSAGE)
    }

    /// Attach files left behind by a failed run. Empty maps and successful
    /// results are returned unchanged.
    pub fn with_partial_files(self, partial: FileMap) -> Self {
        match self {
            Self::Failure { output, error, .. } if !partial.is_empty() => Self::Failure {
                output,
                error,
                files: Some(partial),
            },
            other => other,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Success { output, .. } | Self::Failure { output, .. } => output,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn files(&self) -> Option<&FileMap> {
        match self {
            Self::Success { files, .. } => Some(files),
            Self::Failure { files, .. } => files.as_ref(),
        }
    }

    /// Base64-encode every file for transport.
    pub fn encode(&self) -> TransportPayload {
        match self {
            Self::Success { output, files } => TransportPayload::Success {
                output: output.clone(),
                files: encode_files(files),
            },
            Self::Failure {
                output,
                error,
                files,
            } => TransportPayload::Failure {
                output: output.clone(),
                error: error.clone(),
                files: files.as_ref().map(encode_files),
            },
        }
    }
}

/// Wire form of an [`ExecutionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WirePayload", into = "WirePayload")]
pub enum TransportPayload {
    Success {
        output: String,
        files: EncodedFileMap,
    },
    Failure {
        output: String,
        error: String,
        files: Option<EncodedFileMap>,
    },
}

impl TransportPayload {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Success { output, .. } | Self::Failure { output, .. } => output,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Decode every file back to raw bytes.
    pub fn decode(&self) -> PayloadResult<ExecutionResult> {
        match self {
            Self::Success { output, files } => Ok(ExecutionResult::Success {
                output: output.clone(),
                files: decode_files(files)?,
            }),
            Self::Failure {
                output,
                error,
                files,
            } => Ok(ExecutionResult::Failure {
                output: output.clone(),
                error: error.clone(),
                files: files.as_ref().map(decode_files).transpose()?,
            }),
        }
    }
}

impl From<&ExecutionResult> for TransportPayload {
    fn from(result: &ExecutionResult) -> Self {
        result.encode()
    }
}

impl From<ExecutionResult> for TransportPayload {
    fn from(result: ExecutionResult) -> Self {
        result.encode()
    }
}

impl TryFrom<&TransportPayload> for ExecutionResult {
    type Error = PayloadError;

    fn try_from(payload: &TransportPayload) -> PayloadResult<Self> {
        payload.decode()
    }
}

fn encode_files(files: &FileMap) -> EncodedFileMap {
    files
        .iter()
        .map(|(name, bytes)| (name.clone(), BASE64.encode(bytes)))
        .collect()
}

fn decode_files(files: &EncodedFileMap) -> PayloadResult<FileMap> {
    files
        .iter()
        .map(|(name, encoded)| {
            BASE64
                .decode(encoded)
                .map(|bytes| (name.clone(), bytes))
                .map_err(|e| PayloadError::invalid_base64(name, e.to_string()))
        })
        .collect()
}

/// Flat JSON shape shared by both variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WirePayload {
    success: bool,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    files: Option<EncodedFileMap>,
}

impl From<TransportPayload> for WirePayload {
    fn from(payload: TransportPayload) -> Self {
        match payload {
            TransportPayload::Success { output, files } => WirePayload {
                success: true,
                output: Some(output),
                error: None,
                files: Some(files),
            },
            TransportPayload::Failure {
                output,
                error,
                files,
            } => WirePayload {
                success: false,
                output: Some(output),
                error: Some(error),
                files,
            },
        }
    }
}

impl TryFrom<WirePayload> for TransportPayload {
    type Error = PayloadError;

    fn try_from(wire: WirePayload) -> PayloadResult<Self> {
        let output = wire.output.unwrap_or_default();
        match (wire.success, wire.error) {
            (true, None) => Ok(TransportPayload::Success {
                output,
                files: wire.files.unwrap_or_default(),
            }),
            (true, Some(error)) => Err(PayloadError::inconsistent(format!(
                "successful payload carries an error: {}",
                error
            ))),
            (false, Some(error)) => Ok(TransportPayload::Failure {
                output,
                error,
                files: wire.files,
            }),
            (false, None) => Err(PayloadError::inconsistent(
                "failed payload carries no error",
            )),
        }
    }
}

//! Shared protocol types for the runbox code-execution service
//!
//! Server and client both depend on this crate so the JSON exchanged over
//! `POST /execute` has a single definition. Results are modelled as tagged
//! enums; the flat `{success, output, error, files}` object only exists at
//! the serde boundary.
//!
//! ## Example
//!
//! ```rust
//! use runbox_types::{ExecutionResult, FileMap, TransportPayload};
//!
//! let mut files = FileMap::new();
//! files.insert("out.txt".to_string(), b"hi".to_vec());
//!
//! let payload = ExecutionResult::success("2\n", files).encode();
//! let json = serde_json::to_string(&payload).unwrap();
//! let back: TransportPayload = serde_json::from_str(&json).unwrap();
//!
//! assert_eq!(back.decode().unwrap().files().unwrap()["out.txt"], b"hi");
//! ```

pub mod error;
pub mod payload;
pub mod request;

pub use error::*;
pub use payload::*;
pub use request::*;

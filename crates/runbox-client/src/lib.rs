//! Client side of the runbox protocol
//!
//! A [`SandboxClient`] submits code and hands back the raw
//! [`TransportPayload`], either over HTTP ([`HttpSandboxClient`]) or by
//! calling an in-process handler ([`DirectSandboxClient`]). The
//! [`CodeInterpreterTool`] sits on top: it decodes the payload, writes the
//! returned files next to the caller and reduces everything to the single
//! string an agent tool call expects.

use anyhow::Result;
use async_trait::async_trait;
use runbox_types::TransportPayload;

pub mod direct_client;
pub mod files;
pub mod http_client;
pub mod tool;

pub use direct_client::DirectSandboxClient;
pub use files::save_files;
pub use http_client::{HttpSandboxClient, DEFAULT_BASE_URL};
pub use tool::{render_for_agent, CodeInterpreterTool, Tool, ToolError, ToolMetadata, TOOL_NAME};

/// SandboxClient trait for submitting code to a runbox sandbox
#[async_trait]
pub trait SandboxClient: Send + Sync {
    /// Run `code` and return the payload the sandbox produced.
    ///
    /// Errors are transport problems only; a failed run is an `Ok` failure payload.
    async fn execute(&self, code: &str) -> Result<TransportPayload>;

    /// Check if the sandbox is healthy and reachable
    async fn health_check(&self) -> Result<()>;
}

/// Factory for creating SandboxClient instances
pub struct SandboxClientFactory;

impl SandboxClientFactory {
    /// Create an HTTP client for a remote server
    pub fn create_http_client(base_url: impl Into<String>) -> Box<dyn SandboxClient> {
        Box::new(HttpSandboxClient::new(base_url))
    }

    /// Create a direct client for an in-process handler
    pub fn create_direct_client<H: runbox_server::ExecutionHandler>(
        handler: H,
    ) -> Box<dyn SandboxClient> {
        Box::new(DirectSandboxClient::new(handler))
    }
}

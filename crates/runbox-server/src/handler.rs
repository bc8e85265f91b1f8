//! Execution handler trait for the runbox server.

use async_trait::async_trait;
use runbox_core::{describe_error, Sandbox};
use runbox_types::ExecutionResult;
use std::sync::Arc;

/// Runs one code submission on behalf of the `/execute` endpoint.
///
/// The endpoint has already rejected missing or empty code by the time this
/// is called. Implementations must always produce a result; faults are
/// reported as failure results rather than errors.
#[async_trait]
pub trait ExecutionHandler: Send + Sync + Clone + 'static {
    async fn execute(&self, code: &str) -> ExecutionResult;

    /// Optional hook called once the listener is bound.
    ///
    /// The default implementation does nothing.
    async fn on_start(&self) {}

    /// Optional hook called after graceful shutdown.
    ///
    /// The default implementation does nothing.
    async fn on_shutdown(&self) {}
}

#[async_trait]
impl ExecutionHandler for Arc<Sandbox> {
    /// The run is detached from the request: a client that disconnects does
    /// not cut it short, so the workspace is always harvested and released.
    async fn execute(&self, code: &str) -> ExecutionResult {
        let sandbox = Arc::clone(self);
        let code = code.to_string();
        match tokio::spawn(async move { sandbox.execute(&code).await }).await {
            Ok(result) => result,
            Err(e) => {
                let description = describe_error(&e);
                log::error!("Execution task failed: {}", description);
                ExecutionResult::fault(format!("Execution task failed: {}", description))
            }
        }
    }

    async fn on_start(&self) {
        log::info!("Output files are collected under {}", self.workspace_root().display());
    }
}

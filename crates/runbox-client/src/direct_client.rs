use anyhow::Result;
use async_trait::async_trait;
use runbox_core::{Sandbox, SandboxConfig};
use runbox_server::ExecutionHandler;
use runbox_types::{ExecutionResult, TransportPayload};
use std::sync::Arc;

use crate::SandboxClient;

/// Calls an execution handler in the same process, skipping HTTP.
pub struct DirectSandboxClient<H: ExecutionHandler> {
    handler: H,
}

impl<H: ExecutionHandler> DirectSandboxClient<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

impl DirectSandboxClient<Arc<Sandbox>> {
    /// Build an embedded sandbox from configuration.
    pub fn from_config(config: &SandboxConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(Sandbox::new(config)?)))
    }
}

#[async_trait]
impl<H: ExecutionHandler> SandboxClient for DirectSandboxClient<H> {
    async fn execute(&self, code: &str) -> Result<TransportPayload> {
        // same contract as the HTTP endpoint
        let result = if code.is_empty() {
            ExecutionResult::no_code()
        } else {
            self.handler.execute(code).await
        };
        Ok(result.encode())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

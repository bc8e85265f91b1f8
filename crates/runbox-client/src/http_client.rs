use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use runbox_types::{ExecuteRequest, TransportPayload};
use std::time::Duration;

use crate::SandboxClient;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// HTTP client for a remote runbox server
pub struct HttpSandboxClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSandboxClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
            // longer than the server's default execution budget
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for HttpSandboxClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl SandboxClient for HttpSandboxClient {
    async fn execute(&self, code: &str) -> Result<TransportPayload> {
        let execute_url = format!("{}/execute", self.base_url);
        log::debug!("Submitting {} byte(s) of code to {}", code.len(), execute_url);

        let response = self
            .client
            .post(&execute_url)
            .timeout(self.timeout)
            .json(&ExecuteRequest::new(code))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", execute_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("HTTP {}: {}", status, body.trim());
        }

        let payload = response
            .json::<TransportPayload>()
            .await
            .context("Malformed execute response")?;
        Ok(payload)
    }

    async fn health_check(&self) -> Result<()> {
        let health_url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&health_url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Health check failed: {}", response.status());
        }

        Ok(())
    }
}

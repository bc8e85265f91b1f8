//! The agent-facing code interpreter tool.

use async_trait::async_trait;
use runbox_types::ExecutionResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::files::save_files;
use crate::SandboxClient;

pub const TOOL_NAME: &str = "python_code_interpreter";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool '{tool_name}' received invalid arguments: {message}")]
    InvalidArguments { tool_name: String, message: String },
}

// What an agent runtime calls
#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> ToolMetadata;
    async fn execute(&self, arguments: Value) -> Result<String, ToolError>;
}

/// Reduce a result to the text an agent sees.
pub fn render_for_agent(result: &ExecutionResult) -> String {
    match result.error() {
        Some(error) => format!("Error executing code: {}", error),
        None => result.output().to_string(),
    }
}

/// Runs code in a sandbox and saves any produced files into `output_dir`.
pub struct CodeInterpreterTool {
    client: Arc<dyn SandboxClient>,
    output_dir: PathBuf,
}

impl CodeInterpreterTool {
    /// Files are saved into the current directory.
    pub fn new(client: Arc<dyn SandboxClient>) -> Self {
        Self {
            client,
            output_dir: PathBuf::from("."),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run `code` and return stdout, or `"Error executing code: ..."`.
    ///
    /// Never fails: transport and decoding problems are rendered the same
    /// way as a failed run.
    pub async fn run_code(&self, code: &str) -> String {
        match self.try_run(code).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("Code execution request failed: {:#}", e);
                format!("Error executing code: {:#}", e)
            }
        }
    }

    async fn try_run(&self, code: &str) -> anyhow::Result<String> {
        let payload = self.client.execute(code).await?;
        let result = payload.decode()?;

        let saved = save_files(&result, &self.output_dir).await?;
        if !saved.is_empty() {
            log::info!(
                "Saved {} file(s) into {}",
                saved.len(),
                self.output_dir.display()
            );
        }

        Ok(render_for_agent(&result))
    }
}

#[async_trait]
impl Tool for CodeInterpreterTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: TOOL_NAME.to_string(),
            description: "Executes Python code in a fresh, isolated interpreter and returns \
                          what it printed to stdout. Nothing is kept between calls, so each \
                          submission must be self-contained. To return files, write them to \
                          the current working directory (or the directory named by the \
                          RUNBOX_OUTPUT_DIR environment variable); they are saved next to \
                          the caller."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "The Python source code to run"
                    }
                },
                "required": ["code"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let code = arguments
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: TOOL_NAME.to_string(),
                message: "Missing or invalid 'code' parameter".to_string(),
            })?;

        Ok(self.run_code(code).await)
    }
}

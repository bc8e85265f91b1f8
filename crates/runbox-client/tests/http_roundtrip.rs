//! Client against a live server on a loopback port.
#![cfg(unix)]

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use runbox_client::{CodeInterpreterTool, HttpSandboxClient, SandboxClient};
use runbox_core::{InterpreterConfig, SandboxConfig};
use runbox_server::SandboxServer;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct RunningServer {
    addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl RunningServer {
    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn start_sandbox_server(root: &TempDir) -> RunningServer {
    let mut config = SandboxConfig::default();
    config.server.bind_addr = "127.0.0.1:0".to_string();
    config.execution.timeout_secs = 10;
    config.execution.interpreter = InterpreterConfig::new("sh").with_script_suffix(".sh");
    config.workspace.root = root.path().to_path_buf();

    let server = SandboxServer::from_config(&config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .serve_listener(listener, async move {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    RunningServer {
        addr,
        _shutdown: tx,
    }
}

/// A stand-in server that answers `/execute` with a fixed response.
async fn start_fixed_server(status: StatusCode, body: Value) -> SocketAddr {
    let router = Router::new().route(
        "/execute",
        post(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_execute_over_http() {
    let root = TempDir::new().unwrap();
    let server = start_sandbox_server(&root).await;
    let client = HttpSandboxClient::new(server.url());

    client.health_check().await.unwrap();

    let payload = client.execute("echo 2\nprintf hi > out.txt").await.unwrap();
    let result = payload.decode().unwrap();
    assert!(result.is_success());
    assert_eq!(result.output(), "2\n");
    assert_eq!(result.files().unwrap()["out.txt"], b"hi");

    let payload = client.execute("").await.unwrap();
    assert_eq!(payload.error(), Some("No code provided"));
}

#[tokio::test]
async fn test_tool_writes_files_and_returns_stdout() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let server = start_sandbox_server(&root).await;
    let tool = CodeInterpreterTool::new(Arc::new(HttpSandboxClient::new(server.url())))
        .with_output_dir(out.path());

    let text = tool
        .run_code("echo 'a,b' > table.csv\necho saved")
        .await;
    assert_eq!(text, "saved\n");
    assert_eq!(std::fs::read(out.path().join("table.csv")).unwrap(), b"a,b\n");

    let text = tool.run_code("echo nope >&2\nexit 4").await;
    assert_eq!(text, "Error executing code: nope\n");
}

#[tokio::test]
async fn test_non_success_status_is_a_failure() {
    let addr = start_fixed_server(StatusCode::INTERNAL_SERVER_ERROR, json!({"detail": "boom"})).await;
    let client = HttpSandboxClient::new(format!("http://{}", addr));

    let err = client.execute("print(1)").await.unwrap_err();
    assert!(err.to_string().starts_with("HTTP 500"));

    let tool = CodeInterpreterTool::new(Arc::new(client));
    let text = tool.run_code("print(1)").await;
    assert!(text.starts_with("Error executing code: HTTP 500"));
    assert!(text.contains("boom"));
}

#[tokio::test]
async fn test_missing_output_field_is_tolerated() {
    let addr = start_fixed_server(StatusCode::OK, json!({"success": false, "error": "bad"})).await;
    let tool = CodeInterpreterTool::new(Arc::new(HttpSandboxClient::new(format!("http://{}", addr))));

    assert_eq!(tool.run_code("x").await, "Error executing code: bad");
}

#[tokio::test]
async fn test_inconsistent_payload_is_rejected() {
    let addr = start_fixed_server(
        StatusCode::OK,
        json!({"success": true, "output": "", "error": "both"}),
    )
    .await;
    let client = HttpSandboxClient::new(format!("http://{}", addr));

    let err = client.execute("x").await.unwrap_err();
    assert!(err.to_string().contains("Malformed execute response"));
}

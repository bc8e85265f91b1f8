//! HTTP transport for the runbox sandbox
//!
//! One request/response handshake: `POST /execute` takes `{"code": "..."}`
//! and answers with the flat transport payload once the run has finished and
//! its files have been harvested. Every application-level outcome, including
//! malformed bodies and handler panics, is answered with status 200 and a
//! failure payload so callers only ever need to parse one shape.

pub mod error;
pub mod handler;

pub use error::{Result, ServerError};
pub use handler::ExecutionHandler;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use runbox_core::{Sandbox, SandboxConfig, ServerSettings};
use runbox_types::{ExecuteRequest, ExecutionResult, TransportPayload};
use serde::Serialize;
use std::any::Any;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Configuration for the HTTP layer.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000)),
            max_body_size: 10 * 1024 * 1024, // 10MB
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `server` section of the sandbox configuration.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self> {
        Ok(Self::new()
            .with_bind_addr_str(&settings.bind_addr)?
            .with_max_body_size(settings.max_body_size)
            .with_logging(settings.enable_logging))
    }

    /// Set the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address '{}': {}", addr, e)))?;
        Ok(self)
    }

    /// Set maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Enable or disable request logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState<H: ExecutionHandler> {
    pub handler: H,
}

/// Handler for the /execute POST endpoint.
async fn execute_handler<H: ExecutionHandler>(
    State(app_state): State<AppState<H>>,
    body: std::result::Result<Json<ExecuteRequest>, JsonRejection>,
) -> Json<TransportPayload> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let err = ServerError::invalid_request(rejection.body_text());
            log::warn!("Rejected execute request ({}): {}", err.error_type(), err);
            return Json(ExecutionResult::fault(err.to_string()).encode());
        }
    };

    let Some(code) = request.code() else {
        log::warn!("Execute request without code");
        return Json(ExecutionResult::no_code().encode());
    };

    log::debug!("Executing {} byte(s) of code", code.len());
    let result = app_state.handler.execute(code).await;
    Json(result.encode())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn log_requests(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();

    if uri.path() == "/health" {
        log::debug!("Request {} {} {}", request_id, method, uri);
    } else {
        log::info!("Request {} {} {}", request_id, method, uri);
    }

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    log::info!(
        "Response {} {} completed in {:?}",
        request_id,
        response.status(),
        duration
    );
    response
}

/// Turn a handler panic into a failure payload.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let err = ServerError::internal(format!("Handler panicked: {}", detail));
    log::error!("{}", err);
    (
        StatusCode::OK,
        Json(ExecutionResult::fault(err.to_string()).encode()),
    )
        .into_response()
}

/// The runbox HTTP server.
pub struct SandboxServer<H: ExecutionHandler> {
    handler: H,
    config: ServerConfig,
}

impl SandboxServer<Arc<Sandbox>> {
    /// Build the sandbox and the HTTP settings from one configuration.
    pub fn from_config(config: &SandboxConfig) -> Result<Self> {
        let server_config = ServerConfig::from_settings(&config.server)?;
        let sandbox = Sandbox::new(config)?;
        Ok(Self::with_config(Arc::new(sandbox), server_config))
    }
}

impl<H: ExecutionHandler> SandboxServer<H> {
    /// Create a new server with the given handler and default configuration.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            config: ServerConfig::default(),
        }
    }

    /// Create a new server with custom configuration.
    pub fn with_config(handler: H, config: ServerConfig) -> Self {
        Self { handler, config }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            handler: self.handler.clone(),
        };

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/execute", post(execute_handler::<H>))
            .with_state(state)
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .layer(CatchPanicLayer::custom(panic_response));

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(log_requests));
        }

        router
    }

    /// Start the server and listen for connections until the process ends.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server will shut down when the provided shutdown signal is received.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        self.serve_listener(listener, shutdown_signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::internal(format!("Listener has no address: {}", e)))?;

        log::info!("runbox server listening on {}", local_addr);
        log::info!("Health check: http://{}/health", local_addr);
        log::info!("Execute endpoint: http://{}/execute", local_addr);

        self.handler.on_start().await;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        self.handler.on_shutdown().await;

        log::info!("runbox server shut down gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}

//! HTTP server implementation with OpenAI-compatible API endpoints.
//!
//! Serves a fine-tuned model (base model plus LoRA adapter) hosted by an
//! [`InferenceEngine`], along with the single-input `/inference` route the
//! scoring job calls.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tunerx_core::{Error, Result, SamplingParams};
use tunerx_telemetry::{InferenceMetrics, MetricsSnapshot};

use crate::engine::InferenceEngine;
use crate::handlers;
use crate::openai::{ModelObject, ModelsResponse};

const DEFAULT_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8080);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: SocketAddr,
    /// Enable CORS.
    pub cors: bool,
    /// Sampling defaults applied when a request leaves a field unset.
    pub sampling: SamplingParams,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(DEFAULT_ADDR),
            cors: true,
            sampling: SamplingParams::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new server config builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    addr: Option<SocketAddr>,
    cors: Option<bool>,
    sampling: Option<SamplingParams>,
}

impl ServerConfigBuilder {
    /// Sets the listen address.
    #[must_use]
    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Sets whether CORS is enabled.
    #[must_use]
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = Some(enabled);
        self
    }

    /// Sets the default sampling parameters.
    #[must_use]
    pub fn sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = Some(sampling);
        self
    }

    /// Builds the server config.
    ///
    /// # Errors
    ///
    /// Returns an error if the default sampling parameters are out of range.
    pub fn build(self) -> Result<ServerConfig> {
        let sampling = self.sampling.unwrap_or_default();
        sampling
            .validate()
            .map_err(|message| Error::InvalidConfig { message })?;

        Ok(ServerConfig {
            addr: self.addr.unwrap_or_else(|| SocketAddr::from(DEFAULT_ADDR)),
            cors: self.cors.unwrap_or(true),
            sampling,
        })
    }
}

/// Shared application state.
pub struct AppState {
    /// The inference engine.
    pub engine: Arc<dyn InferenceEngine>,
    /// Server configuration.
    pub config: ServerConfig,
    /// Request counters.
    pub metrics: InferenceMetrics,
    /// Fingerprint reported in every chat completion.
    pub fingerprint: String,
    /// Server start time.
    pub start_time: Instant,
    /// Unix timestamp of server start.
    pub started_at: i64,
}

impl AppState {
    /// Creates app state around an engine.
    pub fn new(config: ServerConfig, engine: Arc<dyn InferenceEngine>) -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self {
            engine,
            config,
            metrics: InferenceMetrics::default(),
            fingerprint: format!("fp_{}", &simple[..10]),
            start_time: Instant::now(),
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// The HTTP server.
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Server {
    /// Creates a new server around the given engine.
    pub fn new(config: ServerConfig, engine: Arc<dyn InferenceEngine>) -> Self {
        let state = Arc::new(AppState::new(config.clone(), engine));
        Self { config, state }
    }

    /// Returns the shared state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Creates the router.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            // Health endpoints
            .route("/health", get(health))
            .route("/ready", get(ready))
            // OpenAI-compatible API endpoints
            .route("/v1/models", get(list_models))
            .route("/v1/chat/completions", post(handlers::chat_completions))
            .route("/chat/completions", post(handlers::chat_completions))
            // Single-input route used by the scoring job
            .route("/inference", post(handlers::inference))
            .route("/api/status", get(server_status))
            .with_state(self.state.clone());

        router = router.layer(TraceLayer::new_for_http());

        if self.config.cors {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Runs the server until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server fails.
    pub async fn run(self) -> Result<()> {
        let model = self.state.engine.model_info();
        if self.state.engine.is_ready().await {
            tracing::info!(model = %model.id, "Inference runtime is ready");
        } else {
            tracing::warn!(
                model = %model.id,
                "Inference runtime is not reachable yet; /ready reports 503 until it is"
            );
        }

        let router = self.router();

        tracing::info!(addr = %self.config.addr, "Starting tunerx server");
        eprintln!(
            "\n\x1b[32m✓\x1b[0m Server listening on http://{}",
            self.config.addr
        );
        eprintln!("  Press Ctrl+C to stop\n");

        let listener = tokio::net::TcpListener::bind(self.config.addr)
            .await
            .map_err(Error::Io)?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::internal(e.to_string()))?;

        tracing::info!(
            requests = self.state.metrics.requests(),
            "Server shutdown complete"
        );
        eprintln!("\x1b[32m✓\x1b[0m Server stopped");

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            eprintln!("\n\x1b[33m⚡\x1b[0m Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            eprintln!("\n\x1b[33m⚡\x1b[0m Received SIGTERM, shutting down gracefully...");
        },
    }
}

// === Error Response ===

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
    code: Option<String>,
}

impl ErrorResponse {
    fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                error_type: error_type.into(),
                code: None,
            },
        }
    }

    fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error.code = Some(code.into());
        self
    }
}

pub(crate) fn error_response(status: StatusCode, message: &str, error_type: &str) -> Response {
    let body = Json(ErrorResponse::new(message, error_type));
    (status, body).into_response()
}

/// Maps an error onto its HTTP status and OpenAI error type.
pub(crate) fn classify(error: &Error) -> (StatusCode, &'static str) {
    match error {
        Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request_error"),
        Error::NotReady { .. } | Error::Runtime { status: 0, .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "model_not_ready")
        },
        Error::Runtime { .. } => (StatusCode::BAD_GATEWAY, "runtime_error"),
        Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
    }
}

pub(crate) fn error_for(error: &Error) -> Response {
    let (status, error_type) = classify(error);
    let mut body = ErrorResponse::new(error.to_string(), error_type);
    if let Error::Runtime { status: upstream, .. } = error {
        if *upstream != 0 {
            body = body.with_code(upstream.to_string());
        }
    }
    (status, Json(body)).into_response()
}

// === Health Endpoints ===

async fn health() -> &'static str {
    "OK"
}

async fn ready(State(state): State<Arc<AppState>>) -> Response {
    if state.engine.is_ready().await {
        (StatusCode::OK, "Ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Inference runtime not ready").into_response()
    }
}

#[derive(Debug, Serialize)]
struct ServerStatus {
    status: String,
    uptime_seconds: u64,
    model_id: String,
    adapter_loaded: bool,
    metrics: MetricsSnapshot,
}

async fn server_status(State(state): State<Arc<AppState>>) -> Json<ServerStatus> {
    let model = state.engine.model_info();

    Json(ServerStatus {
        status: "running".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        model_id: model.id.to_string(),
        adapter_loaded: model.adapter.is_some(),
        metrics: state.metrics.snapshot(),
    })
}

// === Models ===

async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let model = state.engine.model_info();

    Json(ModelsResponse {
        object: "list".to_string(),
        data: vec![ModelObject {
            id: model.id.to_string(),
            object: "model".to_string(),
            created: state.started_at,
            owned_by: "tunerx".to_string(),
            adapter: model.adapter.clone(),
        }],
    })
}

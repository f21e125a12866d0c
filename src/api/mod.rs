//! # Core API Gateway
//!
//! OpenAI-compatible HTTP endpoints for the local LLM gateway.
//!
//! ## Endpoints
//!
//! - `POST /v1/chat/completions` - Chat completion, with tool-call translation
//! - `POST /v1/completions` - Legacy text completion, no tool translation
//! - `GET /v1/models` - List the static model registry
//! - `GET /v1/models/status` - Per-model lifecycle/health/GPU status
//! - `POST /v1/models/{id}/start` - Explicit backend start
//! - `POST /v1/models/{id}/stop` - Explicit backend stop
//! - `POST /v1/models/switch` - VRAM-budget-aware smart switch
//! - `GET /health` - Liveness
//! - `GET /ready` - Readiness (at least one model running + healthy)
//! - `GET /metrics` - Prometheus text format
//!
//! ## Example
//!
//! ```no_run
//! use gatewaylib::api::{create_router, AppState};
//! use gatewaylib::config::GatewayConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(GatewayConfig::default());
//! let state = Arc::new(AppState::new(config)?);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All errors are returned in OpenAI-compatible format:
//! ```json
//! {
//!   "error": {
//!     "message": "Model 'gpt-4' not found",
//!     "type": "invalid_request_error",
//!     "param": "model",
//!     "code": "model_not_found"
//!   }
//! }
//! ```

pub mod auth;
mod completions;
mod headers;
mod health;
mod legacy_completions;
mod lifecycle;
mod model_status;
mod models;
pub mod types;
pub mod validation;

pub use types::*;

use crate::config::GatewayConfig;
use crate::container::{ContainerAdapter, ProcessContainerAdapter};
use crate::gpu::{GpuSampler, NvmlGpuSampler};
use crate::health::Prober;
use crate::metrics::MetricsCollector;
use crate::registry::{Registry, RegistryError};
use crate::state::StateTable;
use crate::status::Aggregator;
use crate::switch::SwitchEngine;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (10 MB).
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: Arc<GatewayConfig>,
    pub http_client: reqwest::Client,
    pub state_table: Arc<StateTable>,
    pub container: Arc<dyn ContainerAdapter>,
    pub gpu: Arc<dyn GpuSampler>,
    pub prober: Arc<Prober>,
    pub switch_engine: Arc<SwitchEngine>,
    pub status_aggregator: Arc<Aggregator>,
    pub metrics_collector: Arc<MetricsCollector>,
    pub start_time: Instant,
}

impl AppState {
    /// Wires every subsystem from a loaded, validated configuration.
    pub fn new(config: Arc<GatewayConfig>) -> Result<Self, RegistryError> {
        let registry = Arc::new(Registry::from_configs(&config.models)?);
        let state_table = Arc::new(StateTable::new(registry.ids()));

        let container: Arc<dyn ContainerAdapter> = Arc::new(ProcessContainerAdapter::new(
            config.container.control_command.clone(),
        ));
        let gpu: Arc<dyn GpuSampler> = Arc::new(NvmlGpuSampler::new());
        let prober = Arc::new(Prober::new(Duration::from_secs(
            config.switch.probe_ttl_seconds,
        )));
        let stuck_threshold = Duration::from_secs(config.switch.stuck_threshold_seconds);

        let switch_engine = Arc::new(SwitchEngine::new(
            Arc::clone(&registry),
            Arc::clone(&state_table),
            Arc::clone(&container),
            Arc::clone(&gpu),
            Arc::clone(&prober),
            stuck_threshold,
        ));
        let status_aggregator = Arc::new(Aggregator::new(
            Arc::clone(&registry),
            Arc::clone(&container),
            Arc::clone(&prober),
            Arc::clone(&gpu),
            Arc::clone(&state_table),
            stuck_threshold,
        ));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.backend_timeout_seconds))
            .build()
            .expect("failed to build backend HTTP client");

        let start_time = Instant::now();

        // Safe to call multiple times - reuses the existing recorder if already installed.
        let prometheus_handle = crate::metrics::setup_metrics().unwrap_or_else(|e| {
            tracing::debug!("metrics already initialized, creating new handle: {}", e);
            crate::metrics::PrometheusBuilder::new()
                .build_recorder()
                .handle()
        });
        let metrics_collector = Arc::new(MetricsCollector::new(
            Arc::clone(&registry),
            start_time,
            prometheus_handle,
        ));

        Ok(Self {
            registry,
            config,
            http_client,
            state_table,
            container,
            gpu,
            prober,
            switch_engine,
            status_aggregator,
            metrics_collector,
            start_time,
        })
    }
}

/// Create the main API router with all endpoints configured.
///
/// Every route sits behind `auth::auth_middleware`, including `/health` and
/// `/metrics` — the spec names exactly three optional-auth endpoints and
/// nothing else is exempt.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = auth::build_cors_layer(&state.config.server);

    Router::new()
        .route("/v1/chat/completions", post(completions::handle))
        .route("/v1/completions", post(legacy_completions::handle))
        .route("/v1/models", get(models::handle))
        .route("/v1/models/status", get(model_status::handle))
        .route("/v1/models/:id/start", post(lifecycle::start))
        .route("/v1/models/:id/stop", post(lifecycle::stop))
        .route("/v1/models/switch", post(lifecycle::switch))
        .route("/health", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::auth_middleware,
        ))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

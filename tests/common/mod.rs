//! Shared test harness: builds a full `AppState`/`Router` wired to fake
//! container/GPU adapters and wiremock-backed model backends.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use gatewaylib::api::{create_router, AppState};
use gatewaylib::config::{GatewayConfig, ModelConfig};
use gatewaylib::container::{ContainerAdapter, ContainerError, Inspection, LifecycleState};
use gatewaylib::gpu::{GpuSampler, GpuSnapshot};
use gatewaylib::health::Prober;
use gatewaylib::registry::Registry;
use gatewaylib::state::{BackendState, StateTable};
use gatewaylib::status::Aggregator;
use gatewaylib::switch::SwitchEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A `ContainerAdapter` that remembers the lifecycle state of each handle
/// across `start`/`stop` calls, defaulting unseen handles to `Running` (the
/// common case: a model backend that's already up before the test starts).
pub struct TrackedContainer {
    states: DashMap<String, LifecycleState>,
}

impl TrackedContainer {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    pub fn set(&self, handle: &str, state: LifecycleState) {
        self.states.insert(handle.to_string(), state);
    }
}

impl Default for TrackedContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerAdapter for TrackedContainer {
    async fn start(&self, handle: &str) -> Result<(), ContainerError> {
        self.states
            .insert(handle.to_string(), LifecycleState::Running);
        Ok(())
    }
    async fn stop(&self, handle: &str) -> Result<(), ContainerError> {
        self.states
            .insert(handle.to_string(), LifecycleState::Exited);
        Ok(())
    }
    async fn inspect(&self, handle: &str) -> Result<Inspection, ContainerError> {
        let lifecycle_state = self
            .states
            .get(handle)
            .map(|entry| *entry)
            .unwrap_or(LifecycleState::Running);
        Ok(Inspection {
            lifecycle_state,
            exit_reason: None,
            started_at: Some(Utc::now()),
        })
    }
}

pub struct FixedGpu(pub GpuSnapshot);

#[async_trait]
impl GpuSampler for FixedGpu {
    async fn sample(&self) -> GpuSnapshot {
        self.0
    }
}

fn ample_gpu() -> GpuSnapshot {
    GpuSnapshot {
        used_gb: 0.0,
        total_gb: 96.0,
        available_gb: 96.0,
        taken_at: Utc::now(),
    }
}

pub fn model_config(id: &str, backend_base_url: &str, approx_weights_gb: f64) -> ModelConfig {
    ModelConfig {
        id: id.to_string(),
        backend_base_url: backend_base_url.to_string(),
        container_handle: id.to_string(),
        on_disk_path: format!("/models/{}", id),
        approx_weights_gb,
        expected_load_seconds: 10,
        description: String::new(),
        tool_role_mode: Default::default(),
        vram_multiplier: 0.85,
    }
}

pub const TEST_API_KEY: &str = "sk-abcdef0123456789abcdef0123456789";

pub fn auth_header_value() -> String {
    format!("Bearer {}", TEST_API_KEY)
}

/// Builds an `AppState` with the given models already marked `Running`
/// against an always-up `TrackedContainer` and an ample-VRAM fake GPU.
pub fn test_app_state(models: Vec<ModelConfig>) -> Arc<AppState> {
    test_app_state_with_gpu(models, ample_gpu())
}

/// Like `test_app_state`, but with an explicit GPU snapshot — needed to
/// drive the switch engine's eviction arithmetic deterministically.
pub fn test_app_state_with_gpu(models: Vec<ModelConfig>, gpu_snapshot: GpuSnapshot) -> Arc<AppState> {
    test_app_state_with_container(models, gpu_snapshot).0
}

/// Like `test_app_state_with_gpu`, but also hands back the concrete
/// `TrackedContainer` so a test can mark specific handles `Exited` before
/// exercising the switch engine.
pub fn test_app_state_with_container(
    models: Vec<ModelConfig>,
    gpu_snapshot: GpuSnapshot,
) -> (Arc<AppState>, Arc<TrackedContainer>) {
    test_app_state_with_container_and_auth_mode(models, gpu_snapshot, false)
}

/// Like `test_app_state_with_container`, but with `webui_auth_enabled`
/// explicitly set — needed to exercise the browser-optional auth carve-out,
/// which is off by default.
pub fn test_app_state_with_container_and_auth_mode(
    models: Vec<ModelConfig>,
    gpu_snapshot: GpuSnapshot,
    webui_auth_enabled: bool,
) -> (Arc<AppState>, Arc<TrackedContainer>) {
    let mut config = GatewayConfig::default();
    config.models = models;
    config.auth.api_key = TEST_API_KEY.to_string();
    config.server.webui_auth_enabled = webui_auth_enabled;
    let config = Arc::new(config);

    let registry = Arc::new(Registry::from_configs(&config.models).unwrap());
    let state_table = Arc::new(StateTable::new(registry.ids()));
    for id in registry.ids() {
        state_table.set(&id, BackendState::Running { since: Utc::now() });
    }

    let tracked_container = Arc::new(TrackedContainer::new());
    let container: Arc<dyn ContainerAdapter> = Arc::clone(&tracked_container) as Arc<dyn ContainerAdapter>;
    let gpu: Arc<dyn GpuSampler> = Arc::new(FixedGpu(gpu_snapshot));
    let prober = Arc::new(Prober::new(Duration::from_secs(2)));
    let stuck_threshold = Duration::from_secs(90);

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

    let prometheus_handle = gatewaylib::metrics::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let start_time = Instant::now();
    let metrics_collector = Arc::new(gatewaylib::metrics::MetricsCollector::new(
        Arc::clone(&registry),
        start_time,
        prometheus_handle,
    ));

    let state = Arc::new(AppState {
        registry,
        config,
        http_client: reqwest::Client::new(),
        state_table,
        container,
        gpu,
        prober,
        switch_engine,
        status_aggregator,
        metrics_collector,
        start_time,
    });
    (state, tracked_container)
}

pub fn test_router(models: Vec<ModelConfig>) -> axum::Router {
    create_router(test_app_state(models))
}

/// Binds the router to an ephemeral local port and returns its base URL.
/// The server runs until the test process exits; tests are short-lived so
/// nothing explicitly shuts it down.
pub async fn spawn_test_server(models: Vec<ModelConfig>) -> (String, Arc<AppState>) {
    spawn_app(test_app_state(models)).await
}

pub async fn spawn_test_server_with_gpu(
    models: Vec<ModelConfig>,
    gpu_snapshot: GpuSnapshot,
) -> (String, Arc<AppState>) {
    spawn_app(test_app_state_with_gpu(models, gpu_snapshot)).await
}

pub async fn spawn_test_server_with_container(
    models: Vec<ModelConfig>,
    gpu_snapshot: GpuSnapshot,
) -> (String, Arc<AppState>, Arc<TrackedContainer>) {
    let (state, container) = test_app_state_with_container(models, gpu_snapshot);
    let (base_url, state) = spawn_app(state).await;
    (base_url, state, container)
}

pub async fn spawn_test_server_with_webui_auth_enabled(
    models: Vec<ModelConfig>,
    webui_auth_enabled: bool,
) -> (String, Arc<AppState>) {
    let (state, _container) =
        test_app_state_with_container_and_auth_mode(models, ample_gpu(), webui_auth_enabled);
    spawn_app(state).await
}

async fn spawn_app(state: Arc<AppState>) -> (String, Arc<AppState>) {
    let app = create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

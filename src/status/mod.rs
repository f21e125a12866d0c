//! Status Aggregator: joins Registry x Container Adapter x Prober x GPU
//! Sampler into the `/v1/models/status` view. Reads a consistent snapshot;
//! never mutates `BackendState`.

use crate::container::{ContainerAdapter, LifecycleState};
use crate::gpu::GpuSampler;
use crate::health::{HealthStatus, Prober};
use crate::registry::Registry;
use crate::state::{BackendState, StateTable};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Resolved lifecycle status exposed to clients, distinct from the internal
/// `BackendState` tag names (snake_case matching the wire schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Running,
    Loading,
    Stopped,
    InsufficientGpuRam,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatusEntry {
    pub status: ModelStatus,
    pub health: HealthView,
    pub size_gb: f64,
    pub description: String,
    pub estimated_load_time_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_memory_used_gb: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthView {
    Healthy,
    Unhealthy,
    Unknown,
}

impl From<HealthStatus> for HealthView {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Healthy => HealthView::Healthy,
            HealthStatus::Unhealthy => HealthView::Unhealthy,
            HealthStatus::Unknown => HealthView::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GpuView {
    pub used_gb: f64,
    pub total_gb: f64,
    pub available_gb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub models: std::collections::BTreeMap<String, ModelStatusEntry>,
    pub gpu: GpuView,
}

pub struct Aggregator {
    registry: Arc<Registry>,
    container: Arc<dyn ContainerAdapter>,
    prober: Arc<Prober>,
    gpu: Arc<dyn GpuSampler>,
    state_table: Arc<StateTable>,
    stuck_threshold: Duration,
}

impl Aggregator {
    pub fn new(
        registry: Arc<Registry>,
        container: Arc<dyn ContainerAdapter>,
        prober: Arc<Prober>,
        gpu: Arc<dyn GpuSampler>,
        state_table: Arc<StateTable>,
        stuck_threshold: Duration,
    ) -> Self {
        Self {
            registry,
            container,
            prober,
            gpu,
            state_table,
            stuck_threshold,
        }
    }

    pub async fn aggregate(&self) -> StatusResponse {
        let snapshot = self.gpu.sample().await;
        let mut models = std::collections::BTreeMap::new();

        for spec in self.registry.all() {
            let inspection = self.container.inspect(&spec.container_handle).await.ok();
            let health = self.prober.cached(&spec.id);
            let backend_state = self.state_table.get(&spec.id);

            let (status, gpu_memory_used_gb) = self.resolve_status(
                inspection.as_ref(),
                &health,
                backend_state.as_ref(),
                spec.vram_estimate_gb,
            );

            models.insert(
                spec.id.clone(),
                ModelStatusEntry {
                    status,
                    health: HealthView::from(health.status),
                    size_gb: spec.approx_weights_gb,
                    description: spec.description.clone(),
                    estimated_load_time_seconds: spec.expected_load_seconds,
                    gpu_memory_used_gb,
                },
            );
        }

        StatusResponse {
            models,
            gpu: GpuView {
                used_gb: snapshot.used_gb,
                total_gb: snapshot.total_gb,
                available_gb: snapshot.available_gb,
            },
        }
    }

    /// Implements the five-rule priority resolution from the spec, given an
    /// `inspect` result, the cached health record, and the switch engine's
    /// recorded `BackendState` (the only place a GPU shortfall gets noted).
    fn resolve_status(
        &self,
        inspection: Option<&crate::container::Inspection>,
        health: &crate::health::HealthRecord,
        backend_state: Option<&BackendState>,
        vram_estimate_gb: f64,
    ) -> (ModelStatus, Option<f64>) {
        let Some(inspection) = inspection else {
            return (ModelStatus::Stopped, None);
        };

        match inspection.lifecycle_state {
            // Rule 1: exited/failed.
            LifecycleState::Failed => return (ModelStatus::Failed, None),
            LifecycleState::Exited => return (ModelStatus::Stopped, None),
            LifecycleState::Absent => return (ModelStatus::Stopped, None),
            LifecycleState::Starting | LifecycleState::Running => {}
        }

        // Rule 2: running and prober healthy.
        if inspection.lifecycle_state == LifecycleState::Running
            && health.status == HealthStatus::Healthy
        {
            return (ModelStatus::Running, Some(vram_estimate_gb));
        }

        // Rule 3/4: running but not (yet) healthy — check stuck threshold.
        if let Some(started_at) = inspection.started_at {
            let running_for = Utc::now().signed_duration_since(started_at);
            let threshold =
                chrono::Duration::from_std(self.stuck_threshold).unwrap_or_default();
            if running_for > threshold {
                // Rule 3: past threshold; insufficient_gpu_ram only if the
                // switch engine recorded a shortfall for this model, else it
                // remains Loading (backend may simply be slow to come up).
                if matches!(backend_state, Some(BackendState::InsufficientGpuRam { .. })) {
                    return (ModelStatus::InsufficientGpuRam, None);
                }
                return (ModelStatus::Loading, None);
            }
        }

        // Rule 4: running, not yet past threshold.
        (ModelStatus::Loading, None)
    }

    /// `/ready` semantics: true iff at least one model is running + healthy.
    pub fn is_ready(&self, status: &StatusResponse) -> bool {
        status
            .models
            .values()
            .any(|entry| entry.status == ModelStatus::Running && entry.health == HealthView::Healthy)
    }
}

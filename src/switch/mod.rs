//! Switch Engine: the smart model switch. Single-flight per target model;
//! concurrent switches for different targets do not queue on each other —
//! the later one fails fast with `SwitchInProgress` rather than blocking,
//! since VRAM arithmetic for two targets at once is not meaningful.

pub mod error;
pub mod eviction;

pub use error::SwitchError;
pub use eviction::{EvictionStrategy, LargestFirst};

use crate::container::{ContainerAdapter, LifecycleState};
use crate::gpu::GpuSampler;
use crate::health::{HealthStatus, Prober};
use crate::registry::Registry;
use crate::state::{BackendState, StateTable};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Between consecutive container stops, to let VRAM actually free.
const POST_STOP_SETTLE: Duration = Duration::from_secs(1);
/// Cadence of the readiness poll in step 7.
const POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Floor on the readiness deadline, regardless of `expected_load_seconds`.
const MIN_READY_DEADLINE: Duration = Duration::from_secs(120);

/// A named milestone recorded as the switch progresses, for diagnostics.
pub type SwitchStage = &'static str;

/// Record of one switch attempt. Ephemeral — not persisted past the call
/// that triggered it (and any callers coalesced onto it).
#[derive(Debug, Clone, Serialize)]
pub struct SwitchTicket {
    pub target_model: String,
    pub acquired_at: DateTime<Utc>,
    pub stages_completed: Vec<SwitchStage>,
    pub evicted_models: Vec<String>,
    pub outcome: Option<SwitchOutcomeKind>,
}

impl SwitchTicket {
    fn new(target_model: &str) -> Self {
        Self {
            target_model: target_model.to_string(),
            acquired_at: Utc::now(),
            stages_completed: Vec::new(),
            evicted_models: Vec::new(),
            outcome: None,
        }
    }
}

/// Kind discriminant mirrored onto the ticket; the full `SwitchOutcome` is
/// what callers actually receive.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchOutcomeKind {
    AlreadyLoaded,
    Success,
    Timeout,
}

/// Successful (non-error) result of a switch call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SwitchOutcome {
    AlreadyLoaded,
    Success {
        unloaded_models: Vec<String>,
        estimated_load_time_seconds: u64,
    },
    Timeout {
        note: String,
    },
}

pub struct SwitchEngine {
    registry: Arc<Registry>,
    state_table: Arc<StateTable>,
    container: Arc<dyn ContainerAdapter>,
    gpu: Arc<dyn GpuSampler>,
    prober: Arc<Prober>,
    eviction_strategy: Box<dyn EvictionStrategy>,
    stuck_threshold: Duration,
    switch_gate: tokio::sync::Mutex<()>,
    gate_holder: Mutex<Option<String>>,
    inflight: DashMap<String, Arc<Notify>>,
    last_result: DashMap<String, Result<SwitchOutcome, SwitchError>>,
}

impl SwitchEngine {
    pub fn new(
        registry: Arc<Registry>,
        state_table: Arc<StateTable>,
        container: Arc<dyn ContainerAdapter>,
        gpu: Arc<dyn GpuSampler>,
        prober: Arc<Prober>,
        stuck_threshold: Duration,
    ) -> Self {
        Self {
            registry,
            state_table,
            container,
            gpu,
            prober,
            eviction_strategy: Box::new(LargestFirst),
            stuck_threshold,
            switch_gate: tokio::sync::Mutex::new(()),
            gate_holder: Mutex::new(None),
            inflight: DashMap::new(),
            last_result: DashMap::new(),
        }
    }

    pub async fn switch(&self, target_model: &str) -> Result<SwitchOutcome, SwitchError> {
        let spec = self
            .registry
            .get(target_model)
            .cloned()
            .ok_or_else(|| SwitchError::ModelNotFound(target_model.to_string()))?;

        if let Some(notify) = self.inflight.get(target_model).map(|e| e.clone()) {
            notify.notified().await;
            return self
                .last_result
                .get(target_model)
                .map(|r| r.clone())
                .unwrap_or_else(|| Err(SwitchError::SwitchFailed("lost switch result".into())));
        }

        let notify = Arc::new(Notify::new());
        if self
            .inflight
            .insert(target_model.to_string(), notify.clone())
            .is_some()
        {
            // Another caller won the race to register; wait on it.
            notify.notified().await;
            return self
                .last_result
                .get(target_model)
                .map(|r| r.clone())
                .unwrap_or_else(|| Err(SwitchError::SwitchFailed("lost switch result".into())));
        }

        let guard = match self.switch_gate.try_lock() {
            Ok(guard) => {
                *self.gate_holder.lock().unwrap() = Some(target_model.to_string());
                guard
            }
            Err(_) => {
                let current = self.gate_holder.lock().unwrap().clone().unwrap_or_default();
                self.inflight.remove(target_model);
                let err = SwitchError::SwitchInProgress(current);
                notify.notify_waiters();
                return Err(err);
            }
        };

        let mut ticket = SwitchTicket::new(target_model);
        let result = self.run_switch(&spec, &mut ticket).await;
        tracing::debug!(target = %ticket.target_model, stages = ?ticket.stages_completed, outcome = ?ticket.outcome, "switch ticket closed");

        *self.gate_holder.lock().unwrap() = None;
        drop(guard);
        self.last_result
            .insert(target_model.to_string(), result.clone());
        self.inflight.remove(target_model);
        notify.notify_waiters();
        result
    }

    async fn run_switch(
        &self,
        spec: &crate::registry::ModelSpec,
        ticket: &mut SwitchTicket,
    ) -> Result<SwitchOutcome, SwitchError> {
        // Step 1: already loaded?
        if self.is_running_and_healthy(&spec.id).await {
            ticket.outcome = Some(SwitchOutcomeKind::AlreadyLoaded);
            return Ok(SwitchOutcome::AlreadyLoaded);
        }
        ticket.stages_completed.push("checked_current_state");

        // Step 2: sample GPU.
        let required_gb = spec.vram_estimate_gb;
        let snapshot = self.gpu.sample().await;
        let mut available_gb = snapshot.available_gb;
        ticket.stages_completed.push("sampled_gpu");

        // Step 3/4/5: eviction if needed.
        let eviction_set = if available_gb >= required_gb {
            Vec::new()
        } else {
            let running_ids = self.state_table.running_models();
            let candidates: Vec<_> = running_ids
                .iter()
                .filter(|id| id.as_str() != spec.id)
                .filter_map(|id| self.registry.get(id).cloned())
                .collect();
            let ordered = self.eviction_strategy.order(candidates);

            let mut chosen = Vec::new();
            let mut acc = available_gb;
            for candidate in ordered {
                if acc >= required_gb {
                    break;
                }
                acc += candidate.vram_estimate_gb;
                chosen.push(candidate);
            }

            if acc < required_gb {
                return Err(SwitchError::InsufficientMemory {
                    required_gb,
                    available_gb,
                    achievable_gb: acc,
                });
            }
            available_gb = acc;
            chosen
        };
        let _ = available_gb;
        ticket.stages_completed.push("selected_eviction_set");

        // Step 6: evict.
        for (i, evictee) in eviction_set.iter().enumerate() {
            self.state_table
                .set(&evictee.id, BackendState::Unloading);
            if let Err(e) = self.container.stop(&evictee.container_handle).await {
                warn!(model = %evictee.id, error = %e, "failed to stop evictee");
                return Err(SwitchError::SwitchFailed(format!(
                    "failed to stop {}: {}",
                    evictee.id, e
                )));
            }
            self.state_table.set(&evictee.id, BackendState::Stopped);
            ticket.evicted_models.push(evictee.id.clone());
            if i + 1 < eviction_set.len() {
                tokio::time::sleep(POST_STOP_SETTLE).await;
            }
        }
        if !eviction_set.is_empty() {
            tokio::time::sleep(POST_STOP_SETTLE).await;
        }
        ticket.stages_completed.push("evicted");

        // Step 7: start target, poll for readiness.
        let started_at = Utc::now();
        self.state_table.set(
            &spec.id,
            BackendState::Loading {
                started_at,
            },
        );
        if let Err(e) = self.container.start(&spec.container_handle).await {
            self.state_table.set(
                &spec.id,
                BackendState::Failed {
                    reason: e.to_string(),
                    at: Utc::now(),
                },
            );
            return Err(SwitchError::SwitchFailed(format!(
                "failed to start {}: {}",
                spec.id, e
            )));
        }
        ticket.stages_completed.push("started_target");

        let deadline = MIN_READY_DEADLINE.max(Duration::from_secs(2 * spec.expected_load_seconds));
        let deadline_at = std::time::Instant::now() + deadline;

        loop {
            if self.is_running_and_healthy(&spec.id).await {
                self.state_table.set(
                    &spec.id,
                    BackendState::Running { since: Utc::now() },
                );
                ticket.stages_completed.push("confirmed_healthy");
                ticket.outcome = Some(SwitchOutcomeKind::Success);
                info!(model = %spec.id, evicted = ?ticket.evicted_models, "switch succeeded");
                return Ok(SwitchOutcome::Success {
                    unloaded_models: ticket.evicted_models.clone(),
                    estimated_load_time_seconds: spec.expected_load_seconds,
                });
            }

            if std::time::Instant::now() >= deadline_at {
                let stuck_for = Utc::now().signed_duration_since(started_at);
                if stuck_for
                    > chrono::Duration::from_std(self.stuck_threshold).unwrap_or_default()
                {
                    match self.container.inspect(&spec.container_handle).await {
                        Ok(inspection) if inspection.lifecycle_state == LifecycleState::Failed => {
                            self.state_table.set(
                                &spec.id,
                                BackendState::InsufficientGpuRam {
                                    detected_at: Utc::now(),
                                    required_gb,
                                    available_gb,
                                },
                            );
                            return Err(SwitchError::SwitchFailed(
                                "backend failed to become healthy within stuck threshold".into(),
                            ));
                        }
                        _ => {}
                    }
                }
                ticket.outcome = Some(SwitchOutcomeKind::Timeout);
                return Ok(SwitchOutcome::Timeout {
                    note: "backend still processing; poll /v1/models/status".to_string(),
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Mirrors the status aggregator's rule 2: container running AND prober
    /// healthy. Deliberately independent of `BackendState`, which this
    /// method itself is responsible for updating.
    async fn is_running_and_healthy(&self, model_id: &str) -> bool {
        let Some(spec) = self.registry.get(model_id) else {
            return false;
        };
        let running = matches!(
            self.container.inspect(&spec.container_handle).await,
            Ok(inspection) if inspection.lifecycle_state == LifecycleState::Running
        );
        if !running {
            return false;
        }
        self.prober.probe(model_id, &spec.backend_base_url).await.status == HealthStatus::Healthy
    }
}

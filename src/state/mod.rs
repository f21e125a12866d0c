//! Per-model backend lifecycle state machine.
//!
//! `BackendState` is owned exclusively by the Switch Engine (and the explicit
//! start/stop handlers it shares the write path with); the Status Aggregator
//! only ever reads a snapshot.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Lifecycle state of one model's backend process.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BackendState {
    Stopped,
    Loading {
        started_at: DateTime<Utc>,
    },
    Running {
        since: DateTime<Utc>,
    },
    Unloading,
    InsufficientGpuRam {
        detected_at: DateTime<Utc>,
        required_gb: f64,
        available_gb: f64,
    },
    Failed {
        reason: String,
        at: DateTime<Utc>,
    },
}

impl BackendState {
    pub fn is_running(&self) -> bool {
        matches!(self, BackendState::Running { .. })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, BackendState::Loading { .. })
    }

    /// When the container entered its current `Loading`/`Running` stretch.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            BackendState::Loading { started_at } => Some(*started_at),
            BackendState::Running { since } => Some(*since),
            _ => None,
        }
    }
}

/// Concurrent map of model id -> `BackendState`. One entry per registered
/// model, seeded to `Stopped` at startup.
#[derive(Debug, Default)]
pub struct StateTable {
    states: DashMap<String, BackendState>,
}

impl StateTable {
    pub fn new(model_ids: impl IntoIterator<Item = String>) -> Self {
        let states = DashMap::new();
        for id in model_ids {
            states.insert(id, BackendState::Stopped);
        }
        Self { states }
    }

    pub fn get(&self, model_id: &str) -> Option<BackendState> {
        self.states.get(model_id).map(|entry| entry.clone())
    }

    pub fn set(&self, model_id: &str, state: BackendState) {
        self.states.insert(model_id.to_string(), state);
    }

    pub fn running_models(&self) -> Vec<String> {
        self.states
            .iter()
            .filter(|entry| entry.value().is_running())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<(String, BackendState)> {
        self.states
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

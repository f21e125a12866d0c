//! Backend Health Prober: a short `GET /health` against every known backend,
//! cached with TTL, probes coalesced per backend so concurrent callers never
//! fire duplicate requests.

pub mod error;

pub use error::HealthCheckError;

use crate::registry::Registry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Liveness classification of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

/// The cached result of the most recent probe of one backend.
#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub last_probed_at: DateTime<Utc>,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            last_probed_at: Utc::now(),
        }
    }
}

impl HealthRecord {
    pub fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.last_probed_at);
        age > chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
    }
}

/// Probes every configured backend's `/health` endpoint, keeping a
/// TTL-cached `HealthRecord` per model id.
pub struct Prober {
    client: reqwest::Client,
    ttl: Duration,
    cache: DashMap<String, HealthRecord>,
    inflight: DashMap<String, Arc<Notify>>,
}

impl Prober {
    pub fn new(ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(3))
                .build()
                .expect("failed to build health-check HTTP client"),
            ttl,
            cache: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    /// Non-blocking read of the last known status, regardless of staleness.
    pub fn cached(&self, model_id: &str) -> HealthRecord {
        self.cache
            .get(model_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Returns a fresh-enough `HealthRecord`, probing (or waiting for an
    /// in-flight probe) if the cached entry is stale or absent.
    pub async fn probe(&self, model_id: &str, backend_base_url: &str) -> HealthRecord {
        if let Some(entry) = self.cache.get(model_id) {
            if !entry.is_stale(self.ttl) {
                return entry.clone();
            }
        }

        loop {
            if let Some(notify) = self.inflight.get(model_id).map(|e| e.clone()) {
                notify.notified().await;
                return self.cached(model_id);
            }

            let notify = Arc::new(Notify::new());
            if self
                .inflight
                .insert(model_id.to_string(), notify.clone())
                .is_some()
            {
                // Lost the race to start a probe; loop back and wait on it.
                continue;
            }

            let record = self.do_probe(backend_base_url).await;
            self.cache.insert(model_id.to_string(), record.clone());
            self.inflight.remove(model_id);
            notify.notify_waiters();
            return record;
        }
    }

    async fn do_probe(&self, backend_base_url: &str) -> HealthRecord {
        let url = format!("{}/health", backend_base_url.trim_end_matches('/'));
        let status = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) => {
                debug!(url = %url, status = %response.status(), "health probe returned non-2xx");
                HealthStatus::Unhealthy
            }
            Err(e) => {
                let classified = HealthCheckError::classify(&e, 3);
                warn!(url = %url, error = %classified, "health probe failed");
                HealthStatus::Unhealthy
            }
        };

        HealthRecord {
            status,
            last_probed_at: Utc::now(),
        }
    }

    /// Probes every registered model once.
    pub async fn probe_all(&self, registry: &Registry) {
        for spec in registry.all() {
            self.probe(&spec.id, &spec.backend_base_url).await;
        }
    }

    /// Spawns a background task that refreshes every model's health once
    /// per TTL, so cached reads stay warm even between client requests.
    pub fn start(
        self: Arc<Self>,
        registry: Arc<Registry>,
        cancel_token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let ttl = self.ttl;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ttl);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("health prober background task stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        self.probe_all(&registry).await;
                    }
                }
            }
        })
    }
}

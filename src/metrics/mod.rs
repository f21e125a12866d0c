//! # Metrics Collection Module
//!
//! Provides request metrics tracking and Prometheus export.
//!
//! ## Overview
//!
//! This module exposes a single endpoint:
//! - `GET /metrics` - Prometheus text format metrics
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `gateway_requests_total{model, status}` - Total requests by outcome
//! - `gateway_errors_total{error_type, model}` - Total errors by type
//! - `gateway_switch_outcomes_total{outcome}` - Smart-switch outcomes
//!
//! **Histograms:**
//! - `gateway_request_duration_seconds{model}` - Request duration
//! - `gateway_switch_duration_seconds` - Smart-switch wall-clock time
//! - `gateway_probe_duration_seconds` - Health probe latency
//!
//! **Gauges:**
//! - `gateway_models_registered` - Number of models in the static registry

pub mod handler;

// Re-export PrometheusBuilder for test compatibility
pub use metrics_exporter_prometheus::PrometheusBuilder;

use crate::registry::Registry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

/// Central coordinator for metrics collection and gauge computation.
pub struct MetricsCollector {
    /// Reference to the model registry for computing gauges
    registry: Arc<Registry>,
    /// Gateway startup time for uptime calculation
    start_time: Instant,
    /// Thread-safe cache for sanitized Prometheus labels
    label_cache: DashMap<String, String>,
    /// Prometheus handle for rendering metrics
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsCollector {
    /// Create a new MetricsCollector.
    pub fn new(
        registry: Arc<Registry>,
        start_time: Instant,
        prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        Self {
            registry,
            start_time,
            label_cache: DashMap::new(),
            prometheus_handle,
        }
    }

    /// Get sanitized Prometheus label (cached for performance).
    ///
    /// Prometheus label names must match regex: `[a-zA-Z_][a-zA-Z0-9_]*`
    /// This function replaces invalid characters with underscores.
    pub fn sanitize_label(&self, label: &str) -> String {
        // Check cache first
        if let Some(cached) = self.label_cache.get(label) {
            return cached.clone();
        }

        // Sanitize: replace non-alphanumeric (except underscore) with underscore
        let mut sanitized = label
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>();

        // Ensure first character is not a digit
        if sanitized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            sanitized.insert(0, '_');
        }

        // Cache and return
        self.label_cache
            .insert(label.to_string(), sanitized.clone());
        sanitized
    }

    /// Update the registry-derived gauge ahead of a `/metrics` scrape.
    pub fn update_registry_gauges(&self) {
        metrics::gauge!("gateway_models_registered").set(self.registry.len() as f64);
    }

    /// Get uptime in seconds since gateway startup.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get reference to the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Render Prometheus metrics in text format.
    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Initialize Prometheus metrics exporter with custom histogram buckets.
///
/// Buckets are sized for LLM inference and model-switch timescales (seconds,
/// not milliseconds): request/probe latency tops out around a minute, while
/// a cold model load can legitimately take several minutes.
///
/// Returns a PrometheusHandle that can be used to render metrics.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let duration_buckets = &[
        0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
    ];
    let switch_buckets = &[1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0, 300.0, 600.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("gateway_request_duration_seconds".to_string()),
            duration_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("gateway_probe_duration_seconds".to_string()),
            duration_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("gateway_switch_duration_seconds".to_string()),
            switch_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}

//! GPU VRAM sampling.
//!
//! `nvml-wrapper` calls are blocking FFI; they run on a blocking thread with
//! a hard deadline so a stuck driver call never stalls the switch engine.

pub mod error;

pub use error::GpuError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

const SAMPLE_TIMEOUT: Duration = Duration::from_secs(5);
const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A point-in-time read of device VRAM, in gibibytes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GpuSnapshot {
    pub used_gb: f64,
    pub total_gb: f64,
    pub available_gb: f64,
    pub taken_at: DateTime<Utc>,
}

impl GpuSnapshot {
    fn zero() -> Self {
        Self {
            used_gb: 0.0,
            total_gb: 0.0,
            available_gb: 0.0,
            taken_at: Utc::now(),
        }
    }
}

/// Seam over GPU memory telemetry so the switch engine and status
/// aggregator can be tested without real hardware.
#[async_trait]
pub trait GpuSampler: Send + Sync {
    async fn sample(&self) -> GpuSnapshot;
}

/// `GpuSampler` backed by NVML (device 0). On timeout or NVML error,
/// `available_gb` is conservatively reported as zero rather than failing the
/// caller — a switch decision under uncertainty should assume no headroom.
pub struct NvmlGpuSampler;

impl NvmlGpuSampler {
    pub fn new() -> Self {
        Self
    }

    fn sample_blocking() -> Result<GpuSnapshot, GpuError> {
        let nvml = nvml_wrapper::Nvml::init().map_err(|e| GpuError::Nvml(e.to_string()))?;
        let device = nvml
            .device_by_index(0)
            .map_err(|e| GpuError::Nvml(e.to_string()))?;
        let info = device
            .memory_info()
            .map_err(|e| GpuError::Nvml(e.to_string()))?;

        let used_gb = info.used as f64 / BYTES_PER_GIB;
        let total_gb = info.total as f64 / BYTES_PER_GIB;
        let available_gb = info.free as f64 / BYTES_PER_GIB;

        Ok(GpuSnapshot {
            used_gb,
            total_gb,
            available_gb,
            taken_at: Utc::now(),
        })
    }
}

impl Default for NvmlGpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GpuSampler for NvmlGpuSampler {
    async fn sample(&self) -> GpuSnapshot {
        let result = tokio::time::timeout(
            SAMPLE_TIMEOUT,
            tokio::task::spawn_blocking(Self::sample_blocking),
        )
        .await;

        match result {
            Ok(Ok(Ok(snapshot))) => snapshot,
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "NVML sample failed, reporting zero available VRAM");
                GpuSnapshot::zero()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "GPU sampling task panicked");
                GpuSnapshot::zero()
            }
            Err(_) => {
                warn!("GPU sample timed out after {:?}", SAMPLE_TIMEOUT);
                GpuSnapshot::zero()
            }
        }
    }
}

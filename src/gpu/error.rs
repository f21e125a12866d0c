/// Errors from the GPU sampling adapter.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("NVML error: {0}")]
    Nvml(String),
}

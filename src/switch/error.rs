/// Errors from the switch engine, mapped to `ApiError` only at the HTTP boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SwitchError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("switch already in progress for {0}")]
    SwitchInProgress(String),

    #[error("insufficient GPU memory: required {required_gb}GB, available {available_gb}GB, achievable {achievable_gb}GB")]
    InsufficientMemory {
        required_gb: f64,
        available_gb: f64,
        achievable_gb: f64,
    },

    #[error("switch failed: {0}")]
    SwitchFailed(String),
}

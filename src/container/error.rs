/// Errors from the container adapter.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("failed to spawn container control process: {0}")]
    Spawn(String),

    #[error("container control process exited with status {0}")]
    NonZeroExit(String),

    #[error("unknown container handle: {0}")]
    UnknownHandle(String),
}

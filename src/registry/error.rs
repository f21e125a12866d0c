/// Errors that can occur during registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("model already exists: {0}")]
    DuplicateModel(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),
}

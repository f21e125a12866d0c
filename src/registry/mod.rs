//! Model registry: the static, process-lifetime table of `ModelSpec`.
//!
//! Seeded once from configuration at startup and never mutated afterwards —
//! there is no add/remove/update surface, unlike a discovery-backed registry.

pub mod error;

pub use error::RegistryError;

use crate::config::{ModelConfig, ToolRoleMode};
use serde::Serialize;
use std::collections::HashMap;

/// An immutable description of one configured model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    pub id: String,
    pub backend_base_url: String,
    pub container_handle: String,
    pub on_disk_path: String,
    pub approx_weights_gb: f64,
    pub vram_estimate_gb: f64,
    pub expected_load_seconds: u64,
    pub description: String,
    pub tool_role_mode: ToolRoleMode,
}

impl From<&ModelConfig> for ModelSpec {
    fn from(config: &ModelConfig) -> Self {
        Self {
            id: config.id.clone(),
            backend_base_url: config.backend_base_url.clone(),
            container_handle: config.container_handle.clone(),
            on_disk_path: config.on_disk_path.clone(),
            approx_weights_gb: config.approx_weights_gb,
            vram_estimate_gb: config.vram_estimate_gb(),
            expected_load_seconds: config.expected_load_seconds,
            description: config.description.clone(),
            tool_role_mode: config.tool_role_mode,
        }
    }
}

/// Static table of `ModelSpec`, keyed by model id.
#[derive(Debug, Default)]
pub struct Registry {
    models: HashMap<String, ModelSpec>,
}

impl Registry {
    /// Builds a registry from configuration. Fails if two models share an id
    /// (configuration validation should already have caught this, but the
    /// registry does not trust callers to have validated).
    pub fn from_configs(configs: &[ModelConfig]) -> Result<Self, RegistryError> {
        let mut models = HashMap::with_capacity(configs.len());
        for config in configs {
            let spec = ModelSpec::from(config);
            if models.insert(spec.id.clone(), spec).is_some() {
                return Err(RegistryError::DuplicateModel(config.id.clone()));
            }
        }
        Ok(Self { models })
    }

    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.models.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

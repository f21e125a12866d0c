//! Per-model backend configuration

use serde::{Deserialize, Serialize};

/// How `role=tool` messages are rewritten before forwarding to a backend
/// that does not natively accept that role (see `tools::inject`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolRoleMode {
    AsUser,
    AsTool,
}

impl Default for ToolRoleMode {
    fn default() -> Self {
        ToolRoleMode::AsUser
    }
}

fn default_vram_multiplier() -> f64 {
    0.85
}

/// A single entry in the static model registry, as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub backend_base_url: String,
    pub container_handle: String,
    pub on_disk_path: String,
    pub approx_weights_gb: f64,
    pub expected_load_seconds: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tool_role_mode: ToolRoleMode,
    #[serde(default = "default_vram_multiplier")]
    pub vram_multiplier: f64,
}

impl ModelConfig {
    /// Predicted resident VRAM for this model: weights x utilization multiplier.
    pub fn vram_estimate_gb(&self) -> f64 {
        self.approx_weights_gb * self.vram_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModelConfig {
        ModelConfig {
            id: "gpt-oss-120b".to_string(),
            backend_base_url: "http://127.0.0.1:9001".to_string(),
            container_handle: "gpt-oss-120b".to_string(),
            on_disk_path: "/models/gpt-oss-120b".to_string(),
            approx_weights_gb: 70.0,
            expected_load_seconds: 60,
            description: "GPT OSS 120B".to_string(),
            tool_role_mode: ToolRoleMode::default(),
            vram_multiplier: default_vram_multiplier(),
        }
    }

    #[test]
    fn test_vram_estimate_applies_multiplier() {
        let model = sample();
        assert!((model.vram_estimate_gb() - 59.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tool_role_mode_defaults_to_as_user() {
        let toml = r#"
            id = "m"
            backend_base_url = "http://localhost:9000"
            container_handle = "m"
            on_disk_path = "/models/m"
            approx_weights_gb = 10.0
            expected_load_seconds = 30
        "#;
        let config: ModelConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.tool_role_mode, ToolRoleMode::AsUser);
        assert!((config.vram_multiplier - 0.85).abs() < f64::EPSILON);
    }
}

//! Configuration module for the gateway
//!
//! Provides layered configuration loading from files, environment variables, and
//! CLI flags (file < env < CLI, highest priority wins).

pub mod auth;
pub mod container;
pub mod error;
pub mod logging;
pub mod models;
pub mod server;
pub mod switch;

pub use auth::AuthConfig;
pub use container::ContainerConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LogRotationConfig, LoggingConfig};
pub use models::{ModelConfig, ToolRoleMode};
pub use server::ServerConfig;
pub use switch::SwitchConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub switch: SwitchConfig,
    pub container: ContainerConfig,
    pub models: Vec<ModelConfig>,
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// If path is `None`, returns default configuration. If path doesn't exist,
    /// returns `NotFound`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supports `GATEWAY_*` environment variables for common settings. Invalid
    /// values are silently ignored (defaults, or the file value, are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("GATEWAY_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("GATEWAY_HOST") {
            self.server.host = host;
        }
        if let Ok(api_key) = std::env::var("GATEWAY_API_KEY") {
            self.auth.api_key = api_key;
        }

        if let Ok(level) = std::env::var("GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GATEWAY_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(webui) = std::env::var("GATEWAY_WEBUI_AUTH_ENABLED") {
            self.server.webui_auth_enabled = webui.to_lowercase() == "true";
        }

        self
    }

    /// Validate configuration. Called once at boot; failure aborts startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        self.auth.validate()?;

        let mut seen = std::collections::HashSet::new();
        for (i, model) in self.models.iter().enumerate() {
            if model.id.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("models[{}].id", i),
                    message: "id cannot be empty".to_string(),
                });
            }
            if !seen.insert(model.id.clone()) {
                return Err(ConfigError::Validation {
                    field: format!("models[{}].id", i),
                    message: format!("duplicate model id '{}'", model.id),
                });
            }
            if model.backend_base_url.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("models[{}].backend_base_url", i),
                    message: "backend_base_url cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}

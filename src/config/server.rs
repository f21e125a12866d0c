//! Server configuration

use serde::{Deserialize, Serialize};

/// HTTP server and CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub webui_auth_enabled: bool,
    pub backend_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            webui_auth_enabled: false,
            backend_timeout_seconds: 300,
        }
    }
}

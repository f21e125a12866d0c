//! Logging configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Pretty-printed logs for humans
    #[default]
    Pretty,
    /// JSON logs for machine parsing
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Log file rotation policy. Round-trips through config load/save; no file
/// sink consults it yet (see DESIGN.md's logging entry) — logs go to
/// stdout/stderr only, so there is nothing to rotate or cap the size of.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRotationConfig {
    pub max_days: u32,
    pub max_total_gb: f64,
}

impl Default for LogRotationConfig {
    fn default() -> Self {
        Self {
            max_days: 7,
            max_total_gb: 1.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub rotation: LogRotationConfig,
    /// Component-specific log levels (e.g., {"switch": "debug", "api": "info"})
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_levels: Option<HashMap<String, String>>,
    /// Enable debug content logging (opt-in, defaults to false)
    /// WARNING: When true, request/response message content will be logged
    /// which may include sensitive data. Use only for debugging.
    #[serde(default)]
    pub enable_content_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            rotation: LogRotationConfig::default(),
            component_levels: None,
            enable_content_logging: false,
        }
    }
}

//! Auth configuration

use super::ConfigError;
use serde::{Deserialize, Serialize};

const KEY_PREFIX: &str = "sk-";
const MIN_HEX_LEN: usize = 32;

/// Bearer-token authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key: String,
}

impl AuthConfig {
    /// Validates the key carries the `sk-` prefix followed by at least
    /// `MIN_HEX_LEN` hex characters. Called once at boot; a failure aborts
    /// startup rather than running with an unusable key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let hex_part = self.api_key.strip_prefix(KEY_PREFIX).ok_or_else(|| {
            ConfigError::Validation {
                field: "auth.api_key".to_string(),
                message: format!("must start with '{}'", KEY_PREFIX),
            }
        })?;

        if hex_part.len() < MIN_HEX_LEN || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::Validation {
                field: "auth.api_key".to_string(),
                message: format!(
                    "must contain at least {} hex characters after '{}'",
                    MIN_HEX_LEN, KEY_PREFIX
                ),
            });
        }

        Ok(())
    }
}

//! Health probe and switch-engine timing configuration

use serde::{Deserialize, Serialize};

/// Timing knobs shared by the health prober and the switch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    pub probe_ttl_seconds: u64,
    pub stuck_threshold_seconds: u64,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            probe_ttl_seconds: 2,
            stuck_threshold_seconds: 90,
        }
    }
}

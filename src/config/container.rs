//! Container control-plane configuration

use serde::{Deserialize, Serialize};

fn default_control_command() -> String {
    "modelctl".to_string()
}

/// Points `container::ProcessContainerAdapter` at the external control
/// command it shells out to for `start`/`stop`/`inspect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub control_command: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            control_command: default_control_command(),
        }
    }
}

//! Container Adapter: the narrow control-plane seam over whatever actually
//! runs backend processes (containers, systemd units, bare processes). The
//! gateway core never manages processes directly — it shells out to an
//! external control command and parses its output.

pub mod error;

pub use error::ContainerError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

/// Container-level lifecycle state, as reported by `inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Absent,
    Starting,
    Running,
    Exited,
    Failed,
}

/// Result of `inspect(model_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    pub lifecycle_state: LifecycleState,
    #[serde(default)]
    pub exit_reason: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

/// Seam over the external control plane so the switch engine and status
/// aggregator are testable without a real container runtime.
#[async_trait]
pub trait ContainerAdapter: Send + Sync {
    /// Fire-and-forget: success means "launching," not "ready."
    async fn start(&self, container_handle: &str) -> Result<(), ContainerError>;

    /// Synchronous: returns once the container has exited.
    async fn stop(&self, container_handle: &str) -> Result<(), ContainerError>;

    async fn inspect(&self, container_handle: &str) -> Result<Inspection, ContainerError>;
}

/// `ContainerAdapter` that shells out to an external control command:
/// `<control_command> start|stop|inspect <handle>`. `inspect` expects a
/// single JSON `Inspection` object on stdout.
pub struct ProcessContainerAdapter {
    control_command: String,
}

impl ProcessContainerAdapter {
    pub fn new(control_command: impl Into<String>) -> Self {
        Self {
            control_command: control_command.into(),
        }
    }
}

#[async_trait]
impl ContainerAdapter for ProcessContainerAdapter {
    async fn start(&self, container_handle: &str) -> Result<(), ContainerError> {
        info!(handle = %container_handle, "starting backend container");
        Command::new(&self.control_command)
            .arg("start")
            .arg(container_handle)
            .spawn()
            .map_err(|e| ContainerError::Spawn(e.to_string()))?;
        Ok(())
    }

    async fn stop(&self, container_handle: &str) -> Result<(), ContainerError> {
        info!(handle = %container_handle, "stopping backend container");
        let status = Command::new(&self.control_command)
            .arg("stop")
            .arg(container_handle)
            .status()
            .await
            .map_err(|e| ContainerError::Spawn(e.to_string()))?;

        if !status.success() {
            warn!(handle = %container_handle, ?status, "stop command exited non-zero");
            return Err(ContainerError::NonZeroExit(status.to_string()));
        }
        Ok(())
    }

    async fn inspect(&self, container_handle: &str) -> Result<Inspection, ContainerError> {
        let output = Command::new(&self.control_command)
            .arg("inspect")
            .arg(container_handle)
            .output()
            .await
            .map_err(|e| ContainerError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(ContainerError::NonZeroExit(output.status.to_string()));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ContainerError::Spawn(format!("malformed inspect output: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_json_round_trip() {
        let inspection = Inspection {
            lifecycle_state: LifecycleState::Running,
            exit_reason: None,
            started_at: Some(Utc::now()),
        };
        let json = serde_json::to_string(&inspection).unwrap();
        let parsed: Inspection = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.lifecycle_state, LifecycleState::Running);
    }

    #[test]
    fn test_lifecycle_state_serde_snake_case() {
        let json = serde_json::to_string(&LifecycleState::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }

    #[test]
    fn test_inspect_deserializes_minimal_json() {
        let json = r#"{"lifecycle_state":"absent"}"#;
        let inspection: Inspection = serde_json::from_str(json).unwrap();
        assert_eq!(inspection.lifecycle_state, LifecycleState::Absent);
        assert!(inspection.exit_reason.is_none());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::allocation::PortAllocation;

/// What the last successful `up` launched. Written when the run reaches
/// `Running` and removed by `down`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub session: String,
    pub started_at: DateTime<Utc>,
    pub launched: Vec<PortAllocation>,
    /// Orchestrated components whose window could not be started. They are
    /// still expected to run, so status keeps reporting them as missing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<PortAllocation>,
}

impl RunRecord {
    pub fn new(session: String, launched: Vec<PortAllocation>) -> Self {
        Self {
            session,
            started_at: Utc::now(),
            launched,
            failed: Vec::new(),
        }
    }

    pub fn with_failed(mut self, failed: Vec<PortAllocation>) -> Self {
        self.failed = failed;
        self
    }

    pub fn launched_names(&self) -> impl Iterator<Item = &str> {
        self.launched.iter().map(|a| a.name.as_str())
    }

    /// Everything this run was meant to keep running: launched components
    /// first, then the ones that failed to start.
    pub fn expected_names(&self) -> impl Iterator<Item = &str> {
        self.launched_names()
            .chain(self.failed.iter().map(|a| a.name.as_str()))
    }
}

/// Phases of one orchestration run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunPhase {
    Idle,
    Preflight,
    Blocked,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Preflight => "preflight",
            Self::Blocked => "blocked",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// What to do when `up` finds the session already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPolicy {
    /// Refuse with a session error, touching nothing.
    Fail,
    /// Keep the running session as it is.
    Reuse,
    /// Tear the session down and start from scratch.
    Recreate,
}

/// A non-fatal problem collected during a lifecycle command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            component: None,
            message: message.into(),
        }
    }

    pub fn for_component(component: &str, message: impl Into<String>) -> Self {
        Self {
            component: Some(component.to_string()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.component {
            Some(component) => write!(f, "{component}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpReport {
    pub allocation: super::allocation::Allocation,
    /// Component windows created by this run, in creation order.
    pub launched: Vec<String>,
    pub reused: bool,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
pub struct DownReport {
    pub session_found: bool,
    /// Component windows that were sent the interrupt/exit sequence.
    pub stopped: Vec<String>,
    pub cleaned_up: bool,
    pub reaped_processes: usize,
    pub warnings: Vec<Warning>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::window::WindowInfo;

/// Observed mismatch between what was started and what is running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "window")]
pub enum DriftWarning {
    /// A run was recorded but its session is gone.
    SessionMissing,
    /// A launched component has no window any more.
    WindowMissing(String),
    /// The window exists but its component process has exited.
    WindowUnbacked(String),
    /// A window that belongs to no known component.
    UnexpectedWindow(String),
}

impl std::fmt::Display for DriftWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionMissing => f.write_str("session recorded by the last run is gone"),
            Self::WindowMissing(name) => write!(f, "window '{name}' vanished"),
            Self::WindowUnbacked(name) => write!(f, "window '{name}' has no running process"),
            Self::UnexpectedWindow(name) => write!(f, "window '{name}' is not a known component"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    pub name: String,
    pub port: u16,
    pub prerequisite: bool,
    pub window: bool,
    pub backed: bool,
    pub ui_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub session: String,
    pub session_exists: bool,
    pub windows: Vec<WindowInfo>,
    pub registry_ready: bool,
    pub cluster_ready: bool,
    pub components: Vec<ComponentStatus>,
    pub drift: Vec<DriftWarning>,
    pub generated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Something was expected to run and reality disagrees.
    pub fn is_degraded(&self) -> bool {
        !self.drift.is_empty()
    }
}

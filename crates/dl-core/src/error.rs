use std::path::PathBuf;

/// Coarse grouping of failures, used by the CLI to decide how loudly to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Precondition,
    Session,
    Window,
    Readiness,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("required tool '{0}' was not found on PATH")]
    ToolMissing(String),

    #[error("cluster is not reachable: {0}")]
    ClusterUnreachable(String),

    #[error("component '{component}' has no working directory at {path}")]
    MissingComponentDirectory { component: String, path: PathBuf },

    #[error("session '{0}' already exists")]
    SessionExists(String),

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("window '{window}' already exists in session '{session}'")]
    WindowExists { session: String, window: String },

    #[error("window '{window}' not found in session '{session}'")]
    WindowNotFound { session: String, window: String },

    #[error("'{target}' did not become ready after {attempts} attempts")]
    ReadinessTimeout { target: String, attempts: u32 },

    #[error("tmux operation failed: {0}")]
    Tmux(String),

    #[error("process failed: {0}")]
    Process(String),

    #[error("state persistence failed: {0}")]
    State(String),

    #[error("interrupted by operator")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigNotFound(_) | Self::InvalidConfig(_) => ErrorCategory::Config,
            Self::ToolMissing(_)
            | Self::ClusterUnreachable(_)
            | Self::MissingComponentDirectory { .. } => ErrorCategory::Precondition,
            Self::SessionExists(_) | Self::SessionNotFound(_) => ErrorCategory::Session,
            Self::WindowExists { .. } | Self::WindowNotFound { .. } => ErrorCategory::Window,
            Self::ReadinessTimeout { .. } => ErrorCategory::Readiness,
            Self::Tmux(_)
            | Self::Process(_)
            | Self::State(_)
            | Self::Interrupted
            | Self::Io(_)
            | Self::Json(_) => ErrorCategory::Internal,
        }
    }

    /// A short operator-facing hint for fixing the failure, if there is one.
    pub fn remediation(&self) -> Option<String> {
        let hint = match self {
            Self::ConfigNotFound(_) => {
                "create a devloop.yaml in the workspace or pass --config".to_string()
            }
            Self::InvalidConfig(_) => "fix devloop.yaml and re-run".to_string(),
            Self::ToolMissing(tool) => format!("install '{tool}' and make sure it is on PATH"),
            Self::ClusterUnreachable(_) => {
                "start the local cluster and check the configured context".to_string()
            }
            Self::MissingComponentDirectory { component, .. } => {
                format!("run the clone step first so '{component}' is checked out")
            }
            Self::SessionExists(_) => {
                "re-run with --reuse to keep it, --recreate to restart it, or run `devloop down`"
                    .to_string()
            }
            Self::SessionNotFound(_) => "run `devloop up` first".to_string(),
            Self::WindowExists { .. } => {
                "run `devloop down` before starting the component again".to_string()
            }
            Self::WindowNotFound { window, .. } => {
                format!("the '{window}' window has exited; check `devloop status`")
            }
            Self::ReadinessTimeout { .. } => {
                "inspect the component window with `tmux attach`, then run `devloop down`"
                    .to_string()
            }
            Self::Interrupted => "run `devloop down` to clean up anything left behind".to_string(),
            Self::Tmux(_) | Self::Process(_) | Self::State(_) | Self::Io(_) | Self::Json(_) => {
                return None
            }
        };
        Some(hint)
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

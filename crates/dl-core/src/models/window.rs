use serde::{Deserialize, Serialize};

/// Foreground commands that mean the component process has exited and the
/// pane fell back to its shell prompt.
const SHELLS: &[&str] = &["bash", "zsh", "sh", "fish", "dash", "ksh", "tcsh"];

/// A window as tmux currently reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub name: String,
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane_pid: Option<u32>,
    pub pane_dead: bool,
    pub current_command: String,
}

impl WindowInfo {
    /// Whether a component process is still running in the window.
    pub fn is_backed(&self) -> bool {
        if self.pane_dead {
            return false;
        }
        let command = self.current_command.trim_start_matches('-');
        !command.is_empty() && !SHELLS.contains(&command)
    }
}

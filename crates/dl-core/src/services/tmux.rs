use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{OrchestratorError, Result};
use crate::models::WindowInfo;

use super::session::Multiplexer;

const WINDOW_FORMAT: &str =
    "#{window_index}\t#{window_name}\t#{pane_pid}\t#{pane_dead}\t#{pane_current_command}";

async fn run_tmux(arguments: &[&str]) -> Result<String> {
    let output = Command::new("tmux")
        .args(arguments)
        .output()
        .await
        .map_err(|e| OrchestratorError::Tmux(format!("failed to start tmux: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OrchestratorError::Tmux(format!(
            "tmux {} failed (exit {}): {}",
            arguments.first().unwrap_or(&""),
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Exact-match target for a session, so `dev` never matches `devloop`.
fn session_target(session: &str) -> String {
    format!("={session}")
}

fn window_target(session: &str, window: &str) -> String {
    format!("={session}:={window}")
}

fn is_absent_session(message: &str) -> bool {
    message.contains("no server running")
        || message.contains("no sessions")
        || message.contains("can't find session")
        || message.contains("error connecting to")
}

pub async fn has_session(name: &str) -> Result<bool> {
    let target = session_target(name);
    let result = Command::new("tmux")
        .args(["has-session", "-t", target.as_str()])
        .output()
        .await
        .map_err(|e| OrchestratorError::Tmux(format!("failed to start tmux: {e}")))?;
    Ok(result.status.success())
}

pub async fn create_session(name: &str, window: &str, working_directory: &Path) -> Result<()> {
    let dir = working_directory.to_string_lossy();
    run_tmux(&["new-session", "-d", "-s", name, "-n", window, "-c", &dir]).await?;
    Ok(())
}

pub async fn create_window(
    session: &str,
    window: &str,
    working_directory: &Path,
    env: &[(String, String)],
) -> Result<()> {
    let dir = working_directory.to_string_lossy();
    let target = format!("{}:", session_target(session));
    let assignments: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let mut args: Vec<&str> = vec!["new-window", "-d", "-t", &target, "-n", window, "-c", &dir];
    for assignment in &assignments {
        args.extend_from_slice(&["-e", assignment]);
    }
    run_tmux(&args).await?;
    Ok(())
}

pub async fn send_keys(session: &str, window: &str, command: &str) -> Result<()> {
    let target = window_target(session, window);
    run_tmux(&["send-keys", "-t", &target, command, "Enter"]).await?;
    Ok(())
}

pub async fn send_ctrl_c(session: &str, window: &str) -> Result<()> {
    let target = window_target(session, window);
    run_tmux(&["send-keys", "-t", &target, "C-c"]).await?;
    Ok(())
}

pub async fn list_windows(session: &str) -> Result<Vec<WindowInfo>> {
    match run_tmux(&["list-windows", "-t", &session_target(session), "-F", WINDOW_FORMAT]).await {
        Ok(output) => Ok(parse_windows(&output)),
        Err(OrchestratorError::Tmux(message)) if is_absent_session(&message) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

pub async fn kill_session(name: &str) -> Result<()> {
    match run_tmux(&["kill-session", "-t", &session_target(name)]).await {
        Ok(_) => Ok(()),
        Err(OrchestratorError::Tmux(message)) if is_absent_session(&message) => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn attach_session(name: &str) -> Result<std::process::ExitStatus> {
    let target = session_target(name);
    let status = Command::new("tmux")
        .args(["attach-session", "-t", target.as_str()])
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .status()
        .await
        .map_err(|e| OrchestratorError::Tmux(format!("failed to attach: {e}")))?;
    Ok(status)
}

/// Parse `list-windows` output produced with `WINDOW_FORMAT`.
pub fn parse_windows(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let index = fields.next()?.trim().parse().ok()?;
            let name = fields.next()?.to_string();
            let pane_pid = fields.next().and_then(|p| p.trim().parse().ok());
            let pane_dead = fields.next().map(|d| d.trim() == "1").unwrap_or(false);
            let current_command = fields.next().unwrap_or("").trim().to_string();
            Some(WindowInfo {
                name,
                index,
                pane_pid,
                pane_dead,
                current_command,
            })
        })
        .collect()
}

/// The live multiplexer backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct TmuxMultiplexer;

#[async_trait]
impl Multiplexer for TmuxMultiplexer {
    async fn has_session(&self, name: &str) -> Result<bool> {
        has_session(name).await
    }

    async fn new_session(&self, name: &str, window: &str, working_dir: &Path) -> Result<()> {
        create_session(name, window, working_dir).await
    }

    async fn new_window(
        &self,
        session: &str,
        window: &str,
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<()> {
        create_window(session, window, working_dir, env).await
    }

    async fn send_line(&self, session: &str, window: &str, line: &str) -> Result<()> {
        send_keys(session, window, line).await
    }

    async fn send_interrupt(&self, session: &str, window: &str) -> Result<()> {
        send_ctrl_c(session, window).await
    }

    async fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>> {
        list_windows(session).await
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        kill_session(name).await
    }

    async fn attach(&self, name: &str) -> Result<()> {
        let status = attach_session(name).await?;
        if status.success() {
            Ok(())
        } else {
            Err(OrchestratorError::Tmux(format!(
                "attach to '{name}' exited with {status}"
            )))
        }
    }
}

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{OrchestratorError, Result};

/// Post-teardown reconciliation: cluster-side objects and helper processes
/// that survive the session being killed.
#[async_trait]
pub trait Cleanup: Send + Sync {
    /// Run the configured cleanup command inside a component checkout.
    async fn reconcile_cluster(&self, command: &str, working_dir: &Path) -> Result<()>;
    /// Terminate processes whose command line matches `pattern`. Returns how
    /// many were signalled.
    async fn reap_processes(&self, pattern: &str) -> Result<usize>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCleanup;

#[async_trait]
impl Cleanup for ProcessCleanup {
    async fn reconcile_cluster(&self, command: &str, working_dir: &Path) -> Result<()> {
        let output = Command::new("sh")
            .args(["-c", command])
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| OrchestratorError::Process(format!("failed to run '{command}': {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::Process(format!(
                "'{command}' in {} failed (exit {}): {}",
                working_dir.display(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn reap_processes(&self, pattern: &str) -> Result<usize> {
        let output = Command::new("pgrep")
            .args(["-f", pattern])
            .output()
            .await
            .map_err(|e| OrchestratorError::Process(format!("failed to run pgrep: {e}")))?;
        // pgrep exits 1 when nothing matched.
        if !output.status.success() {
            return Ok(0);
        }
        let own_pid = std::process::id();
        let pids: Vec<u32> = parse_pids(&String::from_utf8_lossy(&output.stdout))
            .into_iter()
            .filter(|pid| *pid != own_pid)
            .collect();
        let mut reaped = 0;
        for pid in pids {
            if terminate(pid) {
                tracing::info!(pid, pattern, "process_reaped");
                reaped += 1;
            } else {
                tracing::debug!(pid, pattern, "process_already_gone");
            }
        }
        Ok(reaped)
    }
}

pub fn parse_pids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

#[cfg(unix)]
fn terminate(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) -> bool {
    false
}

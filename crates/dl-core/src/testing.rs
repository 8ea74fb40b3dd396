//! In-memory stand-ins for the external collaborators.
//!
//! Every fake can share one `Journal` so tests can assert on the relative
//! order of window creation, dispatch and readiness polls.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{OrchestratorError, Result};
use crate::models::{DevConfig, WindowInfo};
use crate::services::cleanup::Cleanup;
use crate::services::config_loader;
use crate::services::orchestrator::Collaborators;
use crate::services::preflight::ToolLocator;
use crate::services::readiness::{Probe, ProbeTarget};
use crate::services::session::Multiplexer;

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Position of the first entry equal to `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Default)]
struct FakeSession {
    name: String,
    windows: Vec<WindowInfo>,
    next_index: u32,
}

#[derive(Default)]
struct MuxState {
    sessions: Vec<FakeSession>,
    envs: HashMap<String, Vec<(String, String)>>,
    failing_windows: HashSet<String>,
    broken: bool,
}

/// Multiplexer that keeps sessions in memory and mimics a shell running the
/// dispatched commands.
#[derive(Default)]
pub struct FakeMultiplexer {
    state: Mutex<MuxState>,
    journal: Journal,
}

impl FakeMultiplexer {
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Mutex::new(MuxState::default()),
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn window_names(&self, session: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .sessions
            .iter()
            .find(|s| s.name == session)
            .map(|s| s.windows.iter().map(|w| w.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn window_env(&self, window: &str) -> Option<Vec<(String, String)>> {
        self.state.lock().unwrap().envs.get(window).cloned()
    }

    pub fn has(&self, session: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .sessions
            .iter()
            .any(|s| s.name == session)
    }

    /// Simulate the window's process exiting and the window closing with it.
    pub fn close_window(&self, session: &str, window: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(s) = state.sessions.iter_mut().find(|s| s.name == session) {
            s.windows.retain(|w| w.name != window);
        }
    }

    /// Simulate the component process crashing back to a shell prompt.
    pub fn crash_process(&self, session: &str, window: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(w) = state
            .sessions
            .iter_mut()
            .find(|s| s.name == session)
            .and_then(|s| s.windows.iter_mut().find(|w| w.name == window))
        {
            w.current_command = "zsh".into();
        }
    }

    /// Simulate the whole session disappearing behind our back.
    pub fn drop_session(&self, session: &str) {
        self.state
            .lock()
            .unwrap()
            .sessions
            .retain(|s| s.name != session);
    }

    /// Make `new_window` fail for this window name.
    pub fn fail_window(&self, window: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_windows
            .insert(window.to_string());
    }

    /// Make every query fail, as when tmux is not installed.
    pub fn break_backend(&self) {
        self.state.lock().unwrap().broken = true;
    }

    fn check_broken(&self) -> Result<()> {
        if self.state.lock().unwrap().broken {
            return Err(OrchestratorError::Tmux("failed to start tmux: not found".into()));
        }
        Ok(())
    }
}

fn shell_window(name: &str, index: u32) -> WindowInfo {
    WindowInfo {
        name: name.to_string(),
        index,
        pane_pid: Some(1000 + index),
        pane_dead: false,
        current_command: "zsh".into(),
    }
}

#[async_trait]
impl Multiplexer for FakeMultiplexer {
    async fn has_session(&self, name: &str) -> Result<bool> {
        self.check_broken()?;
        Ok(self.has(name))
    }

    async fn new_session(&self, name: &str, window: &str, _working_dir: &Path) -> Result<()> {
        self.check_broken()?;
        let mut state = self.state.lock().unwrap();
        if state.sessions.iter().any(|s| s.name == name) {
            return Err(OrchestratorError::Tmux(format!("duplicate session: {name}")));
        }
        state.sessions.push(FakeSession {
            name: name.to_string(),
            windows: vec![shell_window(window, 0)],
            next_index: 1,
        });
        self.journal.record(format!("new-session {name} {window}"));
        Ok(())
    }

    async fn new_window(
        &self,
        session: &str,
        window: &str,
        _working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<()> {
        self.check_broken()?;
        let mut state = self.state.lock().unwrap();
        if state.failing_windows.contains(window) {
            return Err(OrchestratorError::Tmux(format!("create window failed: {window}")));
        }
        let s = state
            .sessions
            .iter_mut()
            .find(|s| s.name == session)
            .ok_or_else(|| OrchestratorError::Tmux(format!("can't find session: {session}")))?;
        let index = s.next_index;
        s.next_index += 1;
        s.windows.push(shell_window(window, index));
        state.envs.insert(window.to_string(), env.to_vec());
        self.journal.record(format!("new-window {window}"));
        Ok(())
    }

    async fn send_line(&self, session: &str, window: &str, line: &str) -> Result<()> {
        self.check_broken()?;
        let mut state = self.state.lock().unwrap();
        let s = state
            .sessions
            .iter_mut()
            .find(|s| s.name == session)
            .ok_or_else(|| OrchestratorError::Tmux(format!("can't find session: {session}")))?;
        if line == "exit" {
            s.windows.retain(|w| w.name != window);
        } else if let Some(w) = s.windows.iter_mut().find(|w| w.name == window) {
            w.current_command = line.split_whitespace().next().unwrap_or("").to_string();
        }
        self.journal.record(format!("send {window}: {line}"));
        Ok(())
    }

    async fn send_interrupt(&self, session: &str, window: &str) -> Result<()> {
        self.check_broken()?;
        let mut state = self.state.lock().unwrap();
        if let Some(w) = state
            .sessions
            .iter_mut()
            .find(|s| s.name == session)
            .and_then(|s| s.windows.iter_mut().find(|w| w.name == window))
        {
            w.current_command = "zsh".into();
        }
        self.journal.record(format!("interrupt {window}"));
        Ok(())
    }

    async fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>> {
        self.check_broken()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter()
            .find(|s| s.name == session)
            .map(|s| s.windows.clone())
            .unwrap_or_default())
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        self.check_broken()?;
        self.state
            .lock()
            .unwrap()
            .sessions
            .retain(|s| s.name != name);
        self.journal.record(format!("kill-session {name}"));
        Ok(())
    }

    async fn attach(&self, name: &str) -> Result<()> {
        self.journal.record(format!("attach {name}"));
        Ok(())
    }
}

/// Probe with a fixed set of reachable URLs and a cluster switch.
pub struct FakeProbe {
    ready_urls: Mutex<HashSet<String>>,
    cluster_ready: Mutex<bool>,
    journal: Journal,
}

impl FakeProbe {
    pub fn new(journal: Journal) -> Self {
        Self {
            ready_urls: Mutex::new(HashSet::new()),
            cluster_ready: Mutex::new(true),
            journal,
        }
    }

    pub fn set_ready(&self, url: &str) {
        self.ready_urls.lock().unwrap().insert(url.to_string());
    }

    pub fn set_cluster_ready(&self, ready: bool) {
        *self.cluster_ready.lock().unwrap() = ready;
    }
}

#[async_trait]
impl Probe for FakeProbe {
    async fn check(&self, target: &ProbeTarget) -> bool {
        self.journal.record(format!("probe {target}"));
        match target {
            ProbeTarget::Http { url, .. } => self.ready_urls.lock().unwrap().contains(url),
            ProbeTarget::Command { .. } => *self.cluster_ready.lock().unwrap(),
        }
    }
}

#[derive(Default)]
pub struct FakeTools {
    missing: Mutex<HashSet<String>>,
}

impl FakeTools {
    pub fn remove(&self, tool: &str) {
        self.missing.lock().unwrap().insert(tool.to_string());
    }
}

impl ToolLocator for FakeTools {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        if self.missing.lock().unwrap().contains(tool) {
            None
        } else {
            Some(PathBuf::from("/usr/local/bin").join(tool))
        }
    }
}

pub struct FakeCleanup {
    journal: Journal,
    reaped: usize,
}

impl FakeCleanup {
    pub fn new(journal: Journal, reaped: usize) -> Self {
        Self { journal, reaped }
    }
}

#[async_trait]
impl Cleanup for FakeCleanup {
    async fn reconcile_cluster(&self, command: &str, working_dir: &Path) -> Result<()> {
        let dir = working_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.journal.record(format!("cleanup {dir}: {command}"));
        Ok(())
    }

    async fn reap_processes(&self, pattern: &str) -> Result<usize> {
        self.journal.record(format!("reap {pattern}"));
        Ok(self.reaped)
    }
}

/// Everything a lifecycle test needs, wired to one journal.
pub struct Harness {
    pub journal: Journal,
    pub mux: Arc<FakeMultiplexer>,
    pub probe: Arc<FakeProbe>,
    pub tools: Arc<FakeTools>,
    pub workspace: tempfile::TempDir,
}

pub const SCENARIO: &str = r#"
components:
  - name: dependency-controller
    source: github.com/acme/dependency-controller
    category: controller
    prerequisite: true
  - name: api-gateway
    source: github.com/acme/api-gateway
    category: service
  - name: vpc-controller
    source: github.com/acme/vpc-controller
    category: controller
"#;

impl Harness {
    pub fn new() -> Self {
        let journal = Journal::default();
        Self {
            mux: Arc::new(FakeMultiplexer::with_journal(journal.clone())),
            probe: Arc::new(FakeProbe::new(journal.clone())),
            tools: Arc::new(FakeTools::default()),
            journal,
            workspace: tempfile::tempdir().unwrap(),
        }
    }

    /// Parse `components_yaml` with fast test timings and create a checkout
    /// directory for every component.
    pub fn config(&self, components_yaml: &str) -> DevConfig {
        let yaml = format!(
            "components_root: .\nstagger_secs: 1\nshutdown_grace_secs: 1\n\
             cluster:\n  context: kind-devloop\n\
             environment:\n  private_source_scope: github.com/acme/*\n\
             ui:\n  interval_secs: 1\n  max_attempts: 3\n\
             registry:\n  interval_secs: 1\n  max_attempts: 2\n{components_yaml}"
        );
        let config = config_loader::parse(&yaml, self.workspace.path()).unwrap();
        for component in &config.components {
            std::fs::create_dir_all(config.component_directory(component)).unwrap();
        }
        config
    }

    pub fn collaborators(&self, reaped: usize) -> Collaborators {
        Collaborators {
            multiplexer: self.mux.clone(),
            probe: self.probe.clone(),
            tools: self.tools.clone(),
            cleanup: Arc::new(FakeCleanup::new(self.journal.clone(), reaped)),
        }
    }
}

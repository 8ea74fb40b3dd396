//! The `up`/`down` state machine.
//!
//! A run moves `Idle -> Preflight -> Starting -> Running` on `up` and
//! `Stopping -> Stopped` on `down`. `Blocked` is terminal: a hard
//! precondition failed and nothing was touched.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{OrchestratorError, Result};
use crate::models::{
    Allocation, Component, DevConfig, DownReport, RunPhase, RunRecord, SessionPolicy, UpReport,
    Warning,
};

use super::cleanup::{Cleanup, ProcessCleanup};
use super::preflight::{self, PathLocator, ToolLocator};
use super::readiness::{self, HttpProbe, Probe, ProbeTarget, ReadinessCheck};
use super::registry::ComponentRegistry;
use super::session::{Multiplexer, SessionManager};
use super::state::RunStateStore;
use super::{ports, tmux};

/// Typed into a window after the interrupt so its shell exits too.
const EXIT_COMMAND: &str = "exit";

/// The external systems the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub multiplexer: Arc<dyn Multiplexer>,
    pub probe: Arc<dyn Probe>,
    pub tools: Arc<dyn ToolLocator>,
    pub cleanup: Arc<dyn Cleanup>,
}

impl Collaborators {
    pub fn live() -> Self {
        Self {
            multiplexer: Arc::new(tmux::TmuxMultiplexer),
            probe: Arc::new(HttpProbe::new()),
            tools: Arc::new(PathLocator),
            cleanup: Arc::new(ProcessCleanup),
        }
    }
}

pub struct Orchestrator {
    config: DevConfig,
    registry: ComponentRegistry,
    sessions: SessionManager,
    probe: Arc<dyn Probe>,
    tools: Arc<dyn ToolLocator>,
    cleanup: Arc<dyn Cleanup>,
    state_store: RunStateStore,
    phase: RunPhase,
}

impl Orchestrator {
    pub fn new(config: DevConfig, collaborators: Collaborators) -> Result<Self> {
        let registry = ComponentRegistry::new(config.components.clone(), config.base_port)?;
        let state_store = RunStateStore::new(&config.state_dir);
        Ok(Self {
            registry,
            sessions: SessionManager::new(collaborators.multiplexer),
            probe: collaborators.probe,
            tools: collaborators.tools,
            cleanup: collaborators.cleanup,
            state_store,
            config,
            phase: RunPhase::Idle,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn config(&self) -> &DevConfig {
        &self.config
    }

    pub fn allocation(&self) -> Result<Allocation> {
        ports::allocate(self.registry.components(), self.config.base_port)
    }

    pub async fn session_exists(&self) -> Result<bool> {
        self.sessions.session_exists(&self.config.session).await
    }

    pub async fn attach(&self) -> Result<()> {
        self.sessions.attach(&self.config.session).await
    }

    fn transition(&mut self, next: RunPhase) {
        tracing::info!(
            from = %self.phase,
            to = %next,
            session = %self.config.session,
            "phase_transition"
        );
        self.phase = next;
    }

    /// Bring every orchestrated component up in its own window.
    ///
    /// Cancelling `cancel` while components are starting stops further window
    /// creation and tears down whatever was already started.
    pub async fn up(
        &mut self,
        policy: SessionPolicy,
        cancel: &CancellationToken,
    ) -> Result<UpReport> {
        self.transition(RunPhase::Preflight);
        if let Err(e) = self.preflight().await {
            tracing::error!(error = %e, "preflight_failed");
            self.transition(RunPhase::Blocked);
            return Err(e);
        }

        let allocation = self.allocation()?;
        let session = self.config.session.clone();
        let mut warnings = Vec::new();

        if self.sessions.session_exists(&session).await? {
            match policy {
                SessionPolicy::Fail => {
                    tracing::warn!(session = %session, "session_already_running");
                    self.transition(RunPhase::Blocked);
                    return Err(OrchestratorError::SessionExists(session));
                }
                SessionPolicy::Reuse => return self.reuse(allocation).await,
                SessionPolicy::Recreate => {
                    tracing::info!(session = %session, "session_recreate");
                    let (_, teardown_warnings) = self.teardown(&session).await?;
                    warnings.extend(teardown_warnings);
                }
            }
        }

        if let Some(warning) = self.check_registry(cancel).await? {
            warnings.push(warning);
        }

        self.transition(RunPhase::Starting);
        self.sessions
            .create_session(
                &session,
                &self.config.initial_window,
                &self.config.components_root,
            )
            .await?;

        let launched = match self.launch_all(&allocation, cancel, &mut warnings).await {
            Ok(launched) => launched,
            Err(OrchestratorError::Interrupted) => {
                tracing::warn!(session = %session, "startup_interrupted");
                self.transition(RunPhase::Stopping);
                self.teardown(&session).await?;
                if let Err(e) = self.state_store.clear().await {
                    tracing::warn!(error = %e, "state_clear_failed");
                }
                self.transition(RunPhase::Stopped);
                return Err(OrchestratorError::Interrupted);
            }
            Err(e) => {
                tracing::error!(error = %e, "startup_failed");
                return Err(e);
            }
        };

        let (started, failed): (Vec<_>, Vec<_>) = allocation
            .entries()
            .iter()
            .cloned()
            .partition(|a| launched.contains(&a.name));
        let record = RunRecord::new(session, started).with_failed(failed);
        if let Err(e) = self.state_store.save(&record).await {
            warnings.push(Warning::general(format!("run state not saved: {e}")));
        }

        self.transition(RunPhase::Running);
        Ok(UpReport {
            allocation,
            launched,
            reused: false,
            warnings,
        })
    }

    /// Stop every component window and destroy the session. A missing session
    /// is a no-op. With `cleanup`, also reconcile cluster-side objects and
    /// reap leftover helper processes.
    pub async fn down(&mut self, cleanup: bool) -> Result<DownReport> {
        self.transition(RunPhase::Stopping);
        let session = self.config.session.clone();

        let session_found = self.sessions.session_exists(&session).await?;
        let (stopped, mut warnings) = if session_found {
            self.teardown(&session).await?
        } else {
            tracing::info!(session = %session, "session_absent");
            (Vec::new(), Vec::new())
        };

        let mut reaped_processes = 0;
        if cleanup {
            reaped_processes = self.run_cleanup(&mut warnings).await;
        }

        if let Err(e) = self.state_store.clear().await {
            warnings.push(Warning::general(format!("run state not cleared: {e}")));
        }

        self.transition(RunPhase::Stopped);
        Ok(DownReport {
            session_found,
            stopped,
            cleaned_up: cleanup,
            reaped_processes,
            warnings,
        })
    }

    async fn preflight(&self) -> Result<()> {
        preflight::check_tools(self.tools.as_ref(), &preflight::required_tools(&self.config))?;
        preflight::check_component_directories(&self.config, &self.registry)?;
        preflight::check_cluster(self.probe.as_ref(), &self.config).await
    }

    async fn reuse(&mut self, allocation: Allocation) -> Result<UpReport> {
        let session = self.config.session.clone();
        let windows = self.sessions.list_windows(&session).await?;
        let present: Vec<String> = windows
            .into_iter()
            .map(|w| w.name)
            .filter(|name| *name != self.config.initial_window)
            .collect();
        tracing::info!(session = %session, windows = present.len(), "session_reused");

        let mut warnings = Vec::new();
        match self.state_store.load().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let record = RunRecord::new(
                    session,
                    allocation
                        .entries()
                        .iter()
                        .filter(|a| present.contains(&a.name))
                        .cloned()
                        .collect(),
                );
                if let Err(e) = self.state_store.save(&record).await {
                    warnings.push(Warning::general(format!("run state not saved: {e}")));
                }
            }
            Err(e) => warnings.push(Warning::general(format!("run state unreadable: {e}"))),
        }

        self.transition(RunPhase::Running);
        Ok(UpReport {
            allocation,
            launched: Vec::new(),
            reused: true,
            warnings,
        })
    }

    /// Registry reachability does not gate startup; a timeout is a warning.
    async fn check_registry(&self, cancel: &CancellationToken) -> Result<Option<Warning>> {
        let registry = &self.config.registry;
        let check = ReadinessCheck::new(
            ProbeTarget::http(registry.url.clone(), &registry.accept),
            Duration::from_secs(registry.interval_secs),
            registry.max_attempts,
        );
        let readiness = tokio::select! {
            readiness = readiness::probe(self.probe.as_ref(), &check) => readiness,
            _ = cancel.cancelled() => return Err(OrchestratorError::Interrupted),
        };
        if readiness.is_ready() {
            Ok(None)
        } else {
            tracing::warn!(url = %registry.url, "registry_not_ready");
            Ok(Some(Warning::general(format!(
                "image registry at {} is not responding; image pushes will fail",
                registry.url
            ))))
        }
    }

    async fn launch_all(
        &self,
        allocation: &Allocation,
        cancel: &CancellationToken,
        warnings: &mut Vec<Warning>,
    ) -> Result<Vec<String>> {
        let mut launched = Vec::new();

        if let Some(prerequisite) = self.registry.prerequisite().filter(|c| c.gates_startup()) {
            let port = self.port_for(allocation, prerequisite)?;
            self.launch(prerequisite, port).await?;
            launched.push(prerequisite.name.clone());
            self.await_prerequisite(prerequisite, port, cancel).await?;
        }

        let remaining: Vec<&Component> = self
            .registry
            .orchestrated()
            .filter(|c| !c.gates_startup())
            .collect();
        for (i, component) in remaining.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Interrupted);
            }
            if i > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.stagger()) => {}
                    _ = cancel.cancelled() => return Err(OrchestratorError::Interrupted),
                }
            }
            let port = self.port_for(allocation, component)?;
            match self.launch(component, port).await {
                Ok(()) => launched.push(component.name.clone()),
                Err(e) => {
                    tracing::warn!(
                        component = %component.name,
                        error = %e,
                        "component_start_failed"
                    );
                    warnings.push(Warning::for_component(&component.name, e.to_string()));
                }
            }
        }

        Ok(launched)
    }

    /// Later components assume the prerequisite's definitions are registered,
    /// so nothing else starts until its UI answers.
    async fn await_prerequisite(
        &self,
        component: &Component,
        port: u16,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let ui = &self.config.ui;
        let url = ui.url_for(port);
        let check = ReadinessCheck::new(
            ProbeTarget::http(url.clone(), &ui.accept),
            Duration::from_secs(ui.interval_secs),
            ui.max_attempts,
        );
        tracing::info!(component = %component.name, url = %url, "prerequisite_waiting");
        let readiness = tokio::select! {
            readiness = readiness::probe(self.probe.as_ref(), &check) => readiness,
            _ = cancel.cancelled() => return Err(OrchestratorError::Interrupted),
        };
        match readiness {
            readiness::Readiness::Ready { attempts } => {
                tracing::info!(component = %component.name, attempts, "prerequisite_ready");
                Ok(())
            }
            readiness::Readiness::Timeout { attempts } => {
                Err(OrchestratorError::ReadinessTimeout {
                    target: format!("{} ({url})", component.name),
                    attempts,
                })
            }
        }
    }

    fn port_for(&self, allocation: &Allocation, component: &Component) -> Result<u16> {
        allocation.port_of(&component.name).ok_or_else(|| {
            OrchestratorError::InvalidConfig(format!("no port allocated for '{}'", component.name))
        })
    }

    async fn launch(&self, component: &Component, port: u16) -> Result<()> {
        let session = &self.config.session;
        let dir = self.config.component_directory(component);
        let env = self.config.window_environment(port);
        self.sessions
            .create_window(session, &component.name, &dir, &env)
            .await?;
        let command = self.config.startup_command_for(component, port);
        self.sessions
            .dispatch(session, &component.name, &command)
            .await?;
        tracing::info!(component = %component.name, port, "component_started");
        Ok(())
    }

    /// Interrupt each component window, give it the grace period, then type
    /// `exit`; finally kill the session. Windows that vanish midway are
    /// skipped.
    async fn teardown(&self, session: &str) -> Result<(Vec<String>, Vec<Warning>)> {
        let windows = self.sessions.list_windows(session).await?;
        let mut stopped = Vec::new();
        let mut warnings = Vec::new();

        for window in windows
            .iter()
            .filter(|w| w.name != self.config.initial_window)
        {
            match self.sessions.interrupt(session, &window.name).await {
                Ok(()) => {}
                Err(OrchestratorError::WindowNotFound { .. }) => {
                    tracing::debug!(window = %window.name, "window_gone_before_interrupt");
                    continue;
                }
                Err(e) => {
                    warnings.push(Warning::for_component(&window.name, e.to_string()));
                    continue;
                }
            }
            tokio::time::sleep(self.config.shutdown_grace()).await;
            match self.sessions.dispatch(session, &window.name, EXIT_COMMAND).await {
                Ok(()) | Err(OrchestratorError::WindowNotFound { .. }) => {}
                Err(e) => warnings.push(Warning::for_component(&window.name, e.to_string())),
            }
            tracing::info!(window = %window.name, "window_stopped");
            stopped.push(window.name.clone());
        }

        self.sessions.destroy_session(session).await?;
        Ok((stopped, warnings))
    }

    async fn run_cleanup(&self, warnings: &mut Vec<Warning>) -> usize {
        if let Some(command) = &self.config.cleanup.command {
            for component in self.registry.orchestrated() {
                let dir = self.config.component_directory(component);
                if !dir.is_dir() {
                    continue;
                }
                if let Err(e) = self.cleanup.reconcile_cluster(command, &dir).await {
                    tracing::warn!(
                        component = %component.name,
                        error = %e,
                        "cluster_cleanup_failed"
                    );
                    warnings.push(Warning::for_component(&component.name, e.to_string()));
                }
            }
        }

        let Some(pattern) = &self.config.cleanup.process_pattern else {
            return 0;
        };
        match self.cleanup.reap_processes(pattern).await {
            Ok(count) => count,
            Err(e) => {
                warnings.push(Warning::general(format!("process cleanup failed: {e}")));
                0
            }
        }
    }
}

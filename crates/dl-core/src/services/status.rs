//! Point-in-time view of the environment.
//!
//! Reporting never fails on runtime conditions: an unreachable tmux server,
//! registry or cluster shows up as "down" in the snapshot. Only config
//! problems are errors, and those are caught before a reporter exists.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::models::{
    Allocation, ComponentStatus, DevConfig, DriftWarning, RunRecord, StatusSnapshot, WindowInfo,
};

use super::orchestrator::Collaborators;
use super::ports;
use super::readiness::{self, Probe, ProbeTarget, ReadinessCheck};
use super::registry::ComponentRegistry;
use super::session::SessionManager;
use super::state::RunStateStore;

pub struct StatusReporter {
    config: DevConfig,
    allocation: Allocation,
    registry: ComponentRegistry,
    sessions: SessionManager,
    probe: Arc<dyn Probe>,
    state_store: RunStateStore,
}

impl StatusReporter {
    pub fn new(config: DevConfig, collaborators: Collaborators) -> Result<Self> {
        let registry = ComponentRegistry::new(config.components.clone(), config.base_port)?;
        let allocation = ports::allocate(registry.components(), config.base_port)?;
        Ok(Self {
            state_store: RunStateStore::new(&config.state_dir),
            sessions: SessionManager::new(collaborators.multiplexer),
            probe: collaborators.probe,
            registry,
            allocation,
            config,
        })
    }

    pub async fn report(&self) -> StatusSnapshot {
        let session = &self.config.session;
        let session_exists = match self.sessions.session_exists(session).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::debug!(error = %e, "status_session_query_failed");
                false
            }
        };
        let windows = if session_exists {
            self.sessions.list_windows(session).await.unwrap_or_else(|e| {
                tracing::debug!(error = %e, "status_window_query_failed");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let registry_ready = self
            .probe_once(ProbeTarget::http(
                self.config.registry.url.clone(),
                &self.config.registry.accept,
            ))
            .await;
        let cluster_ready = match ProbeTarget::command(&self.config.cluster.check_command()) {
            Some(target) => self.probe_once(target).await,
            None => false,
        };

        let mut components = Vec::new();
        for allocation in self.allocation.entries() {
            let window = windows.iter().find(|w| w.name == allocation.name);
            let ui_ready = match window {
                Some(_) => {
                    self.probe_once(ProbeTarget::http(
                        self.config.ui.url_for(allocation.port),
                        &self.config.ui.accept,
                    ))
                    .await
                }
                None => false,
            };
            components.push(ComponentStatus {
                name: allocation.name.clone(),
                port: allocation.port,
                prerequisite: self
                    .registry
                    .get(&allocation.name)
                    .is_some_and(|c| c.prerequisite),
                window: window.is_some(),
                backed: window.is_some_and(WindowInfo::is_backed),
                ui_ready,
            });
        }

        let record = match self.state_store.load().await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "status_state_unreadable");
                None
            }
        };
        let drift = self.detect_drift(session_exists, &windows, record.as_ref());

        StatusSnapshot {
            session: session.clone(),
            session_exists,
            windows,
            registry_ready,
            cluster_ready,
            components,
            drift,
            generated_at: Utc::now(),
        }
    }

    async fn probe_once(&self, target: ProbeTarget) -> bool {
        readiness::probe(self.probe.as_ref(), &ReadinessCheck::once(target))
            .await
            .is_ready()
    }

    /// Compare the observed windows with what should be running. Without a
    /// live session and without a recorded run there is nothing to compare.
    fn detect_drift(
        &self,
        session_exists: bool,
        windows: &[WindowInfo],
        record: Option<&RunRecord>,
    ) -> Vec<DriftWarning> {
        if !session_exists {
            return match record {
                Some(_) => vec![DriftWarning::SessionMissing],
                None => Vec::new(),
            };
        }

        let expected: Vec<&str> = match record {
            Some(record) => record.expected_names().collect(),
            None => self.allocation.entries().iter().map(|a| a.name.as_str()).collect(),
        };
        let known: HashSet<&str> = self
            .registry
            .components()
            .iter()
            .map(|c| c.name.as_str())
            .collect();

        let mut drift = Vec::new();
        for name in &expected {
            match windows.iter().find(|w| w.name == *name) {
                None => drift.push(DriftWarning::WindowMissing(name.to_string())),
                Some(window) if !window.is_backed() => {
                    drift.push(DriftWarning::WindowUnbacked(name.to_string()))
                }
                Some(_) => {}
            }
        }
        for window in windows {
            if window.name != self.config.initial_window && !known.contains(window.name.as_str()) {
                drift.push(DriftWarning::UnexpectedWindow(window.name.clone()));
            }
        }
        drift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionPolicy;
    use crate::services::orchestrator::Orchestrator;
    use crate::services::session::Multiplexer;
    use crate::testing::{Harness, SCENARIO};
    use std::path::Path;
    use tokio_util::sync::CancellationToken;

    fn ready_harness() -> Harness {
        let harness = Harness::new();
        harness.probe.set_ready("http://localhost:10350/");
        harness.probe.set_ready("http://localhost:10351/");
        harness.probe.set_ready("http://localhost:5001/v2/");
        harness
    }

    async fn bring_up(harness: &Harness) {
        Orchestrator::new(harness.config(SCENARIO), harness.collaborators(0))
            .unwrap()
            .up(SessionPolicy::Fail, &CancellationToken::new())
            .await
            .unwrap();
    }

    fn reporter(harness: &Harness) -> StatusReporter {
        StatusReporter::new(harness.config(SCENARIO), harness.collaborators(0)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_running_reports_all_down() {
        let harness = Harness::new();
        harness.probe.set_cluster_ready(false);
        let snapshot = reporter(&harness).report().await;

        assert!(!snapshot.session_exists);
        assert!(!snapshot.registry_ready);
        assert!(!snapshot.cluster_ready);
        assert!(snapshot.drift.is_empty());
        assert_eq!(snapshot.components.len(), 3);
        assert_eq!(snapshot.components[0].port, 10350);
        assert!(snapshot.components.iter().all(|c| !c.window && !c.ui_ready));
        assert_eq!(harness.journal.count_prefix("probe http://localhost:1035"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_run_has_no_drift() {
        let harness = ready_harness();
        bring_up(&harness).await;

        let snapshot = reporter(&harness).report().await;
        assert!(snapshot.session_exists);
        assert!(snapshot.registry_ready);
        assert!(snapshot.cluster_ready);
        assert!(!snapshot.is_degraded());
        assert_eq!(snapshot.windows.len(), 4);

        let gateway = &snapshot.components[1];
        assert_eq!(gateway.name, "api-gateway");
        assert!(gateway.window && gateway.backed && gateway.ui_ready);
        assert!(snapshot.components[0].prerequisite);
        assert!(!snapshot.components[2].ui_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_and_crashed_windows_are_drift() {
        let harness = ready_harness();
        bring_up(&harness).await;
        harness.mux.close_window("devloop", "api-gateway");
        harness.mux.crash_process("devloop", "vpc-controller");

        let snapshot = reporter(&harness).report().await;
        assert_eq!(
            snapshot.drift,
            vec![
                DriftWarning::WindowMissing("api-gateway".into()),
                DriftWarning::WindowUnbacked("vpc-controller".into()),
            ]
        );
        assert!(!snapshot.components[1].window);
        assert!(snapshot.components[2].window);
        assert!(!snapshot.components[2].backed);
    }

    #[tokio::test(start_paused = true)]
    async fn component_that_failed_to_start_stays_degraded() {
        let harness = ready_harness();
        harness.mux.fail_window("api-gateway");
        bring_up(&harness).await;

        let snapshot = reporter(&harness).report().await;
        assert_eq!(
            snapshot.drift,
            vec![DriftWarning::WindowMissing("api-gateway".into())]
        );
        assert!(snapshot.is_degraded());
        assert!(!snapshot.components[1].window);
    }

    #[tokio::test(start_paused = true)]
    async fn session_gone_after_recorded_run() {
        let harness = ready_harness();
        bring_up(&harness).await;
        harness.mux.drop_session("devloop");

        let snapshot = reporter(&harness).report().await;
        assert!(!snapshot.session_exists);
        assert_eq!(snapshot.drift, vec![DriftWarning::SessionMissing]);
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_windows_are_flagged() {
        let harness = ready_harness();
        bring_up(&harness).await;
        harness
            .mux
            .new_window("devloop", "scratch", Path::new("/tmp"), &[])
            .await
            .unwrap();

        let snapshot = reporter(&harness).report().await;
        assert_eq!(
            snapshot.drift,
            vec![DriftWarning::UnexpectedWindow("scratch".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn session_without_record_expects_every_component() {
        let harness = ready_harness();
        let config = harness.config(SCENARIO);
        harness
            .mux
            .new_session("devloop", "control", Path::new("/tmp"))
            .await
            .unwrap();

        let snapshot = StatusReporter::new(config, harness.collaborators(0))
            .unwrap()
            .report()
            .await;
        assert_eq!(snapshot.drift.len(), 3);
        assert!(snapshot
            .drift
            .iter()
            .all(|d| matches!(d, DriftWarning::WindowMissing(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn broken_backend_reads_as_down() {
        let harness = Harness::new();
        harness.mux.break_backend();
        let snapshot = reporter(&harness).report().await;
        assert!(!snapshot.session_exists);
        assert!(snapshot.windows.is_empty());
    }
}

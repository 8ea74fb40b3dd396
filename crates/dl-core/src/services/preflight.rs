use std::path::PathBuf;

use crate::error::{OrchestratorError, Result};
use crate::models::DevConfig;

use super::readiness::{self, Probe, ProbeTarget, ReadinessCheck};
use super::registry::ComponentRegistry;

/// Finds external executables.
pub trait ToolLocator: Send + Sync {
    fn locate(&self, tool: &str) -> Option<PathBuf>;
}

/// Looks tools up on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathLocator;

impl ToolLocator for PathLocator {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }
}

/// The configured tools plus tmux, which the orchestrator always needs.
pub fn required_tools(config: &DevConfig) -> Vec<String> {
    let mut tools = vec!["tmux".to_string()];
    for tool in &config.tools {
        if !tools.contains(tool) {
            tools.push(tool.clone());
        }
    }
    tools
}

pub fn check_tools(locator: &dyn ToolLocator, tools: &[String]) -> Result<()> {
    for tool in tools {
        match locator.locate(tool) {
            Some(path) => tracing::debug!(tool = %tool, path = %path.display(), "tool_found"),
            None => return Err(OrchestratorError::ToolMissing(tool.clone())),
        }
    }
    Ok(())
}

/// Every orchestrated component must already be checked out.
pub fn check_component_directories(config: &DevConfig, registry: &ComponentRegistry) -> Result<()> {
    for component in registry.orchestrated() {
        let path = config.component_directory(component);
        if !path.is_dir() {
            return Err(OrchestratorError::MissingComponentDirectory {
                component: component.name.clone(),
                path,
            });
        }
    }
    Ok(())
}

/// One attempt against the cluster API. Not retried: an unreachable cluster
/// blocks the run.
pub async fn check_cluster(probe: &dyn Probe, config: &DevConfig) -> Result<()> {
    let argv = config.cluster.check_command();
    let target = ProbeTarget::command(&argv)
        .ok_or_else(|| OrchestratorError::InvalidConfig("cluster check command is empty".into()))?;
    let description = target.to_string();
    if readiness::probe(probe, &ReadinessCheck::once(target))
        .await
        .is_ready()
    {
        Ok(())
    } else {
        Err(OrchestratorError::ClusterUnreachable(format!(
            "`{description}` failed"
        )))
    }
}

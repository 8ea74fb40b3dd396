use std::path::{Path, PathBuf};

use crate::error::{OrchestratorError, Result};
use crate::models::DevConfig;

use super::registry;

pub const CONFIG_FILENAME: &str = "devloop.yaml";
const STATE_DIRNAME: &str = ".devloop";

/// Load and validate the configuration file at `config_path`.
pub fn load(config_path: &Path) -> Result<DevConfig> {
    if !config_path.exists() {
        return Err(OrchestratorError::ConfigNotFound(config_path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(config_path)?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    parse(&contents, &base_dir)
}

/// Parse configuration text. Relative paths resolve against `base_dir`.
pub fn parse(contents: &str, base_dir: &Path) -> Result<DevConfig> {
    let mut config: DevConfig = serde_yaml::from_str(contents)
        .map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))?;

    if config.session.trim().is_empty() {
        return Err(OrchestratorError::InvalidConfig(
            "session name must not be empty".into(),
        ));
    }
    if config.initial_window.trim().is_empty() {
        return Err(OrchestratorError::InvalidConfig(
            "initial_window must not be empty".into(),
        ));
    }
    if config.registry.max_attempts == 0 {
        return Err(OrchestratorError::InvalidConfig(
            "registry.max_attempts must be at least 1".into(),
        ));
    }
    if config.ui.max_attempts == 0 {
        return Err(OrchestratorError::InvalidConfig(
            "ui.max_attempts must be at least 1".into(),
        ));
    }
    registry::validate(&config.components, config.base_port)?;
    if config
        .components
        .iter()
        .any(|c| c.name == config.initial_window)
    {
        return Err(OrchestratorError::InvalidConfig(format!(
            "component name '{}' collides with the initial window",
            config.initial_window
        )));
    }

    if config.components_root.is_relative() {
        config.components_root = base_dir.join(&config.components_root);
    }
    config.state_dir = base_dir.join(STATE_DIRNAME);
    Ok(config)
}

/// Walk up from `start` looking for the config file. Stops at the first
/// directory containing either the config file or a `.git` directory.
pub fn find_config(start: &Path) -> PathBuf {
    let mut dir = start;
    loop {
        let candidate = dir.join(CONFIG_FILENAME);
        if candidate.exists() {
            return candidate;
        }
        if dir.join(".git").exists() {
            return candidate;
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }
    start.join(CONFIG_FILENAME)
}

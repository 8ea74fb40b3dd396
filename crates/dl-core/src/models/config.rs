use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::component::Component;

pub const DEFAULT_SESSION: &str = "devloop";
pub const DEFAULT_INITIAL_WINDOW: &str = "control";
pub const DEFAULT_BASE_PORT: u16 = 10350;
pub const DEFAULT_STARTUP_COMMAND: &str = "tilt up --port {port}";

#[derive(Debug, Clone, Deserialize)]
pub struct DevConfig {
    #[serde(default = "default_session")]
    pub session: String,
    #[serde(default = "default_initial_window")]
    pub initial_window: String,
    /// Directory holding one checkout per component. Relative paths are
    /// resolved against the config file's directory by the loader.
    #[serde(default = "default_components_root")]
    pub components_root: PathBuf,
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    #[serde(default = "default_startup_command")]
    pub startup_command: String,
    #[serde(default = "default_stagger_secs")]
    pub stagger_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub components: Vec<Component>,
    /// Where run state is kept. Filled in by the loader.
    #[serde(skip)]
    pub state_dir: PathBuf,
}

impl DevConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_secs(self.stagger_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn component_directory(&self, component: &Component) -> PathBuf {
        self.components_root.join(component.directory_name())
    }

    /// Startup command for a component with its allocated port substituted in.
    pub fn startup_command_for(&self, component: &Component, port: u16) -> String {
        let template = component
            .command
            .as_deref()
            .unwrap_or(&self.startup_command);
        template
            .replace("{port}", &port.to_string())
            .replace("{name}", &component.name)
    }

    /// Variables handed to every component window. The orchestrator never
    /// interprets these.
    pub fn window_environment(&self, port: u16) -> Vec<(String, String)> {
        let mut env = Vec::new();
        if let Some(scope) = &self.environment.private_source_scope {
            env.push(("GOPRIVATE".to_string(), scope.clone()));
        }
        if let Some(context) = self
            .environment
            .allowed_context
            .as_ref()
            .or(self.cluster.context.as_ref())
        {
            env.push(("ALLOW_K8S_CONTEXT".to_string(), context.clone()));
        }
        if let Some(address) = self.registry.address() {
            env.push(("LOCAL_REGISTRY".to_string(), address));
        }
        env.push(("DEVLOOP_PORT".to_string(), port.to_string()));
        for (key, value) in &self.environment.extra {
            env.push((key.clone(), value.clone()));
        }
        env
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
    #[serde(default = "default_registry_accept")]
    pub accept: Vec<u16>,
    #[serde(default = "default_registry_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_registry_attempts")]
    pub max_attempts: u32,
}

impl RegistryConfig {
    /// `host:port` of the registry, as image references expect it.
    pub fn address(&self) -> Option<String> {
        let without_scheme = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        let host = without_scheme.split('/').next()?;
        if host.is_empty() {
            None
        } else {
            Some(host.to_string())
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            accept: default_registry_accept(),
            interval_secs: default_registry_interval_secs(),
            max_attempts: default_registry_attempts(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub context: Option<String>,
    /// Command whose zero exit status means the cluster API is reachable.
    #[serde(default)]
    pub check: Vec<String>,
}

impl ClusterConfig {
    pub fn check_command(&self) -> Vec<String> {
        if !self.check.is_empty() {
            return self.check.clone();
        }
        let mut command = vec!["kubectl".to_string(), "cluster-info".to_string()];
        if let Some(context) = &self.context {
            command.push("--context".to_string());
            command.push(context.clone());
        }
        command
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_ui_host")]
    pub host: String,
    #[serde(default = "default_ui_accept")]
    pub accept: Vec<u16>,
    #[serde(default = "default_ui_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_ui_attempts")]
    pub max_attempts: u32,
}

impl UiConfig {
    pub fn url_for(&self, port: u16) -> String {
        format!("http://{}:{port}/", self.host)
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            host: default_ui_host(),
            accept: default_ui_accept(),
            interval_secs: default_ui_interval_secs(),
            max_attempts: default_ui_attempts(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub private_source_scope: Option<String>,
    #[serde(default)]
    pub allowed_context: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Run in each component directory to remove cluster-side objects.
    #[serde(default = "default_cleanup_command")]
    pub command: Option<String>,
    /// Command-line pattern of helper processes left behind by the tool.
    #[serde(default = "default_process_pattern")]
    pub process_pattern: Option<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            command: default_cleanup_command(),
            process_pattern: default_process_pattern(),
        }
    }
}

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

fn default_initial_window() -> String {
    DEFAULT_INITIAL_WINDOW.to_string()
}

fn default_components_root() -> PathBuf {
    PathBuf::from("..")
}

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

fn default_startup_command() -> String {
    DEFAULT_STARTUP_COMMAND.to_string()
}

fn default_stagger_secs() -> u64 {
    2
}

fn default_shutdown_grace_secs() -> u64 {
    3
}

fn default_tools() -> Vec<String> {
    vec!["tmux".into(), "tilt".into(), "kubectl".into()]
}

fn default_registry_url() -> String {
    "http://localhost:5001/v2/".to_string()
}

fn default_registry_accept() -> Vec<u16> {
    vec![200, 401]
}

fn default_registry_interval_secs() -> u64 {
    2
}

fn default_registry_attempts() -> u32 {
    5
}

fn default_ui_host() -> String {
    "localhost".to_string()
}

fn default_ui_accept() -> Vec<u16> {
    vec![200, 302]
}

fn default_ui_interval_secs() -> u64 {
    2
}

fn default_ui_attempts() -> u32 {
    60
}

fn default_cleanup_command() -> Option<String> {
    Some("tilt down".to_string())
}

fn default_process_pattern() -> Option<String> {
    Some("tilt up".to_string())
}

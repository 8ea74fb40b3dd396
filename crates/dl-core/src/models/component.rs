use serde::{Deserialize, Serialize};

/// What kind of project a component is. The orchestrator itself does not
/// branch on this; it is carried for the build tooling around it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    Controller,
    Service,
    Tool,
    Library,
    #[default]
    #[serde(other)]
    Other,
}

/// One independently developed project managed by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub category: ComponentCategory,
    #[serde(default = "default_orchestrated")]
    pub orchestrated: bool,
    /// Provides the shared schema the other components need before they start.
    #[serde(default)]
    pub prerequisite: bool,
    /// Declared port preference. The allocator's sequential port always wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Working directory relative to the components root. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Startup command template; `{port}` and `{name}` are substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

fn default_orchestrated() -> bool {
    true
}

impl Component {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            category: ComponentCategory::Other,
            orchestrated: true,
            prerequisite: false,
            port: None,
            directory: None,
            command: None,
        }
    }

    pub fn directory_name(&self) -> &str {
        self.directory.as_deref().unwrap_or(&self.name)
    }

    /// Whether this component gates the startup of everything else.
    pub fn gates_startup(&self) -> bool {
        self.prerequisite && self.orchestrated
    }
}

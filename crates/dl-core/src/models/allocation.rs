use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortAllocation {
    pub name: String,
    pub port: u16,
}

/// Ordered component-to-port mapping for one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    entries: Vec<PortAllocation>,
}

impl Allocation {
    pub fn from_entries(entries: Vec<PortAllocation>) -> Self {
        Self { entries }
    }

    pub fn port_of(&self, name: &str) -> Option<u16> {
        self.entries.iter().find(|a| a.name == name).map(|a| a.port)
    }

    pub fn entries(&self) -> &[PortAllocation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use std::collections::HashSet;

use crate::error::{OrchestratorError, Result};
use crate::models::Component;

/// Immutable, validated view over the declared components.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    components: Vec<Component>,
}

impl ComponentRegistry {
    pub fn new(components: Vec<Component>, base_port: u16) -> Result<Self> {
        validate(&components, base_port)?;
        Ok(Self { components })
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Components with a startup program, in declaration order.
    pub fn orchestrated(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|c| c.orchestrated)
    }

    pub fn prerequisite(&self) -> Option<&Component> {
        self.components.iter().find(|c| c.prerequisite)
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// Reject entries that would make the run ambiguous instead of skipping them.
pub fn validate(components: &[Component], base_port: u16) -> Result<()> {
    if components.is_empty() {
        return Err(OrchestratorError::InvalidConfig(
            "at least one component is required".into(),
        ));
    }

    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, component) in components.iter().enumerate() {
        if component.name.trim().is_empty() {
            errors.push(format!("component {i} has an empty name"));
            continue;
        }
        if component
            .name
            .chars()
            .any(|c| c.is_whitespace() || c == ':' || c == '.')
        {
            errors.push(format!(
                "component name '{}' may not contain whitespace, ':' or '.'",
                component.name
            ));
        }
        if component.source.trim().is_empty() {
            errors.push(format!("component '{}' has an empty source", component.name));
        }
        if !seen.insert(component.name.as_str()) {
            errors.push(format!("component '{}' is declared twice", component.name));
        }
    }

    let prerequisites: Vec<&str> = components
        .iter()
        .filter(|c| c.prerequisite)
        .map(|c| c.name.as_str())
        .collect();
    if prerequisites.len() > 1 {
        errors.push(format!(
            "only one prerequisite component is allowed, found: {}",
            prerequisites.join(", ")
        ));
    }

    let orchestrated = components.iter().filter(|c| c.orchestrated).count();
    if orchestrated > 0 && u32::from(base_port) + orchestrated as u32 - 1 > u32::from(u16::MAX) {
        errors.push(format!(
            "base_port {base_port} leaves no room for {orchestrated} components"
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(OrchestratorError::InvalidConfig(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components() -> Vec<Component> {
        let mut dependency = Component::new("dependency-controller", "github.com/acme/dc");
        dependency.prerequisite = true;
        let mut docs = Component::new("docs", "github.com/acme/docs");
        docs.orchestrated = false;
        vec![
            dependency,
            Component::new("api-gateway", "github.com/acme/api-gateway"),
            docs,
            Component::new("vpc-controller", "github.com/acme/vpc-controller"),
        ]
    }

    #[test]
    fn orchestrated_preserves_declaration_order() {
        let registry = ComponentRegistry::new(components(), 10350).unwrap();
        let names: Vec<&str> = registry.orchestrated().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["dependency-controller", "api-gateway", "vpc-controller"]
        );
        assert_eq!(
            registry.prerequisite().map(|c| c.name.as_str()),
            Some("dependency-controller")
        );
        assert!(registry.get("docs").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut list = components();
        list.push(Component::new("api-gateway", "elsewhere"));
        let err = ComponentRegistry::new(list, 10350).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn two_prerequisites_are_rejected() {
        let mut list = components();
        list[1].prerequisite = true;
        let err = ComponentRegistry::new(list, 10350).unwrap_err();
        assert!(err.to_string().contains("only one prerequisite"));
    }

    #[test]
    fn empty_name_is_rejected() {
        let list = vec![Component::new("", "github.com/acme/x")];
        assert!(matches!(
            validate(&list, 10350),
            Err(OrchestratorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn window_target_characters_are_rejected() {
        let list = vec![Component::new("api:gateway", "github.com/acme/x")];
        assert!(validate(&list, 10350).is_err());
    }

    #[test]
    fn port_range_overflow_is_rejected() {
        assert!(validate(&components(), u16::MAX).is_err());
        assert!(validate(&components(), u16::MAX - 2).is_ok());
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(validate(&[], 10350).is_err());
    }
}

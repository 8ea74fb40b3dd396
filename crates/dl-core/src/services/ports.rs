use crate::error::{OrchestratorError, Result};
use crate::models::{Allocation, Component, PortAllocation};

/// Assign every orchestrated component a port.
///
/// The prerequisite component, if orchestrated, always gets `base_port`. The
/// rest follow as `base_port + 1, + 2, ...` in declaration order. This is a
/// pure function of its inputs: the orchestrator and the status reporter each
/// call it and must arrive at the same table.
pub fn allocate(components: &[Component], base_port: u16) -> Result<Allocation> {
    let prerequisite = components.iter().find(|c| c.gates_startup());
    let ordered = prerequisite.into_iter().chain(
        components
            .iter()
            .filter(|c| c.orchestrated && !c.gates_startup()),
    );

    let mut entries = Vec::new();
    for (offset, component) in ordered.enumerate() {
        let port = u16::try_from(offset)
            .ok()
            .and_then(|offset| base_port.checked_add(offset))
            .ok_or_else(|| {
                OrchestratorError::InvalidConfig(format!(
                    "port for '{}' would exceed {}",
                    component.name,
                    u16::MAX
                ))
            })?;
        if let Some(declared) = component.port {
            if declared != port {
                tracing::debug!(
                    component = %component.name,
                    declared,
                    allocated = port,
                    "declared_port_overridden"
                );
            }
        }
        entries.push(PortAllocation {
            name: component.name.clone(),
            port,
        });
    }
    Ok(Allocation::from_entries(entries))
}

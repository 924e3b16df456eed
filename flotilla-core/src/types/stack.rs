//! Stack-level snapshot types.

use crate::components::Component;
use crate::types::component::{ComponentState, ComponentStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Aggregate view of one stack at a point in time: a histogram of component
/// states plus one row per component with its current state and last
/// published info.
#[derive(Debug, Clone, Serialize)]
pub struct StackStateEvent {
    pub stack_name: String,
    pub state_counts: BTreeMap<ComponentState, usize>,
    pub components: Vec<ComponentStatus>,
}

impl StackStateEvent {
    /// Compute a fresh snapshot from the components' current states.
    ///
    /// The histogram is derived from the same rows it is published with, so
    /// its counts always sum to the stack's component count.
    pub fn compute(stack_name: &str, components: &[Arc<dyn Component>]) -> Self {
        let rows: Vec<ComponentStatus> = components
            .iter()
            .map(|component| ComponentStatus {
                name: component.name().to_string(),
                kind: component.kind().to_string(),
                id: component.id(),
                state: component.current_state(),
                info: component.info(),
            })
            .collect();

        let mut state_counts = BTreeMap::new();
        for row in &rows {
            *state_counts.entry(row.state.state).or_insert(0) += 1;
        }

        Self { stack_name: stack_name.to_string(), state_counts, components: rows }
    }

    /// Number of components this snapshot covers.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Rewrite every component's published connection metadata for a
    /// consumer that reaches this host as `public_host`.
    pub fn update_host_references(&self, public_host: &str) -> Self {
        Self {
            stack_name: self.stack_name.clone(),
            state_counts: self.state_counts.clone(),
            components: self
                .components
                .iter()
                .map(|row| row.update_host_references(public_host))
                .collect(),
        }
    }
}

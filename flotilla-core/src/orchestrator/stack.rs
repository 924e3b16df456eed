//! The stack entity: a named, ordered, structurally immutable set of
//! components started and torn down as a unit.

use crate::components::Component;
use crate::config::OrchestratorConfig;
use crate::error::{FlotillaError, Result};
use crate::events::aggregator::{StackEvents, StackStateAggregator};
use crate::host::HostConfig;
use crate::naming;
use crate::types::stack::StackStateEvent;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// A named, ordered collection of components.
///
/// The component list is fixed at construction (the declarative frontend
/// hands over a complete ordered list); only component *state* changes
/// afterwards. Components start strictly in declared order, so later
/// components may assume earlier ones are already reachable.
pub struct Stack {
    name: String,
    components: Vec<Arc<dyn Component>>,
    aggregator: StackStateAggregator,
    started: AtomicBool,
}

impl Stack {
    /// Create a stack with a generated `adjective-animal` name.
    pub fn new(components: Vec<Arc<dyn Component>>) -> Result<Self> {
        Self::named(naming::generate_name(), components)
    }

    /// Create a named stack. Component ids must be unique within the stack;
    /// a duplicate is a configuration error, not a runtime race.
    pub fn named(name: impl Into<String>, components: Vec<Arc<dyn Component>>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for component in &components {
            if !seen.insert(component.id()) {
                return Err(FlotillaError::DuplicateComponentId {
                    stack: name,
                    id: component.id(),
                });
            }
        }
        let aggregator = StackStateAggregator::new(&name, &components);
        Ok(Self { name, components, aggregator, started: AtomicBool::new(false) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The components in declared order.
    pub fn components(&self) -> &[Arc<dyn Component>] {
        &self.components
    }

    /// Whether a start sequence has begun for this stack.
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Replay-latest stream of aggregate snapshots, usable before, during
    /// and after provisioning.
    pub fn events(&self) -> StackEvents {
        self.aggregator.events()
    }

    /// The latest aggregate snapshot.
    pub fn state(&self) -> StackStateEvent {
        self.aggregator.latest()
    }

    /// Start every component in declared order.
    ///
    /// The aggregator is wired up before the first component starts so no
    /// transition goes unobserved. A component start failure aborts the
    /// sequence: the error propagates and the remaining components are left
    /// at `NotStarted`. Calling this on an already-started stack is a no-op.
    pub async fn start_components(
        &self,
        config: &OrchestratorConfig,
        hosts: &HostConfig,
    ) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            info!(stack = %self.name, "Stack already started, skipping");
            return Ok(());
        }

        self.aggregator.listen(&self.name, &self.components);

        for component in &self.components {
            info!(stack = %self.name, component = %component.id(), "Starting component");
            component.start(config, hosts).await?;
        }
        info!(stack = %self.name, components = self.components.len(), "Stack running");
        Ok(())
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("name", &self.name)
            .field("components", &self.components.iter().map(|c| c.id()).collect::<Vec<_>>())
            .field("started", &self.started())
            .finish()
    }
}

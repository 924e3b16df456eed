//! Stack registry and runner.
//!
//! Owns the map of named stacks, decides replace-vs-reuse on submission,
//! drives ordered component startup, and exposes per-stack event streams and
//! point-in-time snapshots to transport-layer collaborators.

use crate::config::OrchestratorConfig;
use crate::error::{FlotillaError, Result};
use crate::events::aggregator::StackEvents;
use crate::host::HostConfig;
use crate::types::component::ComponentStatus;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

pub mod stack;

pub use stack::Stack;

/// A stack together with the declarative source it was compiled from and the
/// host identities captured at submission time. Source equality is what
/// makes resubmission idempotent.
pub struct StackSubmission {
    pub stack: Stack,
    pub source: String,
    pub host_config: HostConfig,
}

impl StackSubmission {
    pub fn new(stack: Stack, source: impl Into<String>, host_config: HostConfig) -> Self {
        Self { stack, source: source.into(), host_config }
    }
}

/// Options for [`StackOrchestrator::submit`].
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Register under this name instead of the stack's own.
    pub name: Option<String>,
    /// Run the whole ordered start sequence on a background task instead of
    /// blocking the submitter.
    pub start_async: bool,
}

struct RegisteredStack {
    stack: Arc<Stack>,
    source: String,
    host_config: HostConfig,
}

/// The registry of named stacks.
///
/// At most one live stack instance exists per name. The map is only ever
/// mutated under its write lock, and the reuse/replace/fresh decision is
/// made inside that critical section, so concurrent submissions for one
/// name cannot both win and start duplicate resources. Starting itself
/// happens outside the lock: independent stacks provision concurrently.
pub struct StackOrchestrator {
    config: OrchestratorConfig,
    stacks: Arc<RwLock<HashMap<String, Arc<RegisteredStack>>>>,
}

impl Default for StackOrchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl StackOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config, stacks: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Insert-or-replace a stack under `options.name` (default: the stack's
    /// own name) and start it.
    ///
    /// - No stack under that name: register and start it, in declared
    ///   component order.
    /// - Same name, byte-identical source: idempotent reuse. Nothing is
    ///   restarted; the existing stack's event stream is returned.
    /// - Same name, different source: the old stack's components are stopped
    ///   best-effort (each failure logged, every sibling still attempted),
    ///   then the new stack is registered and started.
    ///
    /// The returned stream is usable immediately, before provisioning
    /// completes. With `start_async` the start sequence runs on a spawned
    /// task and failures surface only as `Failed` events; a synchronous
    /// start propagates the first component failure to the submitter and
    /// leaves the remaining components unstarted (already-running ones stay
    /// up; there is no rollback).
    #[instrument(skip(self, submission, options), fields(stack = %options.name.as_deref().unwrap_or(submission.stack.name())))]
    pub async fn submit(
        &self,
        submission: StackSubmission,
        options: SubmitOptions,
    ) -> Result<StackEvents> {
        let name = options.name.unwrap_or_else(|| submission.stack.name().to_string());

        let (registered, fresh) = {
            let mut stacks = self.stacks.write().await;
            let reusable = stacks
                .get(&name)
                .filter(|existing| existing.source == submission.source)
                .map(Arc::clone);
            match reusable {
                Some(existing) => {
                    info!(stack = %name, "Duplicate submission, reusing existing stack");
                    (existing, false)
                }
                None => {
                    if let Some(old) = stacks.remove(&name) {
                        info!(stack = %name, "Replacing stack");
                        stop_stack_components(&name, &old.stack).await;
                    }
                    let registered = Arc::new(RegisteredStack {
                        stack: Arc::new(submission.stack),
                        source: submission.source,
                        host_config: submission.host_config,
                    });
                    stacks.insert(name.clone(), Arc::clone(&registered));
                    (registered, true)
                }
            }
        };

        // A reused stack that never got off the ground is started again.
        // Starting goes back through the map by name: if a concurrent
        // submission replaced this stack in the meantime, the replacement
        // (not the orphan) is what gets started, at most once.
        if fresh || !registered.stack.started() {
            if options.start_async {
                let config = self.config.clone();
                let stacks = Arc::clone(&self.stacks);
                let stack_name = name.clone();
                tokio::spawn(async move {
                    if let Err(e) = start_registered(&config, &stacks, &stack_name).await {
                        error!(stack = %stack_name, error = %e, "Stack startup failed");
                    }
                });
            } else {
                start_registered(&self.config, &self.stacks, &name).await?;
            }
        }

        self.stack_events(&name).await
    }

    /// The aggregate event stream of a registered stack.
    pub async fn stack_events(&self, name: &str) -> Result<StackEvents> {
        let stacks = self.stacks.read().await;
        let registered = stacks
            .get(name)
            .ok_or_else(|| FlotillaError::StackNotFound { name: name.to_string() })?;
        Ok(registered.stack.events())
    }

    /// Point-in-time snapshot of every registered stack: identity, current
    /// state and last published info per component.
    pub async fn stack_state(&self) -> HashMap<String, Vec<ComponentStatus>> {
        let stacks = self.stacks.read().await;
        stacks
            .iter()
            .map(|(name, registered)| (name.clone(), registered.stack.state().components))
            .collect()
    }

    /// Point-in-time snapshot of one named stack.
    pub async fn get_stack_components(&self, name: &str) -> Result<Vec<ComponentStatus>> {
        let stacks = self.stacks.read().await;
        let registered = stacks
            .get(name)
            .ok_or_else(|| FlotillaError::StackNotFound { name: name.to_string() })?;
        Ok(registered.stack.state().components)
    }

    /// Stop all components of the named stack and free the name for reuse.
    ///
    /// Teardown is best-effort: a component that fails to stop is logged and
    /// its siblings are still attempted. Errors only for an unknown name.
    #[instrument(skip(self))]
    pub async fn shut_down(&self, name: &str) -> Result<()> {
        let mut stacks = self.stacks.write().await;
        let registered = stacks
            .remove(name)
            .ok_or_else(|| FlotillaError::StackNotFound { name: name.to_string() })?;
        stop_stack_components(name, &registered.stack).await;
        Ok(())
    }

    /// Stop every registered stack. Safe on an empty registry.
    #[instrument(skip(self))]
    pub async fn shut_down_all(&self) {
        let drained: Vec<(String, Arc<RegisteredStack>)> = {
            let mut stacks = self.stacks.write().await;
            stacks.drain().collect()
        };
        for (name, registered) in drained {
            stop_stack_components(&name, &registered.stack).await;
        }
    }
}

/// Start whatever stack is currently registered under `name`, if any.
/// Already-started stacks are left alone, so two racing submissions cannot
/// run the start sequence twice.
async fn start_registered(
    config: &OrchestratorConfig,
    stacks: &RwLock<HashMap<String, Arc<RegisteredStack>>>,
    name: &str,
) -> Result<()> {
    let registered = {
        let stacks = stacks.read().await;
        stacks.get(name).map(Arc::clone)
    };
    match registered {
        Some(entry) => entry.stack.start_components(config, &entry.host_config).await,
        // Replaced and removed between registration and start: nothing to do.
        None => Ok(()),
    }
}

/// Stop every component of a stack, best-effort and in declared order. A
/// failing stop never prevents the remaining components from being
/// attempted.
async fn stop_stack_components(name: &str, stack: &Stack) {
    info!(stack = %name, "Shutting down stack");
    for component in stack.components() {
        info!(stack = %name, component = %component.id(), "Stopping component");
        if let Err(e) = component.stop().await {
            warn!(stack = %name, component = %component.id(), error = %e, "Error stopping component");
        }
    }
}

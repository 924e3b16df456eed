//! The component contract and the in-process component implementations.
//!
//! A component is one provisioned external capability (broker, database,
//! bucket, HTTP endpoint, cache) with its own lifecycle. Concrete
//! provisioners implement [`Component`] and are otherwise opaque to the
//! engine; this crate ships the implementations that need no container
//! runtime.

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::events::LifecycleEvents;
use crate::host::HostConfig;
use crate::types::component::{component_id, ComponentInfo, ComponentLifecycleEvent};
use async_trait::async_trait;

pub mod http;
pub mod tasks;

pub use http::{HttpConnectionConfig, HttpEndpoint, HttpEndpointConfig, HttpMethod, RouteSpec};
pub use tasks::PeriodicTask;

/// One provisioned external resource with its own lifecycle.
///
/// `start` must emit `Starting` before acquisition begins and `Running` only
/// once the resource is fully usable, seeding included; an acquisition
/// failure is captured as a `Failed` event and returned, and the caller must
/// not start the remaining components of that submission. `stop` emits
/// `Stopping` then `Stopped` (or leaves `Failed` when teardown itself
/// fails); callers tearing down a whole stack log stop errors and keep
/// going so every sibling gets its chance to stop.
#[async_trait]
pub trait Component: Send + Sync {
    /// Name assigned to the component. The `(name, kind)` pair is unique
    /// within a stack.
    fn name(&self) -> &str;

    /// Human-readable kind of component (`http`, `broker`, `database`, …).
    /// Used for display and diagnostics.
    fn kind(&self) -> &str;

    /// Derived identity: `"{name}-{kind}"`.
    fn id(&self) -> String {
        component_id(self.name(), self.kind())
    }

    /// Acquire the external resource, emitting lifecycle events as per the
    /// contract above.
    async fn start(&self, config: &OrchestratorConfig, hosts: &HostConfig)
        -> Result<ComponentInfo>;

    /// Release the resource, cancelling any background work the component
    /// owns first.
    async fn stop(&self) -> Result<()>;

    /// Replay-latest stream of this component's lifecycle events.
    fn lifecycle_events(&self) -> LifecycleEvents;

    /// The most recent lifecycle event.
    fn current_state(&self) -> ComponentLifecycleEvent;

    /// The info published by the last successful start, if any.
    fn info(&self) -> Option<ComponentInfo>;
}

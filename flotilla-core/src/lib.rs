//! Flotilla Core
//!
//! Orchestration engine for ephemeral, named stacks of test infrastructure:
//! a concurrency-safe registry of named stacks with replace-in-place
//! semantics, per-component lifecycle state machines with replay-latest
//! broadcast, stack-level state aggregation, and host reference rewriting
//! for consumers on other network identities.

pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod naming;
pub mod orchestrator;
pub mod types;

// Re-export commonly used items
pub use components::{Component, HttpEndpoint, PeriodicTask};
pub use config::OrchestratorConfig;
pub use error::{FlotillaError, Result};
pub use events::aggregator::{StackEvents, StackStateAggregator};
pub use events::{LifecycleEventSource, LifecycleEvents, ReplayLatest};
pub use host::{AdvertisedListeners, HostAware, HostConfig};
pub use orchestrator::{Stack, StackOrchestrator, StackSubmission, SubmitOptions};
pub use types::{
    ComponentInfo, ComponentLifecycleEvent, ComponentState, ComponentStatus, ContainerInfo,
    StackStateEvent,
};

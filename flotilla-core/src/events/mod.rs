//! Lifecycle event plumbing.
//!
//! Two pieces live here: [`ReplayLatest`], a single-slot broadcast primitive
//! where every new subscriber immediately observes the most recent value,
//! and [`LifecycleEventSource`], the per-component state machine every
//! provisioner drives through the start/stop helpers.

use crate::config::OrchestratorConfig;
use crate::error::{FlotillaError, Result};
use crate::types::component::{ComponentLifecycleEvent, ComponentState};
use std::future::Future;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

pub mod aggregator;

/// Replay-latest stream of one component's lifecycle events.
pub type LifecycleEvents = WatchStream<ComponentLifecycleEvent>;

/// A broadcast cell that caches only the most recent value.
///
/// Subscribing yields the cached value as the stream's first item, then each
/// subsequent emission. A subscriber that falls behind observes a coalesced
/// subsequence: nothing beyond the latest value is ever buffered, which is
/// the point of the primitive (it is not an event log).
#[derive(Debug)]
pub struct ReplayLatest<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + Send + Sync + 'static> ReplayLatest<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the cached value and wake every subscriber.
    pub fn emit(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// The most recent value.
    pub fn latest(&self) -> T {
        self.tx.borrow().clone()
    }

    /// A stream that yields the cached value immediately, then every
    /// subsequent emission.
    pub fn subscribe(&self) -> WatchStream<T> {
        WatchStream::new(self.tx.subscribe())
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Owns one component's state machine and its replay-latest broadcast.
///
/// Every emission passes the transition guard: a component only moves
/// forward along `NotStarted → Starting → Running → Stopping → Stopped`,
/// may fail from any non-terminal state, and accepts nothing once terminal.
/// Illegal transitions are dropped with a warning rather than corrupting
/// the observable sequence.
#[derive(Debug)]
pub struct LifecycleEventSource {
    cell: ReplayLatest<ComponentLifecycleEvent>,
}

impl Default for LifecycleEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleEventSource {
    pub fn new() -> Self {
        Self { cell: ReplayLatest::new(ComponentLifecycleEvent::not_started()) }
    }

    /// The most recent lifecycle event.
    pub fn current(&self) -> ComponentLifecycleEvent {
        self.cell.latest()
    }

    /// Subscribe; the current state is the stream's first item.
    pub fn events(&self) -> LifecycleEvents {
        self.cell.subscribe()
    }

    fn emit(&self, event: ComponentLifecycleEvent) {
        let current = self.cell.latest();
        if !current.state.can_transition_to(event.state) {
            warn!(from = %current.state, to = %event.state, "Dropping illegal lifecycle transition");
            return;
        }
        debug!(state = %event, "Lifecycle transition");
        self.cell.emit(event);
    }

    pub fn starting(&self) {
        self.emit(ComponentLifecycleEvent::starting());
    }

    pub fn running(&self) {
        self.emit(ComponentLifecycleEvent::running());
    }

    pub fn stopping(&self) {
        self.emit(ComponentLifecycleEvent::stopping());
    }

    pub fn stopped(&self) {
        self.emit(ComponentLifecycleEvent::stopped());
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.emit(ComponentLifecycleEvent::failed(message));
    }

    /// Acquire a resource and emit lifecycle events around it.
    ///
    /// Emits `Starting`, awaits `acquire` bounded by the configured start
    /// timeout, then emits `Running` on success or `Failed` with the error's
    /// message (or a timeout diagnostic) otherwise. Post-boot initialization
    /// belongs inside `acquire`, ahead of the `Running` emission. The
    /// failure is also returned so the caller can abort the rest of its
    /// start sequence.
    pub async fn start_with_events<T, F>(
        &self,
        config: &OrchestratorConfig,
        id: &str,
        acquire: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.starting();
        match tokio::time::timeout(config.start_timeout, acquire).await {
            Ok(Ok(value)) => {
                self.running();
                Ok(value)
            }
            Ok(Err(e)) => {
                self.failed(e.failure_message());
                Err(e)
            }
            Err(_) => {
                let e = FlotillaError::StartTimeout {
                    id: id.to_string(),
                    timeout: config.start_timeout,
                };
                self.failed(e.failure_message());
                Err(e)
            }
        }
    }

    /// Release a resource and emit lifecycle events around it.
    ///
    /// Emits `Stopping`, awaits `release`, then `Stopped` on success or
    /// `Failed` with the error's message otherwise.
    pub async fn stop_with_events<F>(&self, release: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        self.stopping();
        match release.await {
            Ok(()) => {
                self.stopped();
                Ok(())
            }
            Err(e) => {
                self.failed(e.failure_message());
                Err(e)
            }
        }
    }
}

//! Stack state aggregation.
//!
//! Merges the independent lifecycle streams of one stack's components into a
//! single replay-latest stream of [`StackStateEvent`] snapshots. Every
//! component event is tagged with its originating component and funnelled
//! into one merge task, which recomputes the full snapshot (histogram plus
//! component rows) on each event. The merge is last-write-wins: there is no
//! cross-component atomicity, only a fresh consistent snapshot per observed
//! event.

use crate::components::Component;
use crate::events::ReplayLatest;
use crate::types::component::ComponentLifecycleEvent;
use crate::types::stack::StackStateEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Replay-latest stream of a stack's aggregate snapshots.
pub type StackEvents = WatchStream<StackStateEvent>;

/// Merges a stack's component lifecycle streams into aggregate snapshots.
///
/// Dropping the aggregator cancels its forwarding and merge tasks, so a
/// replaced stack releases the components those tasks hold.
#[derive(Debug)]
pub struct StackStateAggregator {
    cell: Arc<ReplayLatest<StackStateEvent>>,
    shutdown: CancellationToken,
}

impl StackStateAggregator {
    /// Create an aggregator seeded with the all-`NotStarted` snapshot, so
    /// subscribers that attach before provisioning starts still observe a
    /// consistent first value.
    pub fn new(stack_name: &str, components: &[Arc<dyn Component>]) -> Self {
        Self {
            cell: Arc::new(ReplayLatest::new(StackStateEvent::compute(stack_name, components))),
            shutdown: CancellationToken::new(),
        }
    }

    /// Subscribe; the latest snapshot is the stream's first item.
    pub fn events(&self) -> StackEvents {
        self.cell.subscribe()
    }

    /// The latest snapshot.
    pub fn latest(&self) -> StackStateEvent {
        self.cell.latest()
    }

    /// Subscribe to every component's lifecycle stream and publish a fresh
    /// snapshot on each event. Call once, before the first component starts.
    pub fn listen(&self, stack_name: &str, components: &[Arc<dyn Component>]) {
        let (tx, mut rx) = mpsc::channel::<(usize, ComponentLifecycleEvent)>(components.len().max(1) * 4);

        for (index, component) in components.iter().enumerate() {
            let mut events = component.lifecycle_events();
            let tx = tx.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        event = events.next() => match event {
                            Some(event) => {
                                if tx.send((index, event)).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                    }
                }
            });
        }
        drop(tx);

        let cell = Arc::clone(&self.cell);
        let shutdown = self.shutdown.clone();
        let stack_name = stack_name.to_string();
        let components: Vec<Arc<dyn Component>> = components.to_vec();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    tagged = rx.recv() => match tagged {
                        Some((index, event)) => {
                            debug!(
                                stack = %stack_name,
                                component = %components[index].id(),
                                state = %event,
                                "Component lifecycle event"
                            );
                            cell.emit(StackStateEvent::compute(&stack_name, &components));
                        }
                        None => break,
                    },
                }
            }
        });
    }
}

impl Drop for StackStateAggregator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::error::Result;
    use crate::events::LifecycleEventSource;
    use crate::host::HostConfig;
    use crate::types::component::{ComponentInfo, ComponentState};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Component whose lifecycle is driven by hand.
    struct ManualComponent {
        name: String,
        source: LifecycleEventSource,
    }

    impl ManualComponent {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self { name: name.to_string(), source: LifecycleEventSource::new() })
        }
    }

    #[async_trait]
    impl Component for ManualComponent {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> &str {
            "manual"
        }

        async fn start(
            &self,
            _config: &OrchestratorConfig,
            _hosts: &HostConfig,
        ) -> Result<ComponentInfo> {
            unimplemented!("driven directly in tests")
        }

        async fn stop(&self) -> Result<()> {
            unimplemented!("driven directly in tests")
        }

        fn lifecycle_events(&self) -> crate::events::LifecycleEvents {
            self.source.events()
        }

        fn current_state(&self) -> crate::types::component::ComponentLifecycleEvent {
            self.source.current()
        }

        fn info(&self) -> Option<ComponentInfo> {
            None
        }
    }

    async fn settled_snapshot(aggregator: &StackStateAggregator) -> StackStateEvent {
        // Give the forwarding and merge tasks a chance to drain.
        tokio::time::sleep(Duration::from_millis(50)).await;
        aggregator.latest()
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_all_not_started() {
        let a = ManualComponent::new("a");
        let b = ManualComponent::new("b");
        let components: Vec<Arc<dyn Component>> = vec![a, b];
        let aggregator = StackStateAggregator::new("s1", &components);

        let snapshot = aggregator.latest();
        assert_eq!(snapshot.component_count(), 2);
        assert_eq!(snapshot.state_counts.get(&ComponentState::NotStarted), Some(&2));
    }

    #[tokio::test]
    async fn test_histogram_sums_to_component_count_on_every_event() {
        let a = ManualComponent::new("a");
        let b = ManualComponent::new("b");
        let c = ManualComponent::new("c");
        let components: Vec<Arc<dyn Component>> =
            vec![Arc::clone(&a) as _, Arc::clone(&b) as _, Arc::clone(&c) as _];
        let aggregator = StackStateAggregator::new("s1", &components);
        aggregator.listen("s1", &components);

        a.source.starting();
        a.source.running();
        b.source.starting();
        c.source.failed("no capacity");

        let snapshot = settled_snapshot(&aggregator).await;
        let total: usize = snapshot.state_counts.values().sum();
        assert_eq!(total, 3);
        assert_eq!(snapshot.state_counts.get(&ComponentState::Running), Some(&1));
        assert_eq!(snapshot.state_counts.get(&ComponentState::Starting), Some(&1));
        assert_eq!(snapshot.state_counts.get(&ComponentState::Failed), Some(&1));
    }

    #[tokio::test]
    async fn test_last_write_wins_per_component() {
        let a = ManualComponent::new("a");
        let components: Vec<Arc<dyn Component>> = vec![Arc::clone(&a) as _];
        let aggregator = StackStateAggregator::new("s1", &components);
        aggregator.listen("s1", &components);

        a.source.starting();
        a.source.running();
        a.source.stopping();
        a.source.stopped();

        let snapshot = settled_snapshot(&aggregator).await;
        assert_eq!(snapshot.components[0].state.state, ComponentState::Stopped);
        assert_eq!(snapshot.state_counts.get(&ComponentState::Stopped), Some(&1));
    }

    #[tokio::test]
    async fn test_failure_does_not_terminate_the_aggregate_stream() {
        let a = ManualComponent::new("a");
        let components: Vec<Arc<dyn Component>> = vec![Arc::clone(&a) as _];
        let aggregator = StackStateAggregator::new("s1", &components);
        aggregator.listen("s1", &components);

        a.source.starting();
        a.source.failed("boom");

        let snapshot = settled_snapshot(&aggregator).await;
        assert_eq!(snapshot.components[0].state.state, ComponentState::Failed);
        assert_eq!(snapshot.components[0].state.message.as_deref(), Some("boom"));

        // A fresh subscriber still gets the latest snapshot immediately.
        let mut events = aggregator.events();
        let replayed = events.next().await.expect("aggregate stream should replay");
        assert_eq!(replayed.components[0].state.state, ComponentState::Failed);
    }
}

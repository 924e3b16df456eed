//! Component domain types: lifecycle states, events, and published info.

use crate::host::HostAware;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of a single component.
///
/// Legal transitions move forward along
/// `NotStarted → Starting → Running → Stopping → Stopped`, or from any
/// non-terminal state to `Failed`. `Stopped` and `Failed` are terminal for a
/// component's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    NotStarted,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl ComponentState {
    /// Whether this state is a transition between two settled states.
    /// A hint for UIs (show a spinner), nothing more.
    pub fn is_transition_state(&self) -> bool {
        matches!(self, ComponentState::Starting | ComponentState::Stopping)
    }

    /// Terminal states accept no further transitions for this run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComponentState::Stopped | ComponentState::Failed)
    }

    /// Position along the forward transition chain. `Failed` sits outside
    /// the chain and is handled separately.
    fn rank(&self) -> u8 {
        match self {
            ComponentState::NotStarted => 0,
            ComponentState::Starting => 1,
            ComponentState::Running => 2,
            ComponentState::Stopping => 3,
            ComponentState::Stopped => 4,
            ComponentState::Failed => 5,
        }
    }

    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(&self, next: ComponentState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == ComponentState::Failed {
            return true;
        }
        next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentState::NotStarted => "not_started",
            ComponentState::Starting => "starting",
            ComponentState::Running => "running",
            ComponentState::Stopping => "stopping",
            ComponentState::Stopped => "stopped",
            ComponentState::Failed => "failed",
        }
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A state-transition notification for one component. `message` carries the
/// diagnostic for `Failed` and is empty otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLifecycleEvent {
    pub state: ComponentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentLifecycleEvent {
    pub fn not_started() -> Self {
        Self { state: ComponentState::NotStarted, message: None }
    }

    pub fn starting() -> Self {
        Self { state: ComponentState::Starting, message: None }
    }

    pub fn running() -> Self {
        Self { state: ComponentState::Running, message: None }
    }

    pub fn stopping() -> Self {
        Self { state: ComponentState::Stopping, message: None }
    }

    pub fn stopped() -> Self {
        Self { state: ComponentState::Stopped, message: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { state: ComponentState::Failed, message: Some(message.into()) }
    }
}

impl fmt::Display for ComponentLifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({})", self.state, message),
            None => write!(f, "{}", self.state),
        }
    }
}

/// Descriptor of the container (or other network-attached runtime) backing a
/// component, when one exists. In-process components publish no container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub container_id: String,
    pub image_name: String,
    pub container_name: String,
    /// The host through which the provisioning process reaches the
    /// container; the baseline for host reference rewriting.
    pub host: String,
}

/// Type-erased view of a component's resource-specific connection payload
/// (bootstrap address, connection string, base URL, …).
///
/// Any `HostAware + Serialize + Debug` config type gets this for free via
/// the blanket impl below; components hand the orchestrator an
/// `Arc<dyn ConnectionConfig>` and keep the concrete type to themselves.
pub trait ConnectionConfig: fmt::Debug + Send + Sync {
    /// JSON projection of the payload, for publishing to subscribers.
    fn to_json(&self) -> serde_json::Value;

    /// Apply host reference rewriting, preserving the concrete shape.
    fn update_host_references(
        &self,
        container_host: &str,
        public_host: &str,
    ) -> Arc<dyn ConnectionConfig>;
}

impl<T> ConnectionConfig for T
where
    T: HostAware + Serialize + fmt::Debug + Send + Sync + 'static,
{
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn update_host_references(
        &self,
        container_host: &str,
        public_host: &str,
    ) -> Arc<dyn ConnectionConfig> {
        Arc::new(HostAware::update_host_references(self, container_host, public_host))
    }
}

/// What a successful start publishes: the optional container descriptor plus
/// the resource-specific connection payload, tagged with the component
/// identity.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub container: Option<ContainerInfo>,
    pub connection: Arc<dyn ConnectionConfig>,
    pub kind: String,
    pub name: String,
    pub id: String,
}

impl ComponentInfo {
    pub fn new(
        container: Option<ContainerInfo>,
        connection: Arc<dyn ConnectionConfig>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let kind = kind.into();
        let name = name.into();
        let id = component_id(&name, &kind);
        Self { container, connection, kind, name, id }
    }

    /// Rewrite connection metadata for a consumer that reaches this host as
    /// `public_host`. Applies only when a container descriptor provides the
    /// provisioning-side host to substitute; in-process components publish
    /// consumer-agnostic addresses already.
    pub fn update_host_references(&self, public_host: &str) -> Self {
        match &self.container {
            Some(container) => Self {
                connection: self.connection.update_host_references(&container.host, public_host),
                ..self.clone()
            },
            None => self.clone(),
        }
    }
}

impl Serialize for ComponentInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ComponentInfo", 5)?;
        s.serialize_field("container", &self.container)?;
        s.serialize_field("connection", &self.connection.to_json())?;
        s.serialize_field("kind", &self.kind)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("id", &self.id)?;
        s.end()
    }
}

/// One row of a stack snapshot: identity, current state, and the last
/// published info of a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentStatus {
    pub name: String,
    pub kind: String,
    pub id: String,
    pub state: ComponentLifecycleEvent,
    pub info: Option<ComponentInfo>,
}

impl ComponentStatus {
    pub fn update_host_references(&self, public_host: &str) -> Self {
        Self {
            info: self.info.as_ref().map(|info| info.update_host_references(public_host)),
            ..self.clone()
        }
    }
}

/// Derived component id: `"{name}-{kind}"`, unique within a stack.
pub fn component_id(name: &str, kind: &str) -> String {
    format!("{}-{}", name, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::rewrite_host_references;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct JdbcConfig {
        jdbc_url: String,
    }

    impl HostAware for JdbcConfig {
        fn update_host_references(&self, container_host: &str, public_host: &str) -> Self {
            Self { jdbc_url: rewrite_host_references(&self.jdbc_url, container_host, public_host) }
        }
    }

    fn jdbc_info() -> ComponentInfo {
        ComponentInfo::new(
            Some(ContainerInfo {
                container_id: "c0ffee".to_string(),
                image_name: "postgres:16".to_string(),
                container_name: "orders-db".to_string(),
                host: "containerhost".to_string(),
            }),
            Arc::new(JdbcConfig { jdbc_url: "jdbc://containerhost:5432/db".to_string() }),
            "database",
            "orders",
        )
    }

    #[test]
    fn test_transition_chain() {
        use ComponentState::*;
        assert!(NotStarted.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
        // Skipping forward is a legal subsequence.
        assert!(NotStarted.can_transition_to(Stopping));
        assert!(Running.can_transition_to(Stopped));
        // Backwards is not.
        assert!(!Running.can_transition_to(Starting));
        assert!(!Stopping.can_transition_to(Running));
        // Failed is reachable from any non-terminal state only.
        assert!(Starting.can_transition_to(Failed));
        assert!(!Stopped.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Starting));
        assert!(!Stopped.can_transition_to(Starting));
    }

    #[test]
    fn test_transition_state_hint() {
        assert!(ComponentState::Starting.is_transition_state());
        assert!(ComponentState::Stopping.is_transition_state());
        assert!(!ComponentState::Running.is_transition_state());
        assert!(!ComponentState::Failed.is_transition_state());
    }

    #[test]
    fn test_component_id_format() {
        assert_eq!(component_id("orders", "database"), "orders-database");
        assert_eq!(jdbc_info().id, "orders-database");
    }

    #[test]
    fn test_info_host_rewrite_uses_container_host() {
        let info = jdbc_info();
        let rewritten = info.update_host_references("203.0.113.5");
        assert_eq!(
            rewritten.connection.to_json()["jdbc_url"],
            "jdbc://203.0.113.5:5432/db".to_string()
        );
        // Re-applying once the container host is gone changes nothing.
        let again = rewritten.update_host_references("203.0.113.5");
        assert_eq!(rewritten.connection.to_json(), again.connection.to_json());
    }

    #[test]
    fn test_info_without_container_is_untouched() {
        let info = ComponentInfo::new(
            None,
            Arc::new(JdbcConfig { jdbc_url: "jdbc://localhost:5432/db".to_string() }),
            "database",
            "orders",
        );
        let rewritten = info.update_host_references("203.0.113.5");
        assert_eq!(rewritten.connection.to_json(), info.connection.to_json());
    }

    #[test]
    fn test_failed_event_serializes_message() {
        let event = ComponentLifecycleEvent::failed("boom");
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["state"], "failed");
        assert_eq!(json["message"], "boom");

        let quiet = serde_json::to_value(ComponentLifecycleEvent::running()).expect("serialize");
        assert!(quiet.get("message").is_none());
    }
}

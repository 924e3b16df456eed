//! Host reference rewriting.
//!
//! Connection metadata published by a component references whatever host the
//! provisioning process reached the resource through (usually `localhost`).
//! Consumers on a different network identity need those references rewritten
//! to a host they can actually reach. The default strategy is a literal
//! substring substitution; brokers that embed their advertised address in the
//! wire handshake get a pre-bound listener per known external address
//! instead, looked up by the requesting host.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The externally-reachable addresses through which this orchestrator's host
/// is known. Captured when a stack is submitted; host-strict components bind
/// one extra listener per address so published metadata can be rewritten for
/// any of them later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub host_addresses: Vec<String>,
}

impl HostConfig {
    /// A host config with no known external addresses.
    pub const UNKNOWN: HostConfig = HostConfig { host_addresses: Vec::new() };

    pub fn new(host_addresses: Vec<String>) -> Self {
        Self { host_addresses }
    }
}

/// Replace every literal occurrence of `container_host` with `public_host`.
///
/// Once `container_host` no longer occurs in the value this is a no-op, so
/// the rewrite is safe to apply repeatedly.
pub fn rewrite_host_references(value: &str, container_host: &str, public_host: &str) -> String {
    value.replace(container_host, public_host)
}

/// A connection config whose address-bearing fields can be rewritten for a
/// consumer-reachable host.
///
/// Implementations must be pure: the receiver is untouched and re-applying
/// the transform after `container_host` is gone returns an equal value.
/// Configs without host references implement this as the identity.
pub trait HostAware {
    fn update_host_references(&self, container_host: &str, public_host: &str) -> Self
    where
        Self: Sized;
}

impl HostAware for String {
    fn update_host_references(&self, container_host: &str, public_host: &str) -> Self {
        rewrite_host_references(self, container_host, public_host)
    }
}

/// One extra listener bound at provisioning time for a known external address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerAllocation {
    /// Distinct protocol name for this listener (e.g. `EXT0`).
    pub protocol: String,
    /// Port reserved for this listener.
    pub port: u16,
    /// The external address the listener advertises.
    pub address: String,
}

/// The advertised listeners of a handshake-embedding broker.
///
/// Substring substitution is not enough for brokers whose wire protocol
/// returns the advertised listener during the handshake: the broker must
/// already be listening on an address the consumer can reach. One listener is
/// therefore bound per address in [`HostConfig`] up front, and rewriting
/// becomes a lookup of the pre-bound listener string for the requesting host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisedListeners {
    by_host: HashMap<String, String>,
}

impl AdvertisedListeners {
    /// Plan one listener per known external address, assigning each a
    /// distinct protocol name (`EXT0`, `EXT1`, …) and port starting at
    /// `base_port`. The provisioner binds these when it boots the broker.
    pub fn allocate(hosts: &HostConfig, base_port: u16) -> Vec<ListenerAllocation> {
        hosts
            .host_addresses
            .iter()
            .enumerate()
            .map(|(i, address)| ListenerAllocation {
                protocol: format!("EXT{}", i),
                port: base_port + i as u16,
                address: address.clone(),
            })
            .collect()
    }

    /// Record the bound listeners, keyed by the external address each serves.
    pub fn from_allocations(allocations: &[ListenerAllocation]) -> Self {
        let by_host = allocations
            .iter()
            .map(|l| (l.address.clone(), format!("{}://{}:{}", l.protocol, l.address, l.port)))
            .collect();
        Self { by_host }
    }

    /// The pre-bound listener string serving `public_host`, if one was bound.
    pub fn listener_for(&self, public_host: &str) -> Option<&str> {
        self.by_host.get(public_host).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}

/// Published connection details of a broker component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConnectionConfig {
    /// The bootstrap address consumers connect to first.
    pub bootstrap_servers: String,
    /// Listeners pre-bound for known external addresses.
    #[serde(default)]
    pub listeners: AdvertisedListeners,
}

impl HostAware for BrokerConnectionConfig {
    /// Swap the bootstrap address for the listener pre-bound for
    /// `public_host`. A host without a pre-bound listener leaves the config
    /// unchanged: a text replace on the primary listener would advertise an
    /// address the broker is not listening on.
    fn update_host_references(&self, _container_host: &str, public_host: &str) -> Self {
        match self.listeners.listener_for(public_host) {
            Some(listener) => Self {
                bootstrap_servers: listener.to_string(),
                listeners: self.listeners.clone(),
            },
            None => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_replaces_every_occurrence() {
        let url = "jdbc://containerhost:5432/db?fallback=containerhost";
        let rewritten = rewrite_host_references(url, "containerhost", "203.0.113.5");
        assert_eq!(rewritten, "jdbc://203.0.113.5:5432/db?fallback=203.0.113.5");
    }

    #[test]
    fn test_rewrite_is_idempotent_once_host_is_gone() {
        let url = "jdbc://containerhost:5432/db".to_string();
        let once = url.update_host_references("containerhost", "203.0.113.5");
        let twice = once.update_host_references("containerhost", "203.0.113.5");
        assert_eq!(once, "jdbc://203.0.113.5:5432/db");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_listener_allocation_assigns_distinct_ports_and_protocols() {
        let hosts = HostConfig::new(vec!["10.0.0.7".into(), "203.0.113.5".into()]);
        let allocations = AdvertisedListeners::allocate(&hosts, 9093);
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].protocol, "EXT0");
        assert_eq!(allocations[0].port, 9093);
        assert_eq!(allocations[1].protocol, "EXT1");
        assert_eq!(allocations[1].port, 9094);
    }

    #[test]
    fn test_broker_rewrite_uses_prebound_listener() {
        let hosts = HostConfig::new(vec!["203.0.113.5".into()]);
        let allocations = AdvertisedListeners::allocate(&hosts, 9093);
        let config = BrokerConnectionConfig {
            bootstrap_servers: "PLAINTEXT://localhost:9092".to_string(),
            listeners: AdvertisedListeners::from_allocations(&allocations),
        };

        let rewritten = config.update_host_references("localhost", "203.0.113.5");
        assert_eq!(rewritten.bootstrap_servers, "EXT0://203.0.113.5:9093");

        // A host nothing was bound for must not be text-substituted in.
        let unknown = config.update_host_references("localhost", "198.51.100.9");
        assert_eq!(unknown, config);
    }
}

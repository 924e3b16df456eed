//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every component start sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Name of the network that provisioned containers are attached to.
    pub network_name: String,

    /// Upper bound on a single component's resource acquisition, including
    /// any post-boot initialization. Expiry surfaces as a `Failed` state
    /// rather than an indefinite hang.
    pub start_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            network_name: "flotilla_network".to_string(),
            start_timeout: Duration::from_secs(60),
        }
    }
}

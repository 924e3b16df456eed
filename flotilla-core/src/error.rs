//! Error types for the orchestration engine.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, FlotillaError>;

/// Main error type for the orchestration engine.
#[derive(Error, Debug)]
pub enum FlotillaError {
    // Registry errors
    #[error("Stack not found: {name}")]
    StackNotFound { name: String },

    #[error("Duplicate component id {id} in stack {stack}")]
    DuplicateComponentId { stack: String, id: String },

    // Component lifecycle errors
    #[error("Component {id} failed to start: {reason}")]
    ComponentStartFailed { id: String, reason: String },

    #[error("Component {id} failed to stop: {reason}")]
    ComponentStopFailed { id: String, reason: String },

    #[error("Component {id} did not become ready within {timeout:?}")]
    StartTimeout { id: String, timeout: Duration },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O while acquiring or releasing a resource
    #[error("I/O error for component {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlotillaError {
    /// Human-readable diagnostic used as the `Failed` lifecycle message.
    pub fn failure_message(&self) -> String {
        self.to_string()
    }
}

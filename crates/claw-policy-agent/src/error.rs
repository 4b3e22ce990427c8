//! Error types for the on-host reconciler.

use thiserror::Error;

/// Errors a reconcile step can fail with.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Fetching tagged policies from the internal API failed.
    #[error("policy service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A planner's packet-filter swap failed.
    #[error("filter error: {0}")]
    Filter(#[from] claw_netrules::FilterError),

    /// Local container metadata or configuration could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A container record or config file held unparseable JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The chain-prefix pattern failed to compile as a regex.
    #[error("chain pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// The configuration file was structurally valid JSON but missing a
    /// value this agent needs to operate (e.g. an incomplete flannel
    /// subnet file).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, AgentError>;

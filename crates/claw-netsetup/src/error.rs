//! Error types for the container network setup lifecycle.

use thiserror::Error;

/// Errors a lifecycle action can fail with. The CLI maps any of these to
/// exit code 1 and a structured stderr log line.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The supplied properties or stdin JSON was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A CNI delegate invocation failed.
    #[error("CNI delegate {plugin} failed: {reason}")]
    Delegate {
        /// The delegate plugin binary that failed.
        plugin: String,
        /// What went wrong.
        reason: String,
    },

    /// Bind-mounting or unmounting the container's netns failed.
    #[error("bind mount error: {0}")]
    BindMount(String),

    /// The packet-filter driver failed.
    #[error("filter error: {0}")]
    Filter(#[from] claw_netrules::FilterError),

    /// The port allocator failed.
    #[error("port map error: {0}")]
    PortMap(#[from] claw_portmap::PortMapError),

    /// The container record store failed.
    #[error("state store error: {0}")]
    Io(#[from] std::io::Error),

    /// The container record store held unparseable JSON.
    #[error("corrupt container record: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The requested container handle has no record on this host.
    #[error("no container record for handle {0}")]
    NotFound(String),

    /// The container handle is unsafe to use as a path component.
    #[error("invalid container handle: {0}")]
    UnsafeHandle(#[from] claw_validation::ValidationError),
}

/// Result type alias for setup actions.
pub type Result<T> = std::result::Result<T, SetupError>;

//! Error types for the rule algebra and filter driver.

use thiserror::Error;

/// Errors that can occur while driving the host's packet-filter tool.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The underlying `iptables` invocation exited non-zero.
    #[error("iptables call failed: {stderr}")]
    CommandFailed {
        /// Captured stderr from the failed invocation.
        stderr: String,
    },

    /// The `iptables` binary could not be executed at all.
    #[error("could not execute iptables: {reason}")]
    Exec {
        /// The OS-level failure reason.
        reason: String,
    },

    /// Acquiring or releasing the advisory lock failed.
    #[error("lock error: {reason}")]
    Lock {
        /// The reason the lock operation failed.
        reason: String,
    },

    /// The underlying call failed *and* releasing the lock also failed;
    /// both are folded into one fatal error for the caller to retry next
    /// cycle.
    #[error("iptables call: {call_error} and unlock: {unlock_error}")]
    Composite {
        /// The error from the underlying iptables call.
        call_error: String,
        /// The error from the subsequent unlock attempt.
        unlock_error: String,
    },

    /// Output from `iptables` could not be parsed as UTF-8 / expected shape.
    #[error("unexpected iptables output: {reason}")]
    UnexpectedOutput {
        /// What about the output was unexpected.
        reason: String,
    },
}

/// Result type alias for filter-driver operations.
pub type Result<T> = std::result::Result<T, FilterError>;

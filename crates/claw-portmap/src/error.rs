//! Error types for the port allocator.

use thiserror::Error;

/// Errors returned by [`crate::PortMap`] operations.
#[derive(Debug, Error)]
pub enum PortMapError {
    /// No free port remains anywhere in `[start, start+capacity)`.
    #[error("no free port available in range [{start}, {end})")]
    Exhausted {
        /// First port in the configured range (inclusive).
        start: u16,
        /// One past the last port in the configured range.
        end: u32,
    },

    /// A caller-requested port fell outside the configured range.
    #[error("requested port {port} is outside the allocator range [{start}, {end})")]
    OutOfRange {
        /// The rejected port.
        port: u16,
        /// First port in the configured range (inclusive).
        start: u16,
        /// One past the last port in the configured range.
        end: u32,
    },

    /// Acquiring or releasing the map's advisory file lock failed.
    #[error("port map lock error: {reason}")]
    Lock {
        /// The reason the lock operation failed.
        reason: String,
    },

    /// The backing JSON file could not be read or written.
    #[error("port map I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing JSON file exists but could not be parsed.
    #[error("port map file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Result type alias for port allocator operations.
pub type Result<T> = std::result::Result<T, PortMapError>;

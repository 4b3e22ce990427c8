//! Error types for the policy store.

use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum PolicyStoreError {
    /// The tag-slot table has no free row left to claim.
    #[error("no free tag slot remains; increase tag_length or reclaim unused groups")]
    TagSpaceExhausted,

    /// A policy referenced a guid that does not resolve to a claimed group
    /// or terminal after the create step that should have provisioned it.
    #[error("could not resolve group for guid {guid}")]
    UnresolvedGroup {
        /// The guid that failed to resolve.
        guid: String,
    },

    /// A malformed payload was rejected before it reached SQL.
    #[error("validation error: {0}")]
    Validation(String),

    /// The underlying database connection or query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, PolicyStoreError>;

//! HTTP policy API: external token-authorized CRUD plus whoami, and an
//! internal mTLS read-only surface for the on-host agent.

pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod tls;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use guard::PolicyGuard;
pub use handlers::{external_router, internal_router, AppState};
pub use identity::{HttpIdentityProvider, IdentityProvider, TokenInfo};
pub use metrics::ErrorCounters;
pub use tls::server_config;

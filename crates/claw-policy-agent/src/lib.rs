//! On-host policy reconciler: polls local container metadata and tagged
//! policies, plans packet-filter rules, and swaps enforcement chains in
//! atomically.

pub mod client;
pub mod config;
pub mod containers;
pub mod error;
pub mod flannel;
pub mod planner;
pub mod reconciler;
pub mod swap;

pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use reconciler::Reconciler;

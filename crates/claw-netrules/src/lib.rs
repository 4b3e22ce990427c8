//! Packet-filter rule algebra and the lock-serialized driver that applies
//! it to the host's `iptables` tables.
//!
//! This crate knows nothing about policy storage, tagging, or HTTP; it is
//! the narrow layer between "a rule as data" and "a rule as live kernel
//! state", consumed by `claw-policy-agent` and `claw-netsetup`.

pub mod error;
pub mod filter;
pub mod mock;
pub mod rules;

pub use error::{FilterError, Result};
pub use filter::{FilterClient, IpTablesClient, LockedFilter};
pub use mock::MockFilterClient;
pub use rules::{IcmpSelector, IpTablesRule, PortRange};

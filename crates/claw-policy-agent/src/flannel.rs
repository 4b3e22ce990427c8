//! Reader for flannel's subnet environment file.
//!
//! On hosts using flannel for overlay discovery, the local daemon writes
//! a small `key=value` file (conventionally `/run/flannel/subnet.env`)
//! recording the subnet it leased for this host. This module reads just
//! enough of that format to recover the overlay CIDR and this host's
//! slice of it, so the agent doesn't need its own copy of that
//! discovery process (out of scope here) to plan default-deny rules
//! correctly.

use std::path::Path;

use crate::error::{AgentError, Result};

/// The fields this agent cares about from a flannel subnet file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlannelSubnetEnv {
    /// `FLANNEL_NETWORK`: CIDR of the whole overlay network.
    pub network: String,
    /// `FLANNEL_SUBNET`: CIDR of this host's leased subnet.
    pub subnet: String,
}

/// Parses a flannel subnet env file's contents.
///
/// # Errors
///
/// Returns [`AgentError::InvalidConfig`] if either `FLANNEL_NETWORK` or
/// `FLANNEL_SUBNET` is missing.
pub fn parse(contents: &str) -> Result<FlannelSubnetEnv> {
    let mut network = None;
    let mut subnet = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "FLANNEL_NETWORK" => network = Some(value.trim().to_string()),
            "FLANNEL_SUBNET" => subnet = Some(value.trim().to_string()),
            _ => {}
        }
    }

    Ok(FlannelSubnetEnv {
        network: network.ok_or_else(|| {
            AgentError::InvalidConfig("flannel subnet file missing FLANNEL_NETWORK".to_string())
        })?,
        subnet: subnet.ok_or_else(|| {
            AgentError::InvalidConfig("flannel subnet file missing FLANNEL_SUBNET".to_string())
        })?,
    })
}

/// Reads and parses the flannel subnet file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is missing a
/// recognized key.
pub fn read(path: &Path) -> Result<FlannelSubnetEnv> {
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

//! JSON configuration for the on-host reconciler.

use std::path::PathBuf;

use serde::Deserialize;

use crate::flannel;

fn default_poll_interval() -> u64 {
    1
}

/// Recognized configuration keys for `claw-policy-agent`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the policy service's internal (mTLS) API.
    pub policy_server_url: String,
    /// Directory holding one container-record JSON file per handle,
    /// written by `claw-netsetup` on `up`.
    pub container_state_dir: PathBuf,
    /// Path to the advisory lock file shared with `claw-netsetup`'s
    /// filter driver.
    pub iptables_lock_file: PathBuf,
    /// How often to run a reconcile pass, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Local overlay network interface name (e.g. `flannel.1` or `cni0`).
    pub overlay_iface: String,
    /// CIDR of this host's local overlay subnet. Ignored (and may be
    /// omitted) when `flannel_subnet_file` is set.
    #[serde(default)]
    pub local_subnet: Option<String>,
    /// CIDR of the whole overlay network. Ignored (and may be omitted)
    /// when `flannel_subnet_file` is set.
    #[serde(default)]
    pub overlay_network: Option<String>,
    /// Path to flannel's `subnet.env`, when overlay discovery is
    /// delegated to flannel rather than configured statically. When
    /// present, overrides `local_subnet`/`overlay_network` on every load.
    #[serde(default)]
    pub flannel_subnet_file: Option<PathBuf>,
    /// VNI used to name the remote overlay interface (`flannel.<vni>`).
    pub vni: u32,
    /// Enables the masquerade planner for traffic leaving the overlay.
    #[serde(default)]
    pub enable_masquerade: bool,
    /// Address of the metrics collector this agent would emit to.
    /// Recognized for config-file compatibility; metrics emission to an
    /// external collector is out of scope here (ambient metrics are
    /// recorded in-process instead, see `claw_metrics`).
    #[serde(default)]
    pub metron_address: Option<String>,
    /// CA certificate used to verify the policy server's TLS identity.
    #[serde(default)]
    pub server_ca_cert_file: Option<PathBuf>,
    /// Client certificate presented to the policy server for mTLS.
    #[serde(default)]
    pub client_cert_file: Option<PathBuf>,
    /// Private key matching `client_cert_file`.
    #[serde(default)]
    pub client_key_file: Option<PathBuf>,
    /// Path to the policy server's own datastore. Recognized for
    /// config-file compatibility; this agent only ever reaches the
    /// policy server over its HTTP API, never the datastore directly.
    #[serde(default)]
    pub datastore: Option<PathBuf>,
}

impl AgentConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// neither `local_subnet`/`overlay_network` nor
    /// `flannel_subnet_file` resolve to usable overlay CIDRs.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let body = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&body)?;
        config.resolved_subnets()?;
        Ok(config)
    }

    /// The poll interval as a [`std::time::Duration`].
    #[must_use]
    pub fn poll_interval_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval)
    }

    /// Resolves `(local_subnet, overlay_network)`, preferring
    /// `flannel_subnet_file` over the statically configured fields when
    /// both are present.
    ///
    /// # Errors
    ///
    /// Returns an error if the flannel subnet file can't be read or
    /// parsed, or if neither source yields both CIDRs.
    pub fn resolved_subnets(&self) -> crate::error::Result<(String, String)> {
        if let Some(path) = &self.flannel_subnet_file {
            let env = flannel::read(path)?;
            return Ok((env.subnet, env.network));
        }

        let local_subnet = self.local_subnet.clone().ok_or_else(|| {
            crate::error::AgentError::InvalidConfig(
                "local_subnet is required when flannel_subnet_file is not set".to_string(),
            )
        })?;
        let overlay_network = self.overlay_network.clone().ok_or_else(|| {
            crate::error::AgentError::InvalidConfig(
                "overlay_network is required when flannel_subnet_file is not set".to_string(),
            )
        })?;
        Ok((local_subnet, overlay_network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AgentConfig {
        AgentConfig {
            policy_server_url: "https://policy-server.internal".to_string(),
            container_state_dir: PathBuf::from("/var/lib/claw-netsetup"),
            iptables_lock_file: PathBuf::from("/var/run/claw-netsetup.lock"),
            poll_interval: 1,
            overlay_iface: "flannel.1".to_string(),
            local_subnet: None,
            overlay_network: None,
            flannel_subnet_file: None,
            vni: 1,
            enable_masquerade: false,
            metron_address: None,
            server_ca_cert_file: None,
            client_cert_file: None,
            client_key_file: None,
            datastore: None,
        }
    }

    #[test]
    fn static_subnets_are_used_when_no_flannel_file() {
        let mut config = base();
        config.local_subnet = Some("10.1.17.0/24".to_string());
        config.overlay_network = Some("10.1.0.0/16".to_string());
        let (local, overlay) = config.resolved_subnets().expect("resolved");
        assert_eq!(local, "10.1.17.0/24");
        assert_eq!(overlay, "10.1.0.0/16");
    }

    #[test]
    fn missing_subnets_and_no_flannel_file_is_an_error() {
        assert!(base().resolved_subnets().is_err());
    }
}

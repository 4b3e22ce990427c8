//! JSON configuration for the network setup binary.

use std::path::PathBuf;

use serde::Deserialize;

/// Recognized configuration keys for `claw-netsetup`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetupConfig {
    /// Directory containing CNI delegate plugin binaries.
    pub cni_plugin_dir: PathBuf,
    /// Directory containing CNI delegate plugin configs, invoked in
    /// lexical order to build `eth0, eth1, ...`.
    pub cni_config_dir: PathBuf,
    /// Directory under which `<bind_root>/<handle>` netns bind mounts live.
    pub bind_mount_dir: PathBuf,
    /// CIDR of the overlay network, used by default netout rules.
    pub overlay_network: String,
    /// First port in the host-port allocator's range.
    pub start_port: u16,
    /// Size of the host-port allocator's range.
    pub total_ports: u32,
    /// Path to the advisory lock file serializing packet-filter mutations.
    pub iptables_lock_file: PathBuf,
    /// Directory holding one container-record JSON file per handle, plus
    /// the port map state file.
    pub state_file: PathBuf,
}

impl SetupConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let body = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Path to the container-record file for `handle`.
    ///
    /// # Errors
    ///
    /// Returns an error if `handle` is not safe to use as a path
    /// component (e.g. contains `..` or a path separator).
    pub fn container_record_path(&self, handle: &str) -> crate::error::Result<PathBuf> {
        let safe = claw_validation::safe_path::SafePath::new(handle)?;
        if safe.as_path().components().count() != 1 {
            return Err(crate::error::SetupError::InvalidInput(format!(
                "handle must be a single path component: {handle}"
            )));
        }
        Ok(self.state_file.join(format!("{handle}.json")))
    }

    /// Path to the persistent port-map file.
    #[must_use]
    pub fn port_map_path(&self) -> PathBuf {
        self.state_file.join("portmap.json")
    }

    /// Path to the port map's own lock file (distinct from the filter
    /// driver's lock so port allocation never blocks on iptables calls).
    #[must_use]
    pub fn port_map_lock_path(&self) -> PathBuf {
        self.state_file.join("portmap.lock")
    }
}

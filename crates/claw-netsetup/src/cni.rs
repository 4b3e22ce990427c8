//! Invocation of the configured CNI delegate plugin chain.
//!
//! Each configured plugin is a binary under `cni_plugin_dir`, invoked per
//! the CNI spec's calling convention: command and context passed as
//! environment variables, its JSON network config (merged with the
//! caller's app properties) on stdin, and its own JSON result on stdout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::Value;

use crate::error::{Result, SetupError};

/// One configured delegate plugin and its static network config.
#[derive(Debug, Clone)]
pub struct DelegateConfig {
    /// Plugin binary name (resolved under `cni_plugin_dir`).
    pub plugin: String,
    /// Static network configuration, merged with runtime properties
    /// before being sent to the plugin on stdin.
    pub network_config: Value,
}

/// Invokes a single CNI delegate. Abstracted so tests can inject a
/// recording double instead of shelling out to real plugin binaries.
pub trait CniDelegate: Send + Sync {
    /// Runs one delegate invocation, returning its parsed stdout JSON.
    fn invoke(
        &self,
        command: &str,
        container_id: &str,
        netns: &Path,
        ifname: &str,
        config: &Value,
    ) -> Result<Value>;
}

/// Shells out to a real CNI plugin binary under `plugin_dir`.
pub struct ProcessCniDelegate {
    plugin_dir: PathBuf,
}

impl ProcessCniDelegate {
    /// Creates a delegate that resolves plugin binaries under `plugin_dir`.
    #[must_use]
    pub fn new(plugin_dir: PathBuf) -> Self {
        Self { plugin_dir }
    }
}

impl CniDelegate for ProcessCniDelegate {
    fn invoke(
        &self,
        command: &str,
        container_id: &str,
        netns: &Path,
        ifname: &str,
        config: &Value,
    ) -> Result<Value> {
        let binary = self.plugin_dir.join(
            config
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| SetupError::InvalidInput("delegate config missing type".to_string()))?,
        );

        let mut child = Command::new(&binary)
            .env("CNI_COMMAND", command)
            .env("CNI_CONTAINERID", container_id)
            .env("CNI_NETNS", netns.as_os_str())
            .env("CNI_IFNAME", ifname)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SetupError::Delegate {
                plugin: binary.display().to_string(),
                reason: e.to_string(),
            })?;

        {
            use std::io::Write;
            let stdin = child.stdin.as_mut().expect("piped stdin");
            stdin
                .write_all(&serde_json::to_vec(config)?)
                .map_err(|e| SetupError::Delegate {
                    plugin: binary.display().to_string(),
                    reason: e.to_string(),
                })?;
        }

        let output = child.wait_with_output().map_err(|e| SetupError::Delegate {
            plugin: binary.display().to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(SetupError::Delegate {
                plugin: binary.display().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(SetupError::Corrupt)
    }
}

/// Loads every delegate config file under `cni_config_dir` in lexical
/// filename order, matching the order `eth0, eth1, ...` are assigned.
pub fn load_delegates(cni_config_dir: &Path) -> Result<Vec<DelegateConfig>> {
    let mut paths: Vec<_> = std::fs::read_dir(cni_config_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(std::ffi::OsStr::to_str) == Some("json"))
        .collect();
    paths.sort();

    let mut delegates = Vec::with_capacity(paths.len());
    for path in paths {
        let body = std::fs::read(&path)?;
        let network_config: Value = serde_json::from_slice(&body)?;
        let plugin = network_config
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SetupError::InvalidInput(format!(
                    "delegate config {} missing type",
                    path.display()
                ))
            })?
            .to_string();
        delegates.push(DelegateConfig {
            plugin,
            network_config,
        });
    }
    Ok(delegates)
}

/// Runs every configured delegate in order, assigning interface names
/// `eth0, eth1, ...` and merging `properties` into each delegate's static
/// config before invocation.
pub fn run_chain(
    delegate: &dyn CniDelegate,
    delegates: &[DelegateConfig],
    command: &str,
    container_id: &str,
    netns: &Path,
    properties: &Value,
) -> Result<Vec<Value>> {
    let mut results = Vec::with_capacity(delegates.len());
    for (index, entry) in delegates.iter().enumerate() {
        let ifname = format!("eth{index}");
        let mut config = entry.network_config.clone();
        if let (Value::Object(config_map), Value::Object(props)) = (&mut config, properties) {
            let merged: BTreeMap<String, Value> = props
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (key, value) in merged {
                config_map.entry(key).or_insert(value);
            }
        }

        let result = delegate.invoke(command, container_id, netns, &ifname, &config)?;
        results.push(result);
    }
    Ok(results)
}

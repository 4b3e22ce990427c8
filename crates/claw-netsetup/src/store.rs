//! Per-handle container metadata, one JSON file per container.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SetupConfig;
use crate::error::{Result, SetupError};

/// Host-local record of a container's network identity, written on `up`
/// and removed on `down`; read by the on-host agent to plan rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// The container runtime's opaque handle.
    pub handle: String,
    /// The container's overlay IP address.
    pub ip: String,
    /// Free-form metadata, at minimum `policy_group_id`.
    pub metadata: serde_json::Value,
}

/// Writes `record` atomically (write to a temp file, then rename).
pub fn write(config: &SetupConfig, record: &ContainerRecord) -> Result<()> {
    std::fs::create_dir_all(&config.state_file)?;
    let path = config.container_record_path(&record.handle)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, serde_json::to_vec_pretty(record)?)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// Reads the record for `handle`, if present.
pub fn read(config: &SetupConfig, handle: &str) -> Result<Option<ContainerRecord>> {
    let path = config.container_record_path(handle)?;
    match std::fs::read(&path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SetupError::Io(e)),
    }
}

/// Removes the record for `handle`. Idempotent.
pub fn remove(config: &SetupConfig, handle: &str) -> Result<()> {
    let path = config.container_record_path(handle)?;
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SetupError::Io(e)),
    }
}

/// Lists every container record in the state directory, skipping (and
/// logging) any file that fails to parse rather than aborting the whole
/// read — matching the agent's "containers without the expected key are
/// logged and skipped, not fatal" requirement one level up.
pub fn list_all(config: &SetupConfig) -> Result<Vec<ContainerRecord>> {
    let dir: &Path = &config.state_file;
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(std::ffi::OsStr::to_str) != Some("json") {
            continue;
        }
        match std::fs::read(&path).map(|b| serde_json::from_slice::<ContainerRecord>(&b)) {
            Ok(Ok(record)) => records.push(record),
            _ => tracing::warn!(path = %path.display(), "skipping unreadable container record"),
        }
    }
    Ok(records)
}

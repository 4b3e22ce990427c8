//! Reads the local container-record files `claw-netsetup` writes on `up`.
//!
//! Grouped by `policy_group_id` rather than by handle: the planner cares
//! which IPs belong to which policy group, not which container they came
//! from.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

/// Mirrors the on-disk shape of `claw-netsetup`'s container record. Read
/// here as a plain consumer rather than via a crate dependency, since the
/// agent only ever reads these files, never writes them.
#[derive(Debug, Deserialize)]
struct ContainerRecord {
    handle: String,
    ip: String,
    metadata: serde_json::Value,
}

/// Maps `policy_group_id -> [container_ip]` for every readable container
/// record under `state_dir`. A record missing the `policy_group_id` key,
/// or one that fails to parse, is logged and skipped rather than
/// treated as fatal.
pub fn local_containers_by_group(state_dir: &Path) -> HashMap<String, Vec<String>> {
    let mut by_group: HashMap<String, Vec<String>> = HashMap::new();
    let entries = match std::fs::read_dir(state_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %state_dir.display(), error = %e, "cannot read container state dir");
            return by_group;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(std::ffi::OsStr::to_str) != Some("json") {
            continue;
        }

        let record = match std::fs::read(&path).map(|b| serde_json::from_slice::<ContainerRecord>(&b)) {
            Ok(Ok(record)) => record,
            _ => {
                tracing::warn!(path = %path.display(), "skipping unreadable container record");
                continue;
            }
        };

        match record.metadata.get("policy_group_id").and_then(serde_json::Value::as_str) {
            Some(group_id) => by_group.entry(group_id.to_string()).or_default().push(record.ip),
            None => tracing::warn!(handle = %record.handle, "container record missing policy_group_id, skipping"),
        }
    }

    by_group
}

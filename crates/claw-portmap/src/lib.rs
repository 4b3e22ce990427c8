//! A persistent, cross-process host-port allocator.
//!
//! Backed by a single JSON file under an advisory file lock: every
//! mutation is a read-modify-write of the whole file, so the map survives
//! restarts of the network-setup binary and stays consistent across the
//! concurrent invocations a container runtime may fire for different
//! handles.

pub mod error;

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::{PortMapError, Result};

/// On-disk representation of the allocator state.
///
/// `assignments` is a `BTreeMap` rather than a `HashMap` so that
/// serialization is deterministic (sorted by handle), per the allocator's
/// "inspectable by external tools" requirement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct State {
    last_assigned: u16,
    assignments: BTreeMap<String, u16>,
}

/// A single `handle -> port` binding, returned by [`PortMap::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAssignment {
    /// The container/netin handle the port is bound to.
    pub handle: String,
    /// The allocated host port.
    pub port: u16,
}

/// A persistent, file-locked port allocator over `[start, start + capacity)`.
pub struct PortMap {
    start: u16,
    capacity: u32,
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl PortMap {
    /// Creates an allocator over `[start, start + capacity)`, persisting to
    /// `state_path` and serializing access through `lock_path`.
    #[must_use]
    pub fn new(
        start: u16,
        capacity: u32,
        state_path: impl Into<PathBuf>,
        lock_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            start,
            capacity,
            state_path: state_path.into(),
            lock_path: lock_path.into(),
        }
    }

    fn end_exclusive(&self) -> u32 {
        u32::from(self.start) + self.capacity
    }

    fn in_range(&self, port: u16) -> bool {
        let port = u32::from(port);
        port >= u32::from(self.start) && port < self.end_exclusive()
    }

    fn open_lock_file(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(PortMapError::Io)
    }

    fn read_state(&self) -> Result<State> {
        match std::fs::read(&self.state_path) {
            Ok(bytes) if bytes.is_empty() => Ok(State::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(State::default()),
            Err(e) => Err(PortMapError::Io(e)),
        }
    }

    fn write_state(&self, state: &State) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.state_path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(state)?;
        std::fs::write(&tmp_path, body)?;
        std::fs::rename(&tmp_path, &self.state_path)?;
        Ok(())
    }

    fn with_lock<T>(&self, op: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let lock_file = self.open_lock_file()?;
        lock_file
            .lock_exclusive()
            .map_err(|e| PortMapError::Lock {
                reason: e.to_string(),
            })?;

        let result = (|| {
            let mut state = self.read_state()?;
            let value = op(&mut state)?;
            self.write_state(&state)?;
            Ok(value)
        })();

        let _ = fs2::FileExt::unlock(&lock_file);
        result
    }

    /// Allocates a port for `handle`.
    ///
    /// If `handle` is already mapped, returns the existing port. If
    /// `requested_port` is non-zero, claims it exactly (failing with
    /// [`PortMapError::OutOfRange`] if it falls outside the configured
    /// range, or silently rebinding `handle` to it if it's already the
    /// handle's own port). Otherwise scans forward from
    /// `last_assigned + 1`, wrapping once, for the first free port.
    pub fn allocate(&self, handle: &str, requested_port: u16) -> Result<u16> {
        self.with_lock(|state| {
            if let Some(&existing) = state.assignments.get(handle) {
                return Ok(existing);
            }

            if requested_port != 0 {
                if !self.in_range(requested_port) {
                    return Err(PortMapError::OutOfRange {
                        port: requested_port,
                        start: self.start,
                        end: self.end_exclusive(),
                    });
                }
                let in_use = state.assignments.values().any(|&p| p == requested_port);
                if in_use {
                    return Err(PortMapError::OutOfRange {
                        port: requested_port,
                        start: self.start,
                        end: self.end_exclusive(),
                    });
                }
                state.assignments.insert(handle.to_string(), requested_port);
                debug!(handle, port = requested_port, "allocated requested port");
                return Ok(requested_port);
            }

            let capacity = self.capacity;
            let start = u32::from(self.start);
            let used: std::collections::HashSet<u16> = state.assignments.values().copied().collect();

            let start_offset = u32::from(state.last_assigned.max(self.start))
                .saturating_sub(start)
                .saturating_add(1)
                % capacity.max(1);

            for step in 0..capacity {
                let offset = (start_offset + step) % capacity;
                #[allow(clippy::cast_possible_truncation)]
                let candidate = (start + offset) as u16;
                if !used.contains(&candidate) {
                    state.assignments.insert(handle.to_string(), candidate);
                    state.last_assigned = candidate;
                    debug!(handle, port = candidate, "allocated next free port");
                    return Ok(candidate);
                }
            }

            Err(PortMapError::Exhausted {
                start: self.start,
                end: self.end_exclusive(),
            })
        })
    }

    /// Releases the port bound to `handle`, if any. Idempotent.
    pub fn release(&self, handle: &str) -> Result<()> {
        self.with_lock(|state| {
            state.assignments.remove(handle);
            Ok(())
        })
    }

    /// Returns every current `handle -> port` binding, sorted by handle.
    pub fn stats(&self) -> Result<Vec<PortAssignment>> {
        let state = self.with_lock(|state| Ok(state.clone()))?;
        Ok(state
            .assignments
            .into_iter()
            .map(|(handle, port)| PortAssignment { handle, port })
            .collect())
    }

    /// The configured lock file path.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

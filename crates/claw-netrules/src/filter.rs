//! The locked filter driver.
//!
//! [`FilterClient`] is the fixed capability set every caller programs
//! against; [`IpTablesClient`] is the real `iptables(8)` backed
//! implementation, and [`LockedFilter`] wraps any `FilterClient` with a
//! cross-process advisory file lock so that the host agent, the
//! container-setup binary, and out-of-band operators never race on the
//! same tables.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Command;

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{FilterError, Result};
use crate::rules::IpTablesRule;

/// The fixed capability set of the host's packet-filter tool.
///
/// Every method corresponds one-to-one with the original `IPTables` Go
/// interface (`lib/rules/locked_iptables.go`), so that a mock or a
/// different platform's backing implementation can be swapped in without
/// touching callers.
pub trait FilterClient: Send + Sync {
    /// Checks whether a rule already exists in a chain.
    fn exists(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<bool>;
    /// Inserts a rule at a 1-indexed position in a chain.
    fn insert(&self, table: &str, chain: &str, position: u32, rule: &IpTablesRule) -> Result<()>;
    /// Appends a rule to a chain only if an identical rule isn't already present.
    fn append_unique(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<()>;
    /// Deletes a matching rule from a chain.
    fn delete(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<()>;
    /// Lists the rules of a chain, one rule per returned line.
    fn list(&self, table: &str, chain: &str) -> Result<Vec<String>>;
    /// Creates a new, empty chain.
    fn new_chain(&self, table: &str, chain: &str) -> Result<()>;
    /// Removes all rules from a chain without deleting the chain itself.
    fn clear_chain(&self, table: &str, chain: &str) -> Result<()>;
    /// Deletes an (empty) chain.
    fn delete_chain(&self, table: &str, chain: &str) -> Result<()>;
}

/// Drives the real `iptables` binary via `std::process::Command`, grounded
/// on `clawnode::netpolicy`'s `add_iptables_rule` helper: non-zero exit
/// status and stderr are surfaced as [`FilterError::CommandFailed`].
#[derive(Debug, Clone, Default)]
pub struct IpTablesClient {
    binary: PathBuf,
}

impl IpTablesClient {
    /// Creates a client that shells out to `iptables` from `$PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("iptables"),
        }
    }

    /// Creates a client that shells out to a specific `iptables` binary
    /// path (useful for `ip6tables` or test doubles on `$PATH`).
    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(args = ?args, "invoking iptables");
        Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| FilterError::Exec {
                reason: e.to_string(),
            })
    }

    fn run_ok(&self, args: &[&str]) -> Result<()> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(FilterError::CommandFailed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl FilterClient for IpTablesClient {
    fn exists(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<bool> {
        let mut args = vec!["-t", table, "-C", chain];
        args.extend(rule.args().iter().map(String::as_str));
        let output = self.run(&args)?;
        Ok(output.status.success())
    }

    fn insert(&self, table: &str, chain: &str, position: u32, rule: &IpTablesRule) -> Result<()> {
        let pos = position.to_string();
        let mut args = vec!["-t", table, "-I", chain, pos.as_str()];
        args.extend(rule.args().iter().map(String::as_str));
        self.run_ok(&args)
    }

    fn append_unique(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<()> {
        if self.exists(table, chain, rule)? {
            return Ok(());
        }
        let mut args = vec!["-t", table, "-A", chain];
        args.extend(rule.args().iter().map(String::as_str));
        self.run_ok(&args)
    }

    fn delete(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<()> {
        let mut args = vec!["-t", table, "-D", chain];
        args.extend(rule.args().iter().map(String::as_str));
        self.run_ok(&args)
    }

    fn list(&self, table: &str, chain: &str) -> Result<Vec<String>> {
        let output = self.run(&["-t", table, "-S", chain])?;
        if !output.status.success() {
            return Err(FilterError::CommandFailed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8(output.stdout).map_err(|e| FilterError::UnexpectedOutput {
            reason: e.to_string(),
        })?;
        Ok(stdout.lines().map(str::to_string).collect())
    }

    fn new_chain(&self, table: &str, chain: &str) -> Result<()> {
        self.run_ok(&["-t", table, "-N", chain])
    }

    fn clear_chain(&self, table: &str, chain: &str) -> Result<()> {
        self.run_ok(&["-t", table, "-F", chain])
    }

    fn delete_chain(&self, table: &str, chain: &str) -> Result<()> {
        self.run_ok(&["-t", table, "-X", chain])
    }
}

/// Guards a single advisory file lock for the lifetime of one filter call,
/// releasing it on every exit path (including panics that unwind through
/// `Drop`, matching the original's "release on all exit paths" requirement
/// without Go's manual `defer`-less unlock bookkeeping).
struct LockGuard<'a> {
    file: &'a File,
    released_ok: bool,
}

impl<'a> LockGuard<'a> {
    fn acquire(file: &'a File) -> Result<Self> {
        file.lock_exclusive().map_err(|e| FilterError::Lock {
            reason: e.to_string(),
        })?;
        Ok(Self {
            file,
            released_ok: true,
        })
    }

    /// Releases the lock, recording whether it succeeded so [`Drop`] does
    /// not try again and so `composite_error` can combine both failures.
    fn release(&mut self) -> std::result::Result<(), String> {
        match self.file.unlock() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.released_ok = false;
                Err(e.to_string())
            }
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.released_ok {
            let _ = self.file.unlock();
        }
    }
}

/// Wraps any [`FilterClient`] with a process-shared advisory lock, acquired
/// before and released after every call.
pub struct LockedFilter<F: FilterClient> {
    inner: F,
    lock_path: PathBuf,
}

impl<F: FilterClient> LockedFilter<F> {
    /// Creates a locked wrapper around `inner`, using `lock_path` as the
    /// shared advisory lock file (created if missing).
    #[must_use]
    pub fn new(inner: F, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            lock_path: lock_path.into(),
        }
    }

    fn open_lock_file(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| FilterError::Lock {
                reason: e.to_string(),
            })
    }

    fn with_lock<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let file = self.open_lock_file()?;
        let mut guard = LockGuard::acquire(&file)?;
        let result = op();
        match (result, guard.release()) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(call_error), Ok(())) => Err(call_error),
            (Ok(_), Err(unlock_error)) => Err(FilterError::Lock {
                reason: unlock_error,
            }),
            (Err(call_error), Err(unlock_error)) => {
                warn!(%call_error, %unlock_error, "iptables call and unlock both failed");
                Err(FilterError::Composite {
                    call_error: call_error.to_string(),
                    unlock_error,
                })
            }
        }
    }

    /// The path of the shared advisory lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl<F: FilterClient> FilterClient for LockedFilter<F> {
    fn exists(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<bool> {
        self.with_lock(|| self.inner.exists(table, chain, rule))
    }

    fn insert(&self, table: &str, chain: &str, position: u32, rule: &IpTablesRule) -> Result<()> {
        self.with_lock(|| self.inner.insert(table, chain, position, rule))
    }

    fn append_unique(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<()> {
        self.with_lock(|| self.inner.append_unique(table, chain, rule))
    }

    fn delete(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<()> {
        self.with_lock(|| self.inner.delete(table, chain, rule))
    }

    fn list(&self, table: &str, chain: &str) -> Result<Vec<String>> {
        self.with_lock(|| self.inner.list(table, chain))
    }

    fn new_chain(&self, table: &str, chain: &str) -> Result<()> {
        self.with_lock(|| self.inner.new_chain(table, chain))
    }

    fn clear_chain(&self, table: &str, chain: &str) -> Result<()> {
        self.with_lock(|| self.inner.clear_chain(table, chain))
    }

    fn delete_chain(&self, table: &str, chain: &str) -> Result<()> {
        self.with_lock(|| self.inner.delete_chain(table, chain))
    }
}

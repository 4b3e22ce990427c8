//! Bind-mounting a container's network namespace into a well-known path
//! so later invocations (down, net-out, net-in) can address it by handle
//! alone without needing the container's PID again.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, SetupError};

/// The bind-mount path for `handle` under `bind_root`.
#[must_use]
pub fn mount_path(bind_root: &Path, handle: &str) -> PathBuf {
    bind_root.join(handle)
}

/// Bind-mounts `/proc/<pid>/ns/net` onto `<bind_root>/<handle>`.
/// Idempotent: a second call against an already-mounted path is a no-op.
pub fn mount(bind_root: &Path, handle: &str, pid: u32) -> Result<PathBuf> {
    let target = mount_path(bind_root, handle);
    std::fs::create_dir_all(bind_root)?;
    if !target.exists() {
        std::fs::write(&target, [])?;
    }

    if is_mounted(&target)? {
        return Ok(target);
    }

    let source = format!("/proc/{pid}/ns/net");
    let output = Command::new("mount")
        .args(["--bind", &source, &target.to_string_lossy()])
        .output()
        .map_err(|e| SetupError::BindMount(e.to_string()))?;
    if !output.status.success() {
        return Err(SetupError::BindMount(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(target)
}

/// Unmounts and removes `<bind_root>/<handle>`. Missing mount is not an
/// error.
pub fn unmount(bind_root: &Path, handle: &str) -> Result<()> {
    let target = mount_path(bind_root, handle);
    if !target.exists() {
        return Ok(());
    }

    if is_mounted(&target)? {
        let output = Command::new("umount")
            .arg(&target)
            .output()
            .map_err(|e| SetupError::BindMount(e.to_string()))?;
        if !output.status.success() {
            return Err(SetupError::BindMount(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
    }

    let _ = std::fs::remove_file(&target);
    Ok(())
}

fn is_mounted(target: &Path) -> Result<bool> {
    let mounts = std::fs::read_to_string("/proc/self/mountinfo").unwrap_or_default();
    let target = target.to_string_lossy();
    Ok(mounts.lines().any(|line| line.contains(target.as_ref())))
}

//! Bind-mount daemon directories onto shadows under the working root
//!
//! Inside the scope, writes to e.g. `/etc/frr` land in
//! `<working_root>/etc/frr` while daemons keep using their usual paths.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::WorkingRoot;
use crate::domain::shell;
use crate::error::{FuzzError, Result};
use crate::ports::IsolatedExecutor;

const MOUNTINFO_COMMAND: &str = "cat /proc/self/mountinfo";

/// Recursively hand `path` to `user:group`
///
/// # Errors
///
/// Returns `Ownership` if `chown` fails inside the scope.
pub async fn chown_recursive(
    executor: &dyn IsolatedExecutor,
    path: &Path,
    user: &str,
    group: &str,
) -> Result<()> {
    let output = executor
        .run(&format!(
            "chown -R {}:{} {}",
            shell::escape(user),
            shell::escape(group),
            shell::escape_path(path)
        ))
        .await?;

    if !output.success() {
        return Err(FuzzError::Ownership {
            path: path.display().to_string(),
            reason: format!(
                "chown exited with status {}: {}",
                output.exit_code,
                output.stderr.trim()
            ),
        });
    }
    Ok(())
}

/// Bind `real_path` to its shadow under the working root
///
/// Safe to call again: an existing bind of the same shadow is left alone.
///
/// # Returns
/// The shadow directory
///
/// # Errors
///
/// Returns an IO error if a directory cannot be created, `Ownership` if the
/// shadow cannot be chowned and `Rebind` if the bind mount fails.
pub async fn rebind(
    executor: &dyn IsolatedExecutor,
    root: &WorkingRoot,
    real_path: &Path,
    user: &str,
    group: &str,
) -> Result<PathBuf> {
    let shadow = root.shadow(real_path);

    tokio::fs::create_dir_all(real_path).await?;
    tokio::fs::create_dir_all(&shadow).await?;
    chown_recursive(executor, &shadow, user, group).await?;

    let mountinfo = executor.run(MOUNTINFO_COMMAND).await?;
    if is_bound(&mountinfo.stdout, real_path, &shadow) {
        debug!(path = %real_path.display(), "Bind mount already in place");
        return Ok(shadow);
    }

    let output = executor
        .run(&format!(
            "mount --bind {} {}",
            shell::escape_path(&shadow),
            shell::escape_path(real_path)
        ))
        .await?;

    if !output.success() {
        return Err(FuzzError::Rebind {
            path: real_path.display().to_string(),
            reason: format!(
                "mount exited with status {}: {}",
                output.exit_code,
                output.stderr.trim()
            ),
        });
    }

    info!(
        path = %real_path.display(),
        shadow = %shadow.display(),
        "Directory rebound"
    );
    Ok(shadow)
}

/// Whether `mountinfo` shows `real_path` mounted from `shadow`
///
/// Field 4 of a mountinfo line is the root of the mount inside its
/// filesystem, field 5 the mount point.
fn is_bound(mountinfo: &str, real_path: &Path, shadow: &Path) -> bool {
    mountinfo.lines().any(|line| {
        let mut fields = line.split_whitespace().skip(3);
        match (fields.next(), fields.next()) {
            (Some(root), Some(mount_point)) => {
                Path::new(mount_point) == real_path
                    && root != "/"
                    && shadow.ends_with(root.trim_start_matches('/'))
            }
            _ => false,
        }
    })
}

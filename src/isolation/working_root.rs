//! Disposable per-run directory
//!
//! Every artifact of a run (rendered configs, daemon logs, transcripts,
//! bind-mount shadows) lives under one working root that is wiped at
//! startup. The root must contain [`WORKING_ROOT_MARKER`] so a typo in the
//! configuration can never wipe an unrelated directory.

use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::config::WORKING_ROOT_MARKER;
use crate::error::{FuzzError, Result};

/// Stem of the shared injection transcript files
const TRANSCRIPT_STEM: &str = "vtysh";

#[derive(Debug, Clone)]
pub struct WorkingRoot {
    path: PathBuf,
}

impl WorkingRoot {
    /// Check the safety marker without touching the filesystem
    ///
    /// # Errors
    ///
    /// Returns `UnsafeWorkingRoot` if the path does not contain the marker.
    pub fn validate(path: &Path) -> Result<()> {
        if path.to_string_lossy().contains(WORKING_ROOT_MARKER) {
            Ok(())
        } else {
            Err(FuzzError::UnsafeWorkingRoot {
                path: path.display().to_string(),
                marker: WORKING_ROOT_MARKER,
            })
        }
    }

    /// Wipe and recreate the working root
    ///
    /// # Errors
    ///
    /// Returns `UnsafeWorkingRoot` before any filesystem mutation if the
    /// marker is missing, or an IO error if the directory cannot be
    /// removed or created.
    pub async fn prepare(path: &Path) -> Result<Self> {
        Self::validate(path)?;

        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(path).await?;

        info!(path = %path.display(), "Working root prepared");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Use an existing working root as is
    ///
    /// # Errors
    ///
    /// Returns `UnsafeWorkingRoot` if the marker is missing.
    pub fn existing(path: &Path) -> Result<Self> {
        Self::validate(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shadow location of a real path, e.g. `/etc/frr` -> `<root>/etc/frr`
    #[must_use]
    pub fn shadow(&self, real_path: &Path) -> PathBuf {
        let relative: PathBuf = real_path
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.path.join(relative)
    }

    #[must_use]
    pub fn daemon_log(&self, daemon: &str) -> PathBuf {
        self.path.join(format!("{daemon}.log"))
    }

    #[must_use]
    pub fn daemon_stdout(&self, daemon: &str) -> PathBuf {
        self.path.join(format!("{daemon}.stdout"))
    }

    #[must_use]
    pub fn daemon_stderr(&self, daemon: &str) -> PathBuf {
        self.path.join(format!("{daemon}.stderr"))
    }

    /// The three per-daemon log files, in rotation order
    #[must_use]
    pub fn daemon_logs(&self, daemon: &str) -> [PathBuf; 3] {
        [
            self.daemon_log(daemon),
            self.daemon_stdout(daemon),
            self.daemon_stderr(daemon),
        ]
    }

    #[must_use]
    pub fn transcript_stdout(&self) -> PathBuf {
        self.path.join(format!("{TRANSCRIPT_STEM}.stdout"))
    }

    #[must_use]
    pub fn transcript_stderr(&self) -> PathBuf {
        self.path.join(format!("{TRANSCRIPT_STEM}.stderr"))
    }

    /// Append-only crash transcript
    #[must_use]
    pub fn crash_log(&self) -> PathBuf {
        self.path.join("segfaults.txt")
    }

    #[must_use]
    pub fn summary_file(&self) -> PathBuf {
        self.path.join("summary.json")
    }
}

/// `<file>.<pid>`, the name a log file is rotated to after a crash
#[must_use]
pub fn rotated_name(path: &Path, pid: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(pid);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked_tempdir() -> tempfile::TempDir {
        tempfile::Builder::new()
            .prefix("vtysh-fuzz-")
            .tempdir()
            .unwrap()
    }

    #[test]
    fn test_validate_requires_marker() {
        assert!(WorkingRoot::validate(Path::new("/tmp/vtysh-fuzz")).is_ok());
        assert!(WorkingRoot::validate(Path::new("/tmp/runs/vtysh-fuzz-7/")).is_ok());
        assert!(matches!(
            WorkingRoot::validate(Path::new("/tmp")),
            Err(FuzzError::UnsafeWorkingRoot { .. })
        ));
    }

    #[tokio::test]
    async fn test_prepare_without_marker_touches_nothing() {
        let scratch = tempfile::tempdir().unwrap();
        let keep = scratch.path().join("keep.txt");
        std::fs::write(&keep, "data").unwrap();

        // Existing directory is not wiped
        let result = WorkingRoot::prepare(scratch.path()).await;
        assert!(matches!(result, Err(FuzzError::UnsafeWorkingRoot { .. })));
        assert!(keep.exists());

        // Missing directory is not created
        let missing = scratch.path().join("fresh");
        assert!(WorkingRoot::prepare(&missing).await.is_err());
        assert!(!missing.exists());
    }

    #[tokio::test]
    async fn test_prepare_wipes_previous_contents() {
        let dir = marked_tempdir();
        let root_path = dir.path().join("run");
        std::fs::create_dir_all(root_path.join("etc/frr")).unwrap();
        std::fs::write(root_path.join("bgpd.log"), "old").unwrap();

        let root = WorkingRoot::prepare(&root_path).await.unwrap();
        assert!(root.path().is_dir());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_creates_missing_root() {
        let dir = marked_tempdir();
        let root_path = dir.path().join("a/b");
        let root = WorkingRoot::prepare(&root_path).await.unwrap();
        assert!(root.path().is_dir());
    }

    #[test]
    fn test_shadow_path() {
        let root = WorkingRoot::existing(Path::new("/tmp/vtysh-fuzz")).unwrap();
        assert_eq!(
            root.shadow(Path::new("/etc/frr")),
            PathBuf::from("/tmp/vtysh-fuzz/etc/frr")
        );
        assert_eq!(
            root.shadow(Path::new("/var/run/frr")),
            PathBuf::from("/tmp/vtysh-fuzz/var/run/frr")
        );
    }

    #[test]
    fn test_artifact_layout() {
        let root = WorkingRoot::existing(Path::new("/tmp/vtysh-fuzz")).unwrap();
        assert_eq!(
            root.daemon_logs("bgpd"),
            [
                PathBuf::from("/tmp/vtysh-fuzz/bgpd.log"),
                PathBuf::from("/tmp/vtysh-fuzz/bgpd.stdout"),
                PathBuf::from("/tmp/vtysh-fuzz/bgpd.stderr"),
            ]
        );
        assert_eq!(
            root.transcript_stdout(),
            PathBuf::from("/tmp/vtysh-fuzz/vtysh.stdout")
        );
        assert_eq!(
            root.transcript_stderr(),
            PathBuf::from("/tmp/vtysh-fuzz/vtysh.stderr")
        );
        assert_eq!(
            root.crash_log(),
            PathBuf::from("/tmp/vtysh-fuzz/segfaults.txt")
        );
    }

    #[test]
    fn test_rotated_name() {
        assert_eq!(
            rotated_name(Path::new("/tmp/vtysh-fuzz/bgpd.stderr"), "1234"),
            PathBuf::from("/tmp/vtysh-fuzz/bgpd.stderr.1234")
        );
    }
}

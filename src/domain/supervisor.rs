//! Daemon lifecycle inside the isolation scope
//!
//! Daemons are started detached with their streams redirected under the
//! working root. Liveness is decided from the scope's process table, never
//! from the PID alone, so a recycled PID cannot hide a crash.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{FuzzError, Result};
use crate::isolation::WorkingRoot;
use crate::ports::IsolatedExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DaemonState {
    NotStarted,
    /// Spawned, not yet seen alive by a probe
    Starting,
    Running,
    /// Found dead; must be restarted before the next injection
    Crashed,
}

/// Bounded retry for resolving a freshly spawned daemon's PID
#[derive(Debug, Clone, Copy)]
pub struct PidLookup {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for PidLookup {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
struct DaemonEntry {
    name: String,
    /// PID inside the scope; empty when resolution failed
    pid: String,
    state: DaemonState,
}

pub struct DaemonSupervisor {
    executor: Arc<dyn IsolatedExecutor>,
    root: WorkingRoot,
    pid_dir: PathBuf,
    daemons: Vec<DaemonEntry>,
    lookup: PidLookup,
}

impl DaemonSupervisor {
    /// Supervisor for `names`, with pid files in the shadow of `localstatedir`
    #[must_use]
    pub fn new(
        executor: Arc<dyn IsolatedExecutor>,
        root: WorkingRoot,
        localstatedir: &Path,
        names: &[String],
    ) -> Self {
        Self {
            executor,
            pid_dir: root.shadow(localstatedir),
            root,
            daemons: names
                .iter()
                .map(|name| DaemonEntry {
                    name: name.clone(),
                    pid: String::new(),
                    state: DaemonState::NotStarted,
                })
                .collect(),
            lookup: PidLookup::default(),
        }
    }

    #[must_use]
    pub const fn with_pid_lookup(mut self, lookup: PidLookup) -> Self {
        self.lookup = lookup;
        self
    }

    /// Daemon names in configuration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.daemons.iter().map(|d| d.name.as_str())
    }

    /// Last recorded PID, empty if it could not be resolved
    ///
    /// # Errors
    ///
    /// Returns `UnknownDaemon` for a name that is not supervised.
    pub fn pid_of(&self, daemon: &str) -> Result<&str> {
        Ok(&self.entry(daemon)?.pid)
    }

    /// # Errors
    ///
    /// Returns `UnknownDaemon` for a name that is not supervised.
    pub fn state_of(&self, daemon: &str) -> Result<DaemonState> {
        Ok(self.entry(daemon)?.state)
    }

    /// Start every daemon in configuration order
    ///
    /// # Errors
    ///
    /// Returns the first start failure.
    pub async fn start_all(&mut self) -> Result<()> {
        let names: Vec<String> = self.names().map(str::to_string).collect();
        for name in &names {
            self.start(name).await?;
        }
        Ok(())
    }

    /// Remove the stale pid file, spawn the daemon detached and record its PID
    ///
    /// A resolved PID comes from a live entry in the scope's process table, so
    /// the daemon is `Running` on return. An unresolved PID is not an error:
    /// the daemon stays `Starting` with an empty PID and the next liveness
    /// probe decides.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDaemon` for an unsupervised name, `DaemonStart` if the
    /// daemon cannot be spawned, or the executor error of the PID lookup.
    pub async fn start(&mut self, daemon: &str) -> Result<()> {
        self.entry(daemon)?;

        let pid_file = self.pid_dir.join(format!("{daemon}.pid"));
        match tokio::fs::remove_file(&pid_file).await {
            Ok(()) => debug!(daemon, path = %pid_file.display(), "Stale pid file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(daemon, error = %e, "Could not remove pid file"),
        }

        self.executor
            .spawn_detached(
                &format!("{daemon} --log=stdout -d"),
                &self.root.daemon_stdout(daemon),
                &self.root.daemon_stderr(daemon),
            )
            .await
            .map_err(|e| FuzzError::DaemonStart {
                daemon: daemon.to_string(),
                reason: e.to_string(),
            })?;

        let pid = self.resolve_pid(daemon).await?;
        let state = if pid.is_empty() {
            warn!(daemon, "Could not resolve PID, daemon treated as not alive yet");
            DaemonState::Starting
        } else {
            info!(daemon, pid = %pid, "Daemon started");
            DaemonState::Running
        };

        let entry = self.entry_mut(daemon)?;
        entry.pid = pid;
        entry.state = state;
        Ok(())
    }

    /// Probe the scope's process table for a live instance of `daemon`
    ///
    /// Updates the daemon's state: `Running` when found, `Crashed` when a
    /// started daemon is missing. A daemon whose PID was not resolved at start
    /// counts as not alive until an instance shows up; that instance's PID is
    /// then recorded.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDaemon` for an unsupervised name, or the executor
    /// error if the process table cannot be listed.
    pub async fn is_alive(&mut self, daemon: &str) -> Result<bool> {
        self.entry(daemon)?;
        let live = self
            .executor
            .list_processes()
            .await?
            .into_iter()
            .find(|p| p.is_live_instance_of(daemon));
        let alive = live.is_some();

        let entry = self.entry_mut(daemon)?;
        if let Some(process) = live
            && entry.pid.is_empty()
            && entry.state != DaemonState::NotStarted
        {
            info!(daemon, pid = %process.pid, "Daemon PID resolved late");
            entry.pid = process.pid;
        }
        entry.state = match (alive, entry.state) {
            (_, DaemonState::NotStarted) => DaemonState::NotStarted,
            (true, _) => DaemonState::Running,
            (false, _) => DaemonState::Crashed,
        };
        Ok(alive)
    }

    /// Send SIGTERM to every tracked PID inside the scope
    ///
    /// # Errors
    ///
    /// Returns the executor error if `kill` cannot be run.
    pub async fn stop_all(&mut self) -> Result<()> {
        for entry in &mut self.daemons {
            if entry.pid.is_empty() || entry.state == DaemonState::NotStarted {
                continue;
            }
            let output = self.executor.run(&format!("kill {}", entry.pid)).await?;
            if output.success() {
                info!(daemon = %entry.name, pid = %entry.pid, "Daemon stopped");
            } else {
                debug!(daemon = %entry.name, pid = %entry.pid, "Daemon already gone");
            }
            entry.state = DaemonState::NotStarted;
        }
        Ok(())
    }

    async fn resolve_pid(&self, daemon: &str) -> Result<String> {
        for attempt in 1..=self.lookup.attempts {
            let found = self
                .executor
                .list_processes()
                .await?
                .into_iter()
                .find(|p| p.is_live_instance_of(daemon));
            if let Some(process) = found {
                return Ok(process.pid);
            }
            if attempt < self.lookup.attempts {
                debug!(daemon, attempt, "PID not visible yet");
                sleep(self.lookup.delay).await;
            }
        }
        Ok(String::new())
    }

    fn entry(&self, daemon: &str) -> Result<&DaemonEntry> {
        self.daemons
            .iter()
            .find(|d| d.name == daemon)
            .ok_or_else(|| FuzzError::UnknownDaemon {
                daemon: daemon.to_string(),
            })
    }

    fn entry_mut(&mut self, daemon: &str) -> Result<&mut DaemonEntry> {
        self.daemons
            .iter_mut()
            .find(|d| d.name == daemon)
            .ok_or_else(|| FuzzError::UnknownDaemon {
                daemon: daemon.to_string(),
            })
    }
}

//! Linux namespace isolation
//!
//! The scope is a long-lived holder process started in fresh PID, mount
//! and network namespaces. Commands enter the scope through `nsenter`
//! targeting the holder's namespace init.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{FuzzError, Result};
use crate::ports::{CommandOutput, IsolatedExecutor};

/// How often the namespace init PID is looked up before giving up
const INIT_LOOKUP_ATTEMPTS: u32 = 50;
const INIT_LOOKUP_DELAY: Duration = Duration::from_millis(20);

/// Holder of the isolated PID/mount/network namespaces
///
/// Dropping the scope kills the holder; its namespace init dies with it,
/// which takes every process of the PID namespace down as well.
pub struct IsolationScope {
    holder: Child,
    init_pid: u32,
}

impl IsolationScope {
    /// Create fresh PID, mount and network namespaces
    ///
    /// # Errors
    ///
    /// Returns `Spawn` if `unshare` cannot be executed and `Isolation` if the
    /// namespaces could not be set up (usually missing privileges).
    pub async fn create() -> Result<Self> {
        let mut holder = Command::new("unshare")
            .args([
                "--fork",
                "--pid",
                "--mount",
                "--net",
                "--mount-proc",
                "--kill-child",
                "sleep",
                "infinity",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            // Out of the terminal's process group: Ctrl-C stops the loop, not the scope
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FuzzError::Spawn {
                program: "unshare".to_string(),
                reason: e.to_string(),
            })?;

        let holder_pid = holder.id().ok_or_else(|| FuzzError::Isolation {
            reason: "unshare exited before its PID could be read".to_string(),
        })?;

        let init_pid = wait_for_init(&mut holder, holder_pid).await?;
        info!(holder_pid, init_pid, "Isolation scope created");

        Ok(Self { holder, init_pid })
    }

    /// Host PID of the process acting as init inside the scope
    #[must_use]
    pub const fn init_pid(&self) -> u32 {
        self.init_pid
    }

    /// Argument prefix that runs a host command inside the scope
    #[must_use]
    pub fn command_prefix(&self) -> Vec<String> {
        vec![
            "nsenter".to_string(),
            "--target".to_string(),
            self.init_pid.to_string(),
            "--pid".to_string(),
            "--mount".to_string(),
            "--net".to_string(),
        ]
    }

    /// Kill the holder and wait for it, tearing the namespaces down
    ///
    /// # Errors
    ///
    /// Returns an IO error if the holder cannot be signalled.
    pub async fn shutdown(mut self) -> Result<()> {
        self.holder.kill().await?;
        info!(init_pid = self.init_pid, "Isolation scope torn down");
        Ok(())
    }
}

async fn wait_for_init(holder: &mut Child, holder_pid: u32) -> Result<u32> {
    let children = format!("/proc/{holder_pid}/task/{holder_pid}/children");

    for attempt in 0..INIT_LOOKUP_ATTEMPTS {
        if let Some(status) = holder.try_wait()? {
            return Err(FuzzError::Isolation {
                reason: format!("unshare exited with {status} (root privileges are required)"),
            });
        }

        if let Ok(contents) = tokio::fs::read_to_string(&children).await
            && let Some(pid) = contents
                .split_whitespace()
                .next()
                .and_then(|p| p.parse().ok())
        {
            return Ok(pid);
        }

        debug!(attempt, "Namespace init not visible yet");
        sleep(INIT_LOOKUP_DELAY).await;
    }

    Err(FuzzError::Isolation {
        reason: format!("no namespace init appeared under unshare (PID {holder_pid})"),
    })
}

/// Executes shell command lines inside an [`IsolationScope`]
pub struct NamespaceExecutor {
    prefix: Vec<String>,
}

impl NamespaceExecutor {
    #[must_use]
    pub fn new(scope: &IsolationScope) -> Self {
        Self {
            prefix: scope.command_prefix(),
        }
    }

    /// Executor with an explicit entry prefix; an empty prefix runs on the host
    #[must_use]
    pub const fn with_prefix(prefix: Vec<String>) -> Self {
        Self { prefix }
    }

    fn command(&self, line: &str) -> Command {
        let mut cmd = match self.prefix.split_first() {
            Some((program, args)) => {
                let mut cmd = Command::new(program);
                cmd.args(args).arg("sh");
                cmd
            }
            None => Command::new("sh"),
        };
        cmd.arg("-c").arg(line).stdin(Stdio::null());
        cmd
    }

    fn program(&self) -> String {
        self.prefix
            .first()
            .cloned()
            .unwrap_or_else(|| "sh".to_string())
    }

    fn spawn_error(&self, e: &std::io::Error) -> FuzzError {
        FuzzError::Spawn {
            program: self.program(),
            reason: e.to_string(),
        }
    }
}

fn append_to(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[async_trait]
impl IsolatedExecutor for NamespaceExecutor {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let start = Instant::now();
        let output = self
            .command(command)
            .output()
            .await
            .map_err(|e| self.spawn_error(&e))?;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            debug!(command = %command, exit_code, "Command exited with failure");
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
            duration_ms,
        })
    }

    async fn run_appending(&self, command: &str, stdout: &Path, stderr: &Path) -> Result<i32> {
        let status = self
            .command(command)
            .stdout(append_to(stdout)?)
            .stderr(append_to(stderr)?)
            .status()
            .await
            .map_err(|e| self.spawn_error(&e))?;
        Ok(status.code().unwrap_or(-1))
    }

    async fn spawn_detached(&self, command: &str, stdout: &Path, stderr: &Path) -> Result<()> {
        let child = self
            .command(command)
            .stdout(File::create(stdout)?)
            .stderr(File::create(stderr)?)
            .spawn()
            .map_err(|e| self.spawn_error(&e))?;

        // Not awaited: the runtime reaps the child once it exits
        match child.id() {
            Some(pid) => debug!(command = %command, host_pid = pid, "Spawned detached"),
            None => warn!(command = %command, "Detached command exited immediately"),
        }
        Ok(())
    }
}

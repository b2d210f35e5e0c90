//! Repeated injection of the corpus with a liveness sweep after every
//! command.

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::corpus::Command;
use super::report::CrashEvent;
use super::session::FuzzSession;
use crate::error::Result;
use crate::isolation::{WorkingRoot, rotated_name};

/// Suffix for rotated logs when the dead process's PID was never resolved
const UNKNOWN_PID_SUFFIX: &str = "unknown";

impl FuzzSession {
    /// Inject the corpus until the iteration limit is reached or `cancel`
    /// fires
    ///
    /// Shuffling reorders `corpus` in place before each pass, so later
    /// passes start from the previous permutation. Cancellation is observed
    /// between commands.
    ///
    /// # Returns
    /// The number of completed passes
    ///
    /// # Errors
    ///
    /// Returns an error if the process table cannot be probed, if a crash
    /// cannot be recorded, or if a crashed daemon cannot be restarted.
    pub async fn run(&mut self, corpus: &mut [Command], cancel: &CancellationToken) -> Result<u64> {
        if corpus.is_empty() {
            info!("Corpus is empty, nothing to inject");
            return Ok(0);
        }

        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let mut iteration = 0;

        loop {
            iteration += 1;
            println!("\nfuzz iteration: #{iteration}");
            if self.options.shuffle {
                corpus.shuffle(&mut rng);
            }

            for command in corpus.iter() {
                if cancel.is_cancelled() {
                    warn!(iteration, "Fuzzing interrupted");
                    return Ok(self.iterations_completed);
                }
                self.report.counters.tested += 1;
                self.inject(command).await?;
                self.sweep(command).await?;
            }

            self.iterations_completed = iteration;
            if self.options.limit.is_reached(iteration) {
                break;
            }
        }

        info!(
            iterations = iteration,
            tested = self.report.counters.tested,
            crashed = self.report.counters.crashed,
            "Fuzzing finished"
        );
        Ok(iteration)
    }

    /// Echo the command into both transcripts, then run it with its output
    /// appended
    async fn inject(&self, command: &Command) -> Result<()> {
        let shown = command.to_string();
        println!("testing: {shown}");

        let stdout = self.root.transcript_stdout();
        let stderr = self.root.transcript_stderr();
        append_line(&stdout, &shown).await?;
        append_line(&stderr, &shown).await?;

        match self
            .executor
            .run_appending(&command.invocation(), &stdout, &stderr)
            .await
        {
            Ok(0) => {}
            Ok(code) => {
                debug!(command = %shown, exit_code = code, "Injection exited with failure");
            }
            Err(e) => warn!(command = %shown, error = %e, "Injection could not be run"),
        }
        Ok(())
    }

    /// Check every daemon and restart the dead ones
    async fn sweep(&mut self, command: &Command) -> Result<()> {
        let names: Vec<String> = self.supervisor.names().map(str::to_string).collect();
        for daemon in &names {
            if !self.supervisor.is_alive(daemon).await? {
                self.handle_crash(daemon, command).await?;
            }
        }
        Ok(())
    }

    async fn handle_crash(&mut self, daemon: &str, command: &Command) -> Result<()> {
        let pid = self.supervisor.pid_of(daemon)?.to_string();
        let event = CrashEvent::new(daemon, &command.to_string(), &pid);

        println!("{}", event.notice());
        warn!(daemon, pid = %pid, command = %command, "Daemon crashed");

        self.report.record_crash(&event);
        append_line(&self.root.crash_log(), &event.log_line()).await?;
        rotate_logs(&self.root, daemon, &pid).await?;

        self.supervisor.start(daemon).await
    }
}

async fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{line}\n").as_bytes()).await?;
    Ok(())
}

/// Rename the daemon's log, stdout and stderr files to `<file>.<pid>`
///
/// Missing files are skipped.
///
/// # Errors
///
/// Returns an IO error if an existing file cannot be renamed.
pub async fn rotate_logs(root: &WorkingRoot, daemon: &str, pid: &str) -> Result<()> {
    let suffix = if pid.is_empty() { UNKNOWN_PID_SUFFIX } else { pid };
    for path in root.daemon_logs(daemon) {
        let target = rotated_name(&path, suffix);
        match tokio::fs::rename(&path, &target).await {
            Ok(()) => debug!(from = %path.display(), to = %target.display(), "Log rotated"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No log to rotate");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

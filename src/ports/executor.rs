//! Isolated Executor Port
//!
//! This module defines the trait for running commands inside the
//! isolation scope, abstracting away how the scope is entered.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Process-table listing used by liveness probes and PID resolution.
pub const PROCESS_TABLE_COMMAND: &str = "ps -eo pid=,stat=,args=";

/// Output from a command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `-1` when the process was killed by a signal
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One row of the process table as seen inside the isolation scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: String,
    /// `ps` STAT column (`S`, `R`, `Z`, `Ssl`, ...)
    pub state: String,
    pub command: String,
}

impl ProcessEntry {
    /// Basename of the executable in the command line
    #[must_use]
    pub fn program(&self) -> &str {
        let first = self.command.split_whitespace().next().unwrap_or_default();
        first.rsplit('/').next().unwrap_or(first)
    }

    /// Zombie/defunct processes are dead even though they are still listed
    #[must_use]
    pub fn is_zombie(&self) -> bool {
        self.state.starts_with('Z') || self.command.contains("<defunct>")
    }

    /// A live process whose executable is `name`
    #[must_use]
    pub fn is_live_instance_of(&self, name: &str) -> bool {
        !self.is_zombie() && self.program() == name
    }
}

/// Parse the output of [`PROCESS_TABLE_COMMAND`]
#[must_use]
pub fn parse_process_table(output: &str) -> Vec<ProcessEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let pid = parts.next()?;
            if !pid.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let state = parts.next()?;
            let command = parts.collect::<Vec<_>>().join(" ");
            if command.is_empty() {
                return None;
            }
            Some(ProcessEntry {
                pid: pid.to_string(),
                state: state.to_string(),
                command,
            })
        })
        .collect()
}

/// Trait for command execution inside the isolation scope
///
/// Commands are shell command lines. Every call runs in the scope's
/// process, network and mount namespaces.
#[async_trait]
pub trait IsolatedExecutor: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Run a command to completion, appending its streams to the given files
    ///
    /// # Returns
    /// The exit code (`-1` when killed by a signal)
    async fn run_appending(&self, command: &str, stdout: &Path, stderr: &Path) -> Result<i32>;

    /// Start a command without waiting for it, redirecting its streams to
    /// freshly truncated files
    async fn spawn_detached(&self, command: &str, stdout: &Path, stderr: &Path) -> Result<()>;

    /// Snapshot the process table of the scope
    async fn list_processes(&self) -> Result<Vec<ProcessEntry>> {
        let output = self.run(PROCESS_TABLE_COMMAND).await?;
        Ok(parse_process_table(&output.stdout))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    // ============== Process Table Parsing ==============

    #[test]
    fn test_parse_process_table() {
        let output = "    1 Ss   sleep infinity\n   42 Ssl  /usr/lib/frr/bgpd --log=stdout -d\n   57 Z    [zebra] <defunct>\n";
        let entries = parse_process_table(output);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].pid, "42");
        assert_eq!(entries[1].state, "Ssl");
        assert_eq!(entries[1].command, "/usr/lib/frr/bgpd --log=stdout -d");
        assert_eq!(entries[1].program(), "bgpd");
    }

    #[test]
    fn test_parse_process_table_skips_garbage() {
        let entries = parse_process_table("PID STAT COMMAND\n\n 7 S\n");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_process_table_drops_rows_without_command() {
        let entries = parse_process_table("   7 S\n   8 Ss   /usr/lib/frr/zebra -d\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pid, "8");
        assert_eq!(entries[0].program(), "zebra");
    }

    #[test]
    fn test_zombie_is_not_live() {
        let entry = ProcessEntry {
            pid: "57".to_string(),
            state: "Z".to_string(),
            command: "zebra".to_string(),
        };
        assert!(entry.is_zombie());
        assert!(!entry.is_live_instance_of("zebra"));
    }

    #[test]
    fn test_defunct_marker_is_zombie() {
        let entry = ProcessEntry {
            pid: "58".to_string(),
            state: "S".to_string(),
            command: "[bgpd] <defunct>".to_string(),
        };
        assert!(entry.is_zombie());
    }

    #[test]
    fn test_probe_does_not_match_daemon() {
        // The probe's own command line mentions no daemon as its program
        let entries =
            parse_process_table("  90 R+   ps -eo pid=,stat=,args=\n  91 S   grep bgpd\n");
        assert!(!entries.iter().any(|e| e.is_live_instance_of("bgpd")));
    }

    #[test]
    fn test_program_requires_exact_name() {
        let entry = ProcessEntry {
            pid: "10".to_string(),
            state: "S".to_string(),
            command: "ospf6d -d".to_string(),
        };
        assert!(!entry.is_live_instance_of("ospfd"));
        assert!(entry.is_live_instance_of("ospf6d"));
    }

    #[test]
    fn test_command_output_success() {
        let ok = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            duration_ms: 0,
        };
        assert!(ok.success());
        let failed = CommandOutput {
            exit_code: 1,
            ..ok
        };
        assert!(!failed.success());
    }

    // ============== Mock Executor ==============

    #[tokio::test]
    async fn test_mock_spawn_and_kill() {
        let dir = tempfile::tempdir().unwrap();
        let executor = mock::MockExecutor::new();
        executor
            .spawn_detached(
                "bgpd --log=stdout -d",
                &dir.path().join("bgpd.stdout"),
                &dir.path().join("bgpd.stderr"),
            )
            .await
            .unwrap();

        let table = executor.list_processes().await.unwrap();
        assert!(table.iter().any(|e| e.is_live_instance_of("bgpd")));
        assert!(dir.path().join("bgpd.stdout").exists());

        executor.kill("bgpd");
        let table = executor.list_processes().await.unwrap();
        assert!(!table.iter().any(|e| e.is_live_instance_of("bgpd")));
        assert_eq!(table.len(), 1);
    }
}

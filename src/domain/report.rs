//! Run counters, crash aggregation and the final summary

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Commands that passed both filters
    pub non_filtered: u64,
    pub filtered_whitelist: u64,
    pub filtered_blacklist: u64,
    /// Injections performed, across all passes
    pub tested: u64,
    /// Crash events, one per dead daemon per probe
    pub crashed: u64,
}

/// One daemon death attributed to the command injected just before it
#[derive(Debug, Clone, Serialize)]
pub struct CrashEvent {
    pub timestamp: DateTime<Utc>,
    pub daemon: String,
    pub command: String,
    pub pid: String,
}

impl CrashEvent {
    #[must_use]
    pub fn new(daemon: &str, command: &str, pid: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            daemon: daemon.to_string(),
            command: command.to_string(),
            pid: pid.to_string(),
        }
    }

    /// Grouping key, e.g. `bgpd aborted: vtysh configure -c "router bgp 1"`
    #[must_use]
    pub fn message(&self) -> String {
        format!("{} aborted: {}", self.daemon, self.command)
    }

    /// Inline notice printed while fuzzing
    #[must_use]
    pub fn notice(&self) -> String {
        format!("{} (PID: {})", self.message(), self.pid)
    }

    /// Line appended to the crash transcript
    #[must_use]
    pub fn log_line(&self) -> String {
        format!("[{}] {}", self.timestamp.to_rfc3339(), self.notice())
    }
}

/// Crash occurrences sharing one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrashGroup {
    pub message: String,
    /// PIDs of the dead processes, in occurrence order
    pub pids: Vec<String>,
}

impl CrashGroup {
    #[must_use]
    pub fn count(&self) -> usize {
        self.pids.len()
    }
}

/// Crash groups in order of first occurrence
#[derive(Debug, Clone, Default)]
pub struct CrashRegistry {
    groups: Vec<CrashGroup>,
}

impl CrashRegistry {
    pub fn record(&mut self, message: &str, pid: &str) {
        match self.groups.iter_mut().find(|g| g.message == message) {
            Some(group) => group.pids.push(pid.to_string()),
            None => self.groups.push(CrashGroup {
                message: message.to_string(),
                pids: vec![pid.to_string()],
            }),
        }
    }

    #[must_use]
    pub fn groups(&self) -> &[CrashGroup] {
        &self.groups
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total occurrences across all groups
    #[must_use]
    pub fn total(&self) -> usize {
        self.groups.iter().map(CrashGroup::count).sum()
    }
}

/// Mutable state the corpus builder and fuzz loop report into
#[derive(Debug, Clone)]
pub struct Report {
    pub counters: Counters,
    crashes: CrashRegistry,
    started_at: DateTime<Utc>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Counters::default(),
            crashes: CrashRegistry::default(),
            started_at: Utc::now(),
        }
    }

    pub fn record_crash(&mut self, event: &CrashEvent) {
        self.counters.crashed += 1;
        self.crashes.record(&event.message(), &event.pid);
    }

    #[must_use]
    pub const fn crashes(&self) -> &CrashRegistry {
        &self.crashes
    }

    #[must_use]
    pub fn summarize(&self, iterations: u64) -> Summary {
        Summary {
            counters: self.counters.clone(),
            iterations,
            crashes: self.crashes.groups().to_vec(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// End-of-run results
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub counters: Counters,
    /// Completed passes over the corpus
    pub iterations: u64,
    pub crashes: Vec<CrashGroup>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Summary {
    /// Human-readable results block
    #[must_use]
    pub fn render(&self) -> String {
        let c = &self.counters;
        let mut out = String::from("results:\n");
        let _ = writeln!(out, "- non-filtered commands: {}", c.non_filtered);
        let _ = writeln!(out, "- whitelist filtered commands: {}", c.filtered_whitelist);
        let _ = writeln!(out, "- blacklist filtered commands: {}", c.filtered_blacklist);
        let _ = writeln!(out, "- tested commands: {}", c.tested);
        let _ = writeln!(out, "- segfaults detected: {}", c.crashed);
        for group in &self.crashes {
            let _ = writeln!(out, "    (x{}) {}", group.count(), group.message);
            let _ = writeln!(out, "      PIDs: {}", group.pids.join(" "));
        }
        out
    }

    /// Write the summary as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns a JSON or IO error if the file cannot be written.
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), "Summary written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============== Crash Events ==============

    #[test]
    fn test_crash_event_forms() {
        let event = CrashEvent::new("bgpd", "vtysh configure -c \"router bgp 1\"", "100");
        assert_eq!(
            event.message(),
            "bgpd aborted: vtysh configure -c \"router bgp 1\""
        );
        assert_eq!(
            event.notice(),
            "bgpd aborted: vtysh configure -c \"router bgp 1\" (PID: 100)"
        );
        let line = event.log_line();
        assert!(line.starts_with('['));
        assert!(line.ends_with("(PID: 100)"));
    }

    // ============== Registry ==============

    #[test]
    fn test_registry_groups_identical_messages() {
        let mut registry = CrashRegistry::default();
        registry.record("bgpd aborted: x", "100");
        registry.record("bgpd aborted: x", "101");

        assert_eq!(registry.groups().len(), 1);
        assert_eq!(registry.groups()[0].pids, vec!["100", "101"]);
        assert_eq!(registry.total(), 2);
    }

    #[test]
    fn test_registry_keeps_first_occurrence_order() {
        let mut registry = CrashRegistry::default();
        registry.record("zebra aborted: b", "7");
        registry.record("bgpd aborted: a", "8");
        registry.record("zebra aborted: b", "9");

        let messages: Vec<&str> = registry
            .groups()
            .iter()
            .map(|g| g.message.as_str())
            .collect();
        assert_eq!(messages, vec!["zebra aborted: b", "bgpd aborted: a"]);
    }

    #[test]
    fn test_report_counts_every_crash() {
        let mut report = Report::new();
        report.record_crash(&CrashEvent::new("bgpd", "cmd", "1"));
        report.record_crash(&CrashEvent::new("bgpd", "cmd", "2"));
        assert_eq!(report.counters.crashed, 2);
        assert_eq!(report.crashes().total(), 2);
    }

    // ============== Summary ==============

    #[test]
    fn test_render_without_crashes() {
        let mut report = Report::new();
        report.counters.non_filtered = 4;
        report.counters.filtered_blacklist = 1;
        report.counters.tested = 8;

        assert_eq!(
            report.summarize(2).render(),
            "results:\n\
             - non-filtered commands: 4\n\
             - whitelist filtered commands: 0\n\
             - blacklist filtered commands: 1\n\
             - tested commands: 8\n\
             - segfaults detected: 0\n"
        );
    }

    #[tokio::test]
    async fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let mut report = Report::new();
        report.counters.tested = 3;
        report.record_crash(&CrashEvent::new("zebra", "vtysh -c \"x\"", "12"));

        report.summarize(1).write_json(&path).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["counters"]["tested"], 3);
        assert_eq!(value["counters"]["crashed"], 1);
        assert_eq!(value["iterations"], 1);
        assert_eq!(value["crashes"][0]["message"], "zebra aborted: vtysh -c \"x\"");
        assert_eq!(value["crashes"][0]["pids"][0], "12");
    }
}

//! One fuzzing run: the executor, working root, supervised daemons and the
//! report they feed.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::corpus::{Command, CorpusBuilder};
use super::report::{Report, Summary};
use super::supervisor::DaemonSupervisor;
use crate::config::{Config, IterationLimit};
use crate::error::Result;
use crate::isolation::WorkingRoot;
use crate::ports::IsolatedExecutor;

/// How the fuzz loop walks the corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzOptions {
    pub limit: IterationLimit,
    pub shuffle: bool,
    pub seed: u64,
}

impl FuzzOptions {
    /// Options from the configuration; a missing seed is drawn from entropy
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        if config.random_order {
            info!(seed, "Corpus shuffling enabled");
        }
        Self {
            limit: config.iterations,
            shuffle: config.random_order,
            seed,
        }
    }
}

pub struct FuzzSession {
    pub(super) executor: Arc<dyn IsolatedExecutor>,
    pub(super) root: WorkingRoot,
    pub(super) supervisor: DaemonSupervisor,
    pub(super) report: Report,
    pub(super) options: FuzzOptions,
    pub(super) iterations_completed: u64,
}

impl FuzzSession {
    #[must_use]
    pub fn new(
        executor: Arc<dyn IsolatedExecutor>,
        root: WorkingRoot,
        config: &Config,
        options: FuzzOptions,
    ) -> Self {
        let supervisor = DaemonSupervisor::new(
            Arc::clone(&executor),
            root.clone(),
            &config.frr.localstatedir,
            &config.daemons,
        );
        Self::with_supervisor(executor, root, supervisor, options)
    }

    /// Session around an already configured supervisor
    #[must_use]
    pub fn with_supervisor(
        executor: Arc<dyn IsolatedExecutor>,
        root: WorkingRoot,
        supervisor: DaemonSupervisor,
        options: FuzzOptions,
    ) -> Self {
        Self {
            executor,
            root,
            supervisor,
            report: Report::new(),
            options,
            iterations_completed: 0,
        }
    }

    #[must_use]
    pub const fn supervisor(&self) -> &DaemonSupervisor {
        &self.supervisor
    }

    pub const fn supervisor_mut(&mut self) -> &mut DaemonSupervisor {
        &mut self.supervisor
    }

    #[must_use]
    pub const fn report(&self) -> &Report {
        &self.report
    }

    #[must_use]
    pub const fn root(&self) -> &WorkingRoot {
        &self.root
    }

    #[must_use]
    pub const fn iterations_completed(&self) -> u64 {
        self.iterations_completed
    }

    /// Start every configured daemon
    ///
    /// # Errors
    ///
    /// Returns the first daemon start failure.
    pub async fn start_daemons(&mut self) -> Result<()> {
        self.supervisor.start_all().await
    }

    /// Enumerate and filter the configured hierarchies
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for a bad filter pattern or the executor
    /// error if enumeration cannot run.
    pub async fn build_corpus(&mut self, config: &Config) -> Result<Vec<Command>> {
        CorpusBuilder::new(self.executor.as_ref(), config)
            .build(&config.nodes, &mut self.report.counters)
            .await
    }

    #[must_use]
    pub fn summarize(&self) -> Summary {
        self.report.summarize(self.iterations_completed)
    }

    /// Write `summary.json` under the working root
    ///
    /// # Errors
    ///
    /// Returns a JSON or IO error if the file cannot be written.
    pub async fn write_summary(&self) -> Result<PathBuf> {
        let path = self.root.summary_file();
        self.summarize().write_json(&path).await?;
        Ok(path)
    }
}

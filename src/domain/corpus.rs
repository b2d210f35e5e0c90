//! Command corpus construction
//!
//! Each configured hierarchy is enumerated with `list permutations`; every
//! line is filtered, then rewritten into an injectable command.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::filter::{CommandFilter, FilterVerdict};
use super::report::Counters;
use super::shell;
use crate::config::{Config, Hierarchy, Substitutions};
use crate::error::Result;
use crate::ports::IsolatedExecutor;

/// Text the CLI frontend expands into every command reachable from a node
pub const LIST_PERMUTATIONS: &str = "list permutations";

/// Range placeholder at the start of a token, e.g. `(1-65535)`
static RANGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\((-?\d+)-(-?\d+)\)").expect("invalid range token regex"));

/// One injectable unit: CLI frontend, node hierarchy and command text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub cli: String,
    pub hierarchy: String,
    pub text: String,
}

impl Command {
    #[must_use]
    pub fn new(cli: &str, hierarchy: &str, text: &str) -> Self {
        Self {
            cli: cli.to_string(),
            hierarchy: hierarchy.to_string(),
            text: text.to_string(),
        }
    }

    /// Shell line executed inside the isolation scope
    #[must_use]
    pub fn invocation(&self) -> String {
        command_line(&self.cli, &self.hierarchy, &shell::escape(&self.text))
    }
}

/// `<cli> <hierarchy> -c "<text>"`, the form used in transcripts and reports
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&command_line(
            &self.cli,
            &self.hierarchy,
            &format!("\"{}\"", self.text),
        ))
    }
}

fn command_line(cli: &str, hierarchy: &str, quoted_text: &str) -> String {
    if hierarchy.is_empty() {
        format!("{cli} -c {quoted_text}")
    } else {
        format!("{cli} {hierarchy} -c {quoted_text}")
    }
}

/// Shell line that enumerates every command reachable from `hierarchy`
#[must_use]
pub fn enumeration_command(cli: &str, hierarchy: &str) -> String {
    command_line(cli, hierarchy, &shell::escape(LIST_PERMUTATIONS))
}

/// Rewrite one enumerated line into concrete command text
///
/// Every substitution is applied to each whitespace-separated token in
/// configuration order (first occurrence, literal), so a longer placeholder
/// listed first wins over its prefix. Then a leading `(a-b)` range is
/// collapsed to its upper bound `b`. Tokens are rejoined with single
/// spaces.
#[must_use]
pub fn prepare_command(line: &str, substitutions: &Substitutions) -> String {
    line.split_whitespace()
        .map(|token| {
            let substituted = substitutions
                .iter()
                .filter(|(from, _)| !from.is_empty())
                .fold(token.to_string(), |word, (from, to)| {
                    word.replacen(from.as_str(), to, 1)
                });
            match collapse_range(&substituted) {
                Some(upper) => upper.to_string(),
                None => substituted,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Upper bound of a token starting with an `(a-b)` range placeholder
#[must_use]
pub fn collapse_range(token: &str) -> Option<&str> {
    RANGE_TOKEN
        .captures(token)
        .and_then(|caps| caps.get(2))
        .map(|upper| upper.as_str())
}

/// Enumerates and filters commands for every configured hierarchy
pub struct CorpusBuilder<'a> {
    executor: &'a dyn IsolatedExecutor,
    cli: &'a str,
    substitutions: &'a Substitutions,
    global_whitelist: &'a [String],
    global_blacklist: &'a [String],
}

impl<'a> CorpusBuilder<'a> {
    #[must_use]
    pub fn new(executor: &'a dyn IsolatedExecutor, config: &'a Config) -> Self {
        Self {
            executor,
            cli: &config.cli,
            substitutions: &config.substitutions,
            global_whitelist: &config.global_whitelist,
            global_blacklist: &config.global_blacklist,
        }
    }

    /// Build the corpus in hierarchy order, then enumeration order
    ///
    /// Filter outcomes are tallied into `counters`. Duplicates are kept.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if a filter pattern does not compile, or the
    /// executor error if enumeration cannot be run at all.
    pub async fn build(
        &self,
        nodes: &[Hierarchy],
        counters: &mut Counters,
    ) -> Result<Vec<Command>> {
        let mut corpus = Vec::new();

        for node in nodes {
            let filter = CommandFilter::compile(
                &node.whitelist,
                &node.blacklist,
                self.global_whitelist,
                self.global_blacklist,
            )?;

            for candidate in self.enumerate(&node.hierarchy).await? {
                match filter.check(&candidate) {
                    FilterVerdict::Accept => {
                        counters.non_filtered += 1;
                        let text = prepare_command(&candidate, self.substitutions);
                        corpus.push(Command::new(self.cli, &node.hierarchy, &text));
                    }
                    FilterVerdict::RejectedByWhitelist => {
                        counters.filtered_whitelist += 1;
                        println!("filtering (whitelist): {candidate}");
                    }
                    FilterVerdict::RejectedByBlacklist => {
                        counters.filtered_blacklist += 1;
                        println!("filtering (blacklist): {candidate}");
                    }
                }
            }
        }

        println!("non-filtered commands: {}", counters.non_filtered);
        info!(
            accepted = counters.non_filtered,
            whitelist = counters.filtered_whitelist,
            blacklist = counters.filtered_blacklist,
            "Corpus built"
        );
        Ok(corpus)
    }

    /// Trimmed, non-blank candidate lines reachable from one hierarchy
    async fn enumerate(&self, hierarchy: &str) -> Result<Vec<String>> {
        let line = enumeration_command(self.cli, hierarchy);
        let output = self.executor.run(&line).await?;
        if !output.success() {
            warn!(
                hierarchy,
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "Enumeration exited with failure"
            );
        }

        // Blank lines are not candidates: they are neither counted nor
        // injected as an empty `-c ''`
        let candidates: Vec<String> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        debug!(hierarchy, count = candidates.len(), "Hierarchy enumerated");
        Ok(candidates)
    }
}

//! Whitelist/blacklist filtering of enumerated commands

use regex::Regex;

use crate::error::{FuzzError, Result};

/// Outcome of filtering one candidate command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Accept,
    RejectedByWhitelist,
    RejectedByBlacklist,
}

/// Compiled filter for one hierarchy: its own patterns plus the global ones
///
/// The whitelist is checked first and only applies when it has at least one
/// pattern. A command rejected by the whitelist is never reported as
/// blacklisted, so each command lands in exactly one bucket.
#[derive(Debug, Clone)]
pub struct CommandFilter {
    whitelist: Vec<Regex>,
    blacklist: Vec<Regex>,
}

impl CommandFilter {
    /// Compile local and global pattern lists
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for the first pattern that is not a valid regex.
    pub fn compile(
        local_whitelist: &[String],
        local_blacklist: &[String],
        global_whitelist: &[String],
        global_blacklist: &[String],
    ) -> Result<Self> {
        Ok(Self {
            whitelist: compile_all("whitelist", local_whitelist.iter().chain(global_whitelist))?,
            blacklist: compile_all("blacklist", local_blacklist.iter().chain(global_blacklist))?,
        })
    }

    #[must_use]
    pub fn check(&self, command: &str) -> FilterVerdict {
        if !self.whitelist.is_empty() && !self.whitelist.iter().any(|p| p.is_match(command)) {
            return FilterVerdict::RejectedByWhitelist;
        }
        if self.blacklist.iter().any(|p| p.is_match(command)) {
            return FilterVerdict::RejectedByBlacklist;
        }
        FilterVerdict::Accept
    }
}

fn compile_all<'a>(field: &str, patterns: impl Iterator<Item = &'a String>) -> Result<Vec<Regex>> {
    patterns
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| FuzzError::ConfigInvalid {
                field: field.to_string(),
                reason: format!("Invalid regex '{pattern}': {e}"),
            })
        })
        .collect()
}

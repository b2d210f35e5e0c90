use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Substring every working root must contain before anything under it is
/// wiped or created.
pub const WORKING_ROOT_MARKER: &str = "vtysh-fuzz";

/// Template key applied to every daemon before its own override.
pub const SHARED_TEMPLATE_KEY: &str = "all";

/// Literal token rewrites, applied in the order they appear in the file.
pub type Substitutions = IndexMap<String, String>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Number of passes over the corpus (`<= 0` in YAML means unbounded)
    #[serde(default)]
    pub iterations: IterationLimit,

    /// Shuffle the corpus before every pass
    #[serde(default)]
    pub random_order: bool,

    /// Seed for the shuffle; drawn from entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,

    /// Disposable directory receiving configs, logs and bind-mount shadows
    #[serde(default = "default_working_root")]
    pub working_root: PathBuf,

    #[serde(default)]
    pub frr: FrrConfig,

    /// Interactive CLI frontend used for enumeration and injection
    #[serde(default = "default_cli")]
    pub cli: String,

    #[serde(default)]
    pub daemons: Vec<String>,

    /// Configuration templates keyed by daemon name, plus the shared `all` key
    #[serde(default)]
    pub configs: HashMap<String, String>,

    #[serde(default)]
    pub nodes: Vec<Hierarchy>,

    /// Literal token rewrites applied before range collapsing
    #[serde(default)]
    pub substitutions: Substitutions,

    #[serde(default)]
    pub global_whitelist: Vec<String>,

    #[serde(default)]
    pub global_blacklist: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iterations: IterationLimit::default(),
            random_order: false,
            seed: None,
            working_root: default_working_root(),
            frr: FrrConfig::default(),
            cli: default_cli(),
            daemons: Vec::new(),
            configs: HashMap::new(),
            nodes: Vec::new(),
            substitutions: Substitutions::new(),
            global_whitelist: Vec::new(),
            global_blacklist: Vec::new(),
        }
    }
}

/// How many passes the fuzz loop makes over the corpus.
///
/// Deserialized from a plain integer: any value `<= 0` selects `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "i64", into = "i64")]
pub enum IterationLimit {
    Bounded(u64),
    Unbounded,
}

impl IterationLimit {
    /// Whether `completed` passes satisfy the limit
    #[must_use]
    pub const fn is_reached(self, completed: u64) -> bool {
        match self {
            Self::Bounded(limit) => completed >= limit,
            Self::Unbounded => false,
        }
    }
}

impl Default for IterationLimit {
    fn default() -> Self {
        Self::Bounded(1)
    }
}

impl From<i64> for IterationLimit {
    fn from(value: i64) -> Self {
        u64::try_from(value)
            .ok()
            .filter(|n| *n > 0)
            .map_or(Self::Unbounded, Self::Bounded)
    }
}

impl From<IterationLimit> for i64 {
    fn from(limit: IterationLimit) -> Self {
        match limit {
            IterationLimit::Bounded(n) => Self::try_from(n).unwrap_or(Self::MAX),
            IterationLimit::Unbounded => 0,
        }
    }
}

impl fmt::Display for IterationLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Install layout of the daemons under test
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrrConfig {
    /// Directory the daemons read their `<daemon>.conf` from
    #[serde(default = "default_sysconfdir")]
    pub sysconfdir: PathBuf,

    /// Directory holding pid files and vty sockets
    #[serde(default = "default_localstatedir")]
    pub localstatedir: PathBuf,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_group")]
    pub group: String,
}

impl Default for FrrConfig {
    fn default() -> Self {
        Self {
            sysconfdir: default_sysconfdir(),
            localstatedir: default_localstatedir(),
            user: default_user(),
            group: default_group(),
        }
    }
}

/// A command-tree location to enumerate, with optional local filters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Hierarchy {
    /// Arguments placed between the CLI name and `-c`,
    /// e.g. `-c "configure terminal" -c "router bgp 1"`
    pub hierarchy: String,

    #[serde(default)]
    pub whitelist: Vec<String>,

    #[serde(default)]
    pub blacklist: Vec<String>,
}

fn default_working_root() -> PathBuf {
    PathBuf::from("/tmp/vtysh-fuzz")
}

fn default_cli() -> String {
    "vtysh".to_string()
}

fn default_sysconfdir() -> PathBuf {
    PathBuf::from("/etc/frr")
}

fn default_localstatedir() -> PathBuf {
    PathBuf::from("/var/run/frr")
}

fn default_user() -> String {
    "frr".to_string()
}

fn default_group() -> String {
    "frr".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_limit_from_positive() {
        assert_eq!(IterationLimit::from(5), IterationLimit::Bounded(5));
    }

    #[test]
    fn test_iteration_limit_zero_and_negative_are_unbounded() {
        assert_eq!(IterationLimit::from(0), IterationLimit::Unbounded);
        assert_eq!(IterationLimit::from(-3), IterationLimit::Unbounded);
    }

    #[test]
    fn test_iteration_limit_into_i64() {
        assert_eq!(i64::from(IterationLimit::Bounded(7)), 7);
        assert_eq!(i64::from(IterationLimit::Unbounded), 0);
        assert_eq!(i64::from(IterationLimit::Bounded(u64::MAX)), i64::MAX);
    }

    #[test]
    fn test_iteration_limit_is_reached() {
        let limit = IterationLimit::Bounded(2);
        assert!(!limit.is_reached(0));
        assert!(!limit.is_reached(1));
        assert!(limit.is_reached(2));
        assert!(!IterationLimit::Unbounded.is_reached(u64::MAX));
    }

    #[test]
    fn test_iteration_limit_display() {
        assert_eq!(IterationLimit::Bounded(3).to_string(), "3");
        assert_eq!(IterationLimit::Unbounded.to_string(), "unbounded");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.iterations, IterationLimit::Bounded(1));
        assert!(!config.random_order);
        assert_eq!(config.cli, "vtysh");
        assert_eq!(config.frr.sysconfdir, PathBuf::from("/etc/frr"));
        assert_eq!(config.frr.localstatedir, PathBuf::from("/var/run/frr"));
        assert_eq!(config.frr.user, "frr");
        assert_eq!(config.frr.group, "frr");
        assert!(
            config
                .working_root
                .to_string_lossy()
                .contains(WORKING_ROOT_MARKER)
        );
    }
}

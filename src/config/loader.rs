use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::types::{Config, SHARED_TEMPLATE_KEY, WORKING_ROOT_MARKER};
use crate::error::{FuzzError, Result};

/// Load configuration from a YAML file
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file does not exist
/// - The file cannot be read
/// - The YAML content is invalid or cannot be parsed
/// - The configuration fails validation (no daemons, bad daemon names,
///   invalid regex patterns, working root without the safety marker)
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(FuzzError::ConfigNotFound {
            path: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let mut config: Config = serde_saphyr::from_str(&content)?;

    let expanded = shellexpand::tilde(&config.working_root.to_string_lossy()).into_owned();
    config.working_root = PathBuf::from(expanded);

    validate_config(&config)?;

    debug!(
        daemons = config.daemons.len(),
        nodes = config.nodes.len(),
        "Configuration validated"
    );

    Ok(config)
}

/// Validate the configuration
///
/// # Errors
///
/// Returns `ConfigInvalid` naming the first offending field.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.daemons.is_empty() {
        return Err(FuzzError::ConfigInvalid {
            field: "daemons".to_string(),
            reason: "At least one daemon must be defined".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for (i, daemon) in config.daemons.iter().enumerate() {
        if daemon.is_empty() || daemon.contains(char::is_whitespace) || daemon.contains('/') {
            return Err(FuzzError::ConfigInvalid {
                field: format!("daemons[{i}]"),
                reason: format!("'{daemon}' is not a valid daemon name"),
            });
        }
        if !seen.insert(daemon.as_str()) {
            return Err(FuzzError::ConfigInvalid {
                field: format!("daemons[{i}]"),
                reason: format!("'{daemon}' is listed more than once"),
            });
        }
    }

    if config.cli.trim().is_empty() {
        return Err(FuzzError::ConfigInvalid {
            field: "cli".to_string(),
            reason: "CLI frontend cannot be empty".to_string(),
        });
    }

    if !config
        .working_root
        .to_string_lossy()
        .contains(WORKING_ROOT_MARKER)
    {
        return Err(FuzzError::ConfigInvalid {
            field: "working_root".to_string(),
            reason: format!("Path must contain \"{WORKING_ROOT_MARKER}\""),
        });
    }

    validate_patterns("global_whitelist", &config.global_whitelist)?;
    validate_patterns("global_blacklist", &config.global_blacklist)?;
    for (i, node) in config.nodes.iter().enumerate() {
        validate_patterns(&format!("nodes[{i}].whitelist"), &node.whitelist)?;
        validate_patterns(&format!("nodes[{i}].blacklist"), &node.blacklist)?;
    }

    for key in config.configs.keys() {
        if key != SHARED_TEMPLATE_KEY && !seen.contains(key.as_str()) {
            warn!(template = %key, "Config template does not match any configured daemon");
        }
    }

    if config.nodes.is_empty() {
        warn!("No command hierarchies configured, the corpus will be empty");
    }

    Ok(())
}

fn validate_patterns(field: &str, patterns: &[String]) -> Result<()> {
    for pattern in patterns {
        regex::Regex::new(pattern).map_err(|e| FuzzError::ConfigInvalid {
            field: field.to_string(),
            reason: format!("Invalid regex '{pattern}': {e}"),
        })?;
    }
    Ok(())
}

/// Get the default config path
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vtysh-fuzz")
        .join("config.yaml")
}

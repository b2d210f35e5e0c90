use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FuzzError {
    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid { field: String, reason: String },

    // Setup errors
    #[error("Refusing to use working root {path}: path must contain \"{marker}\"")]
    UnsafeWorkingRoot { path: String, marker: &'static str },

    #[error("Isolation scope error: {reason}")]
    Isolation { reason: String },

    #[error("Bind mount of {path} failed: {reason}")]
    Rebind { path: String, reason: String },

    #[error("Failed to change ownership of {path}: {reason}")]
    Ownership { path: String, reason: String },

    #[error("Failed to write configuration for {daemon} to {}: {source}", .path.display())]
    ConfigWrite {
        daemon: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Runtime errors
    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Failed to start daemon {daemon}: {reason}")]
    DaemonStart { daemon: String, reason: String },

    #[error("Unknown daemon: {daemon}")]
    UnknownDaemon { daemon: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // YAML errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}

pub type Result<T> = std::result::Result<T, FuzzError>;

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod isolation;
pub mod ports;

pub use config::Config;
pub use domain::{Command, FuzzOptions, FuzzSession, Summary};
pub use error::{FuzzError, Result};
pub use isolation::{Environment, WorkingRoot};
pub use ports::IsolatedExecutor;

// Re-exports for fuzzing
#[doc(hidden)]
pub use domain::{CommandFilter, prepare_command};

//! Domain module - Core fuzzing logic
//!
//! Config rendering, daemon supervision, corpus construction, the fuzz loop
//! and the report it feeds. Everything here talks to the isolation scope
//! through the [`IsolatedExecutor`](crate::ports::IsolatedExecutor) port.

pub mod config_gen;
pub mod corpus;
pub mod filter;
pub mod fuzz_loop;
pub mod report;
pub mod session;
pub mod shell;
pub mod supervisor;

pub use config_gen::ConfigGenerator;
pub use corpus::{Command, CorpusBuilder, prepare_command};
pub use filter::{CommandFilter, FilterVerdict};
pub use fuzz_loop::rotate_logs;
pub use report::{Counters, CrashEvent, CrashGroup, CrashRegistry, Report, Summary};
pub use session::{FuzzOptions, FuzzSession};
pub use supervisor::{DaemonState, DaemonSupervisor, PidLookup};

//! Ports module - Trait definitions for hexagonal architecture
//!
//! This module contains the trait definitions (ports) that define
//! the boundary between the fuzzing logic and the isolated environment.

mod executor;

pub use executor::{
    CommandOutput, IsolatedExecutor, PROCESS_TABLE_COMMAND, ProcessEntry, parse_process_table,
};

#[cfg(test)]
pub use executor::mock;

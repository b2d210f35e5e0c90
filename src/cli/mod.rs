//! CLI module for direct command-line usage
//!
//! This module provides the `vtysh-fuzz` command-line interface on top of
//! the library.

mod runner;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Config, IterationLimit};

pub use runner::{run_corpus, run_fuzz, run_status};

/// vtysh-fuzz - Fuzz the vtysh CLI of FRR routing daemons
#[derive(Parser)]
#[command(name = "vtysh-fuzz")]
#[command(about = "Fuzz the vtysh CLI of FRR routing daemons inside Linux namespaces")]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # Run a fuzzing session (default command, requires root)
    sudo vtysh-fuzz --config fuzz.yaml

    # Two shuffled passes with a fixed seed
    sudo vtysh-fuzz --config fuzz.yaml run --iterations 2 --random-order --seed 42

    # Run until interrupted with Ctrl-C
    sudo vtysh-fuzz --config fuzz.yaml run --iterations 0

    # Print the filtered corpus without injecting anything
    sudo vtysh-fuzz --config fuzz.yaml corpus

    # Show the resolved configuration
    vtysh-fuzz --config fuzz.yaml status")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a full fuzzing session - same as running without a command
    Run(Overrides),

    /// Build and print the filtered command corpus without injecting it
    Corpus(Overrides),

    /// Show the resolved configuration
    Status,
}

/// Command-line values taking precedence over the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Passes over the corpus (0 or less runs until interrupted)
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    pub iterations: Option<i64>,

    /// Shuffle the corpus before every pass
    #[arg(short, long)]
    pub random_order: bool,

    /// Seed for the shuffle
    #[arg(long)]
    pub seed: Option<u64>,

    /// Disposable working directory (must contain "vtysh-fuzz")
    #[arg(short, long)]
    pub working_root: Option<PathBuf>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(iterations) = self.iterations {
            config.iterations = IterationLimit::from(iterations);
        }
        if self.random_order {
            config.random_order = true;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(ref root) = self.working_root {
            config.working_root.clone_from(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_no_command() {
        let cli = Cli::try_parse_from(["vtysh-fuzz", "--config", "fuzz.yaml"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("fuzz.yaml")));
    }

    #[test]
    fn test_run_overrides_parse() {
        let cli = Cli::try_parse_from([
            "vtysh-fuzz",
            "run",
            "--iterations",
            "-1",
            "--random-order",
            "--seed",
            "9",
            "--working-root",
            "/tmp/vtysh-fuzz-2",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Some(Commands::Run(overrides)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(overrides.iterations, Some(-1));
        assert!(overrides.random_order);
        assert_eq!(overrides.seed, Some(9));
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        Overrides {
            iterations: Some(0),
            random_order: true,
            seed: Some(3),
            working_root: Some(PathBuf::from("/srv/vtysh-fuzz")),
        }
        .apply(&mut config);

        assert_eq!(config.iterations, IterationLimit::Unbounded);
        assert!(config.random_order);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.working_root, PathBuf::from("/srv/vtysh-fuzz"));
    }

    #[test]
    fn test_empty_overrides_keep_file_values() {
        let mut config = Config {
            iterations: IterationLimit::Bounded(4),
            random_order: true,
            seed: Some(1),
            ..Config::default()
        };
        Overrides::default().apply(&mut config);

        assert_eq!(config.iterations, IterationLimit::Bounded(4));
        assert!(config.random_order);
        assert_eq!(config.seed, Some(1));
    }
}

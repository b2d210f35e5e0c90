use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vtysh_fuzz::cli::{Cli, Commands, Overrides, run_corpus, run_fuzz, run_status};
use vtysh_fuzz::config::{default_config_path, load_config, validate_config};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout carries the run transcript)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Get config path
    let config_path = cli.config.unwrap_or_else(default_config_path);

    info!(config = %config_path.display(), "Loading configuration");

    // Load configuration
    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!(
        daemons = config.daemons.len(),
        hierarchies = config.nodes.len(),
        iterations = %config.iterations,
        "Configuration loaded"
    );

    // Dispatch based on command
    match cli
        .command
        .unwrap_or_else(|| Commands::Run(Overrides::default()))
    {
        Commands::Run(overrides) => {
            overrides.apply(&mut config);
            validate_config(&config).context("Invalid command-line overrides")?;

            let cancel = CancellationToken::new();
            let token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current command");
                    token.cancel();
                }
            });

            run_fuzz(&config, &cancel)
                .await
                .context("Fuzzing session failed")?;
        }
        Commands::Corpus(overrides) => {
            overrides.apply(&mut config);
            validate_config(&config).context("Invalid command-line overrides")?;
            run_corpus(&config)
                .await
                .context("Corpus construction failed")?;
        }
        Commands::Status => {
            run_status(&config, &config_path);
        }
    }

    Ok(())
}

//! CLI runner functions
//!
//! These functions drive a session from environment setup to teardown.
//! Teardown runs even when the session itself failed.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{Command, FuzzOptions, FuzzSession, Summary};
use crate::error::Result;
use crate::isolation::Environment;

/// Full session: setup, daemons, corpus, fuzz loop, summary
///
/// # Errors
///
/// Returns the first setup or session failure.
pub async fn run_fuzz(config: &Config, cancel: &CancellationToken) -> Result<Summary> {
    let env = Environment::setup(config).await?;
    let mut session = FuzzSession::new(
        env.executor(),
        env.root().clone(),
        config,
        FuzzOptions::from_config(config),
    );

    let outcome = fuzz(&mut session, config, cancel).await;
    finish(session, env).await;
    outcome
}

async fn fuzz(
    session: &mut FuzzSession,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<Summary> {
    session.start_daemons().await?;
    let mut corpus = session.build_corpus(config).await?;
    session.run(&mut corpus, cancel).await?;

    let summary = session.summarize();
    print!("\n{}", summary.render());
    let path = session.write_summary().await?;
    info!(path = %path.display(), "Results saved");
    Ok(summary)
}

/// Build and print the corpus without injecting anything
///
/// # Errors
///
/// Returns the first setup failure or an enumeration failure.
pub async fn run_corpus(config: &Config) -> Result<Vec<Command>> {
    let env = Environment::setup(config).await?;
    let mut session = FuzzSession::new(
        env.executor(),
        env.root().clone(),
        config,
        FuzzOptions::from_config(config),
    );

    let outcome = corpus(&mut session, config).await;
    finish(session, env).await;
    outcome
}

async fn corpus(session: &mut FuzzSession, config: &Config) -> Result<Vec<Command>> {
    session.start_daemons().await?;
    let commands = session.build_corpus(config).await?;

    println!("\ncorpus ({} commands):", commands.len());
    for command in &commands {
        println!("  {command}");
    }
    print!("\n{}", session.summarize().render());
    Ok(commands)
}

async fn finish(mut session: FuzzSession, env: Environment) {
    if let Err(e) = session.supervisor_mut().stop_all().await {
        warn!(error = %e, "Failed to stop daemons");
    }
    if let Err(e) = env.teardown().await {
        warn!(error = %e, "Failed to tear down isolation scope");
    }
}

/// Print the resolved configuration
pub fn run_status(config: &Config, config_path: &Path) {
    println!("vtysh-fuzz Status");
    println!("=================\n");

    println!("Configuration: {}", config_path.display());
    println!("Working root: {}", config.working_root.display());
    println!("CLI frontend: {}", config.cli);
    println!("Iterations: {}", config.iterations);
    println!("Random order: {}", config.random_order);
    match config.seed {
        Some(seed) => println!("Seed: {seed}"),
        None => println!("Seed: (random)"),
    }

    println!("\nFRR layout:");
    println!("  sysconfdir: {}", config.frr.sysconfdir.display());
    println!("  localstatedir: {}", config.frr.localstatedir.display());
    println!("  owner: {}:{}", config.frr.user, config.frr.group);

    println!("\nDaemons ({}):", config.daemons.len());
    for daemon in &config.daemons {
        let template = if config.configs.contains_key(daemon) {
            "own template"
        } else {
            "shared template only"
        };
        println!("  - {daemon} ({template})");
    }

    println!("\nHierarchies ({}):", config.nodes.len());
    println!("{:-<60}", "");
    if config.nodes.is_empty() {
        println!("  (no hierarchies configured)");
    }
    for node in &config.nodes {
        println!("\n  {} {}", config.cli, node.hierarchy);
        print_patterns("whitelist", &node.whitelist);
        print_patterns("blacklist", &node.blacklist);
    }

    if !config.global_whitelist.is_empty() || !config.global_blacklist.is_empty() {
        println!("\nGlobal filters:");
        print_patterns("whitelist", &config.global_whitelist);
        print_patterns("blacklist", &config.global_blacklist);
    }

    if !config.substitutions.is_empty() {
        println!("\nSubstitutions:");
        for (from, to) in &config.substitutions {
            println!("  {from} -> {to}");
        }
    }
}

fn print_patterns(label: &str, patterns: &[String]) {
    if patterns.is_empty() {
        return;
    }
    println!("    {label}:");
    for pattern in patterns {
        println!("      - {pattern}");
    }
}

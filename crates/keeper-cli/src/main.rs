//! keeper CLI
//!
//! Converges the local filesystem to the source tree of a keeper
//! repository.

mod cli;
mod commands;
mod error;

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let repo_root = match cli.repo {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    execute_command(cli.command, repo_root, cli.verbose)
}

/// Logs go to stderr so the report on stdout stays clean.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
    tracing::debug!("Verbose mode enabled");
}

fn execute_command(cmd: Commands, repo_root: PathBuf, verbose: bool) -> Result<()> {
    match cmd {
        Commands::Sync { dry_run, json } => commands::run_sync(
            &repo_root,
            commands::SyncArgs {
                dry_run,
                json,
                verbose,
            },
        ),
        Commands::TestTemplate { file } => commands::run_test_template(&repo_root, &file),
    }
}

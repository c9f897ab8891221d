//! Sync command implementation
//!
//! Runs one reconciliation of the repository's source tree against the
//! configured target root and prints the report.

use std::path::Path;

use colored::Colorize;

use keeper_core::{
    ContentRenderer, EntryRecord, HostFacts, KeeperConfig, ReconciliationRun, Removal, ReportSink,
    RunOptions, SyncReport, SystemAccounts,
};
use keeper_fs::KeeperPath;

use crate::error::{CliError, Result};

/// Environment variable that turns any run into a dry run when non-empty.
pub const DRYRUN_ENV: &str = "DRYRUN";

/// Options for [`run_sync`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncArgs {
    pub dry_run: bool,
    pub json: bool,
    pub verbose: bool,
}

/// Whether a dry run was requested by flag, environment or marker file.
pub fn dry_run_requested(repo_root: &Path, flag: bool) -> bool {
    flag || std::env::var_os(DRYRUN_ENV).is_some_and(|v| !v.is_empty())
        || repo_root.join(KeeperPath::DryRunMarker).exists()
}

/// Run the sync command
pub fn run_sync(repo_root: &Path, args: SyncArgs) -> Result<()> {
    let config = KeeperConfig::load(repo_root)?;
    let paths = config.paths(repo_root);
    if !paths.source_root.is_dir() {
        return Err(CliError::user(format!(
            "source tree not found: {}",
            paths.source_root.display()
        )));
    }

    let dry_run = dry_run_requested(repo_root, args.dry_run);
    if dry_run {
        eprintln!(
            "{} dry run, nothing will be changed",
            "=>".yellow().bold()
        );
    }

    let facts_command = config.facts_command(repo_root);
    let renderer = ContentRenderer::new(HostFacts::gather(repo_root, facts_command.as_deref())?);
    let mut console = ConsoleSink {
        verbose: args.verbose,
    };
    let run = ReconciliationRun::new(
        &paths,
        &SystemAccounts,
        &renderer,
        RunOptions { dry_run },
    );

    if args.json {
        let report = run.execute()?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let report = run.with_sink(&mut console).execute()?;
        if args.verbose {
            print_summary(&report);
        }
    }
    Ok(())
}

/// Prints report lines as the run produces them.
struct ConsoleSink {
    verbose: bool,
}

impl ReportSink for ConsoleSink {
    fn entry(&mut self, record: &EntryRecord) {
        if record.changed || self.verbose {
            println!("{record}");
        }
    }

    fn removal(&mut self, removal: &Removal) {
        println!("{removal}");
    }

    fn warning(&mut self, message: &str) {
        eprintln!("{}: {}", "warning".yellow().bold(), message);
    }
}

fn print_summary(report: &SyncReport) {
    let status = if report.has_warnings() {
        "WARN".yellow().bold()
    } else {
        "OK".green().bold()
    };
    eprintln!(
        "{} {} of {} entries changed, {} removed, {} warnings",
        status,
        report.changed().count(),
        report.entries.len(),
        report.removals.len(),
        report.warnings.len()
    );
}

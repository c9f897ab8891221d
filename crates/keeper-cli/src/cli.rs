//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// keeper - Converge the local filesystem to a version-controlled tree
#[derive(Parser, Debug)]
#[command(name = "keeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (debug logs, unchanged entries)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Repository root (defaults to the current directory)
    #[arg(short = 'C', long = "repo", global = true, value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Apply the source tree to the filesystem and remove abandoned entries
    ///
    /// Examples:
    ///   keeper sync                  # Converge the local filesystem
    ///   keeper sync --dry-run        # Only report what would change
    ///   DRYRUN=1 keeper check-files  # Same, via the environment
    #[command(visible_alias = "check-files")]
    Sync {
        /// Report changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a template with this host's facts and print the result
    #[command(visible_alias = "tt")]
    TestTemplate {
        /// Template file to render
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sync_with_flags() {
        let cli = Cli::parse_from(["keeper", "-v", "sync", "--dry-run", "--json"]);
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Commands::Sync {
                dry_run: true,
                json: true
            }
        );
    }

    #[test]
    fn check_files_is_an_alias_of_sync() {
        let cli = Cli::parse_from(["keeper", "check-files"]);
        assert_eq!(
            cli.command,
            Commands::Sync {
                dry_run: false,
                json: false
            }
        );
    }

    #[test]
    fn repo_flag_is_global() {
        let cli = Cli::parse_from(["keeper", "tt", "motd.template", "-C", "/srv/repo"]);
        assert_eq!(cli.repo, Some(PathBuf::from("/srv/repo")));
        assert_eq!(
            cli.command,
            Commands::TestTemplate {
                file: PathBuf::from("motd.template")
            }
        );
    }

    #[test]
    fn command_is_required() {
        assert!(Cli::try_parse_from(["keeper"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

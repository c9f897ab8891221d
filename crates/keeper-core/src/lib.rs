//! Reconciliation engine for keeper
//!
//! Maps a version-controlled source tree (`<repo>/base`) onto the live
//! filesystem and keeps the two converged:
//!
//! - **Resolution**: owner, group and mode per entry from layered override
//!   sidecars, with special bits encoded above the rwx bits
//! - **Comparison**: exact match on mode, ownership and content; templates
//!   never match
//! - **Application**: directories, symlinks and atomically written regular
//!   files, rendered through minijinja for templates
//! - **Manifest**: targets owned by the previous run that are no longer in
//!   the source tree are removed
//!
//! # Architecture
//!
//! ```text
//!                      keeper-cli
//!                          |
//!                     keeper-core
//!                          |
//!                      keeper-fs
//! ```
//!
//! # Example
//!
//! ```no_run
//! use keeper_core::{
//!     ContentRenderer, HostFacts, ReconciliationRun, RunOptions, RunPaths, SystemAccounts,
//! };
//! use std::path::Path;
//!
//! fn example() -> keeper_core::Result<()> {
//!     let repo = Path::new("/srv/keeper");
//!     let paths = RunPaths::new(repo, "/");
//!     let renderer = ContentRenderer::new(HostFacts::gather(repo, None)?);
//!     let report = ReconciliationRun::new(
//!         &paths,
//!         &SystemAccounts,
//!         &renderer,
//!         RunOptions { dry_run: true },
//!     )
//!     .execute()?;
//!     for entry in report.changed() {
//!         println!("{entry}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod apply;
pub mod compare;
pub mod config;
pub mod entry;
pub mod error;
pub mod facts;
pub mod manifest;
pub mod mode;
pub mod params;
pub mod render;
pub mod report;
pub mod run;

pub use accounts::{AccountDb, AccountTable, SystemAccounts};
pub use apply::Applier;
pub use compare::{SyncState, compare};
pub use config::{KeeperConfig, RunPaths};
pub use entry::{EntryKind, SourceEntry};
pub use error::{Error, Result};
pub use facts::HostFacts;
pub use manifest::{Manifest, ManifestTracker, Removal};
pub use mode::{Perms, SpecialBits, mode_string};
pub use params::{MetadataResolver, ParameterOverride, ResolvedEntry};
pub use render::{ContentRenderer, NetIf, TemplateContext};
pub use report::{EntryRecord, ReportSink, SyncReport};
pub use run::{ReconciliationRun, RunOptions};

//! One reconciliation run
//!
//! Streams the source tree through resolve, compare and apply, recording
//! every visited target, then removes abandoned entries and saves the new
//! manifest. Entries are processed one at a time in walk order and handed
//! to an optional [`ReportSink`] as they finish.

use std::path::Path;

use tracing::{debug, info};

use crate::accounts::AccountDb;
use crate::apply::Applier;
use crate::compare::{SyncState, compare};
use crate::config::RunPaths;
use crate::entry::{SourceEntry, walk};
use crate::manifest::{Manifest, ManifestTracker};
use crate::params::MetadataResolver;
use crate::render::ContentRenderer;
use crate::report::{EntryRecord, ReportSink, SyncReport};
use crate::Result;

/// Options for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Decide and report everything, write nothing
    pub dry_run: bool,
}

/// State of a single run. Built once per invocation and consumed by
/// [`execute`](Self::execute).
pub struct ReconciliationRun<'a> {
    paths: &'a RunPaths,
    options: RunOptions,
    resolver: MetadataResolver<'a>,
    applier: Applier<'a>,
    tracker: ManifestTracker,
    report: SyncReport,
    sink: Option<&'a mut dyn ReportSink>,
}

impl<'a> ReconciliationRun<'a> {
    pub fn new(
        paths: &'a RunPaths,
        accounts: &'a dyn AccountDb,
        renderer: &'a ContentRenderer,
        options: RunOptions,
    ) -> Self {
        Self {
            paths,
            options,
            resolver: MetadataResolver::new(accounts),
            applier: Applier::new(renderer, options.dry_run),
            tracker: ManifestTracker::new(),
            report: SyncReport::new(options.dry_run),
            sink: None,
        }
    }

    /// Stream entries, removals and warnings to `sink` while running.
    pub fn with_sink(mut self, sink: &'a mut dyn ReportSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run to completion.
    ///
    /// Per-entry failures end up in [`SyncReport::warnings`]. A fatal error
    /// during the walk returns before stale entries are touched, so the
    /// previous manifest stays in place for the next run. Whatever was done
    /// up to that point has already reached the sink.
    pub fn execute(mut self) -> Result<SyncReport> {
        info!(
            source = %self.paths.source_root.display(),
            target = %self.paths.target_root.display(),
            dry_run = self.options.dry_run,
            "reconciling"
        );

        for source in walk(&self.paths.source_root) {
            let source = source?;
            if let Err(err) = self.visit(&source) {
                if err.is_fatal() {
                    return Err(err);
                }
                debug!(source = %source.display(), "{err}");
                let message = err.to_string();
                if let Some(sink) = self.sink.as_deref_mut() {
                    sink.warning(&message);
                }
                self.report.warnings.push(message);
            }
        }

        let previous = Manifest::load(&self.paths.manifest)?;
        let sink = &mut self.sink;
        let removals = &mut self.report.removals;
        self.tracker
            .reconcile_stale(&previous, self.options.dry_run, |removal| {
                if let Some(sink) = sink.as_deref_mut() {
                    sink.removal(&removal);
                }
                removals.push(removal);
            })?;

        if !self.options.dry_run {
            self.tracker.persist(&self.paths.manifest)?;
        }

        info!(
            entries = self.report.entries.len(),
            changed = self.report.changed().count(),
            removed = self.report.removals.len(),
            warnings = self.report.warnings.len(),
            "run complete"
        );
        Ok(self.report)
    }

    fn visit(&mut self, source: &Path) -> Result<()> {
        let (entry, meta) = SourceEntry::from_path(source, self.paths)?;
        // Resolve first so a malformed override is fatal even when protected.
        let resolved = self.resolver.resolve(entry, &meta)?;
        if self.paths.is_protected(resolved.target()) {
            debug!(target = %resolved.target().display(), "protected, skipping");
            return Ok(());
        }

        self.tracker.record(resolved.target());

        let changed = compare(&resolved) == SyncState::Mismatch;
        if changed {
            self.applier.sync(&resolved)?;
        } else {
            debug!(target = %resolved.target().display(), "in sync");
        }

        let record = EntryRecord::new(&resolved, self.paths, changed);
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.entry(&record);
        }
        self.report.entries.push(record);
        Ok(())
    }
}

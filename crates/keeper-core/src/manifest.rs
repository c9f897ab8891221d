//! Cross-run record of owned target paths
//!
//! Every visited entry's target is recorded during a run. Afterwards the
//! previous run's manifest is diffed against it and whatever is no longer
//! owned is removed from the target filesystem.

use std::collections::{BTreeSet, HashSet};
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use keeper_fs::io;
use serde::Serialize;
use tracing::{debug, info};

use crate::{Error, Result};

/// A set of target paths, one per line on disk.
///
/// Paths are stored as raw bytes, so names that are not valid UTF-8 survive
/// a save and load unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    paths: BTreeSet<PathBuf>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest content. Blank lines are ignored.
    pub fn parse(content: &[u8]) -> Self {
        let paths = content
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.trim_ascii().is_empty())
            .map(|line| PathBuf::from(OsStr::from_bytes(line)))
            .collect();
        Self { paths }
    }

    /// Sorted paths, each terminated by a newline.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for path in &self.paths {
            out.extend_from_slice(path.as_os_str().as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// Load the manifest at `path`. A missing file is an empty manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let content = io::read_optional(path).map_err(Error::Manifest)?;
        Ok(content.map(|c| Self::parse(&c)).unwrap_or_default())
    }

    /// Atomically replace the manifest at `path`, creating its directory.
    pub fn persist(&self, path: &Path) -> Result<()> {
        io::write_atomic(path, &self.to_bytes()).map_err(Error::Manifest)?;
        info!(path = %path.display(), entries = self.len(), "manifest saved");
        Ok(())
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        self.paths.insert(path.into())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in `self` that are not in `other`.
    pub fn difference<'a>(&'a self, other: &'a Manifest) -> impl Iterator<Item = &'a Path> {
        self.paths.difference(&other.paths).map(PathBuf::as_path)
    }
}

/// One stale-entry outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "path", rename_all = "snake_case")]
pub enum Removal {
    File(PathBuf),
    Directory(PathBuf),
    /// Left in place because it still has content
    DirectoryNotEmpty(PathBuf),
}

impl fmt::Display for Removal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, " -f {}", path.display()),
            Self::Directory(path) => write!(f, " -d {}", path.display()),
            Self::DirectoryNotEmpty(path) => write!(
                f,
                " -d {} (directory not empty so not removed)",
                path.display()
            ),
        }
    }
}

/// Accumulates the current run's manifest and removes abandoned entries.
#[derive(Debug, Default)]
pub struct ManifestTracker {
    current: Manifest,
}

impl ManifestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visited target, whether or not it needed changes.
    pub fn record(&mut self, target: &Path) {
        self.current.insert(target);
    }

    pub fn current(&self) -> &Manifest {
        &self.current
    }

    /// Remove targets owned by `previous` but not by this run.
    ///
    /// Files and symlinks go first, then directories deepest-first so an
    /// abandoned subtree empties bottom-up. A directory that still has
    /// content is reported and left alone. With `dry_run` nothing is
    /// removed, but directory emptiness is predicted from the simulated
    /// removals so the outcomes match a real run.
    ///
    /// Each outcome is passed to `emit` as soon as it happens, so removals
    /// done before a failure are still reported.
    ///
    /// # Errors
    ///
    /// Any failure other than a missing path or a non-empty directory is
    /// fatal ([`Error::Removal`]).
    pub fn reconcile_stale(
        &self,
        previous: &Manifest,
        dry_run: bool,
        mut emit: impl FnMut(Removal),
    ) -> Result<()> {
        let mut count = 0usize;
        let mut directories = Vec::new();
        let mut removed: HashSet<&Path> = HashSet::new();

        for path in previous.difference(&self.current) {
            let meta = match fs::symlink_metadata(path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "stale entry already gone");
                    continue;
                }
                Err(source) => return Err(removal_error(path, source)),
            };
            if meta.is_dir() {
                directories.push(path);
                continue;
            }

            if !dry_run {
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(source) => return Err(removal_error(path, source)),
                }
            }
            removed.insert(path);
            count += 1;
            emit(Removal::File(path.to_path_buf()));
        }

        directories.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });

        for dir in directories {
            let outcome = if dry_run {
                would_be_empty(dir, &removed)?
            } else {
                match fs::remove_dir(dir) {
                    Ok(()) => true,
                    Err(e) if e.kind() == ErrorKind::NotFound => true,
                    Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => false,
                    Err(source) => return Err(removal_error(dir, source)),
                }
            };

            count += 1;
            if outcome {
                removed.insert(dir);
                emit(Removal::Directory(dir.to_path_buf()));
            } else {
                emit(Removal::DirectoryNotEmpty(dir.to_path_buf()));
            }
        }

        if count > 0 {
            info!(count, dry_run, "reconciled stale entries");
        }
        Ok(())
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        self.current.persist(path)
    }
}

fn removal_error(path: &Path, source: std::io::Error) -> Error {
    Error::Removal {
        path: path.to_path_buf(),
        source,
    }
}

/// Whether `dir` would be empty once everything in `removed` is gone.
fn would_be_empty(dir: &Path, removed: &HashSet<&Path>) -> Result<bool> {
    let entries = fs::read_dir(dir).map_err(|e| removal_error(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| removal_error(dir, e))?;
        if !removed.contains(entry.path().as_path()) {
            return Ok(false);
        }
    }
    Ok(true)
}

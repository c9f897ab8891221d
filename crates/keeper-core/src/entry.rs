//! Source entries and source tree traversal

use std::ffi::OsStr;
use std::fs::{self, FileType, Metadata};
use std::path::{Path, PathBuf};

use keeper_fs::constants::{is_override_name, strip_template_suffix};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::RunPaths;
use crate::{Error, Result};

/// Kind of filesystem object keeper manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Directory,
    Symlink,
    File,
}

impl EntryKind {
    /// Classify a file type. Sockets, fifos and devices are not managed.
    pub fn from_file_type(file_type: FileType) -> Option<Self> {
        if file_type.is_symlink() {
            Some(Self::Symlink)
        } else if file_type.is_dir() {
            Some(Self::Directory)
        } else if file_type.is_file() {
            Some(Self::File)
        } else {
            None
        }
    }

    /// Name used in conflict messages.
    pub fn conflict_name(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Symlink => "symbolic link",
            Self::File => "regular",
        }
    }
}

/// Human name of whatever occupies a path, for conflict messages.
pub fn describe_file_type(file_type: FileType) -> &'static str {
    use std::os::unix::fs::FileTypeExt;

    match EntryKind::from_file_type(file_type) {
        Some(EntryKind::Directory) => "directory",
        Some(EntryKind::Symlink) => "symbolic link",
        Some(EntryKind::File) => "regular file",
        None if file_type.is_fifo() => "fifo",
        None if file_type.is_socket() => "socket",
        None if file_type.is_block_device() => "block device",
        None if file_type.is_char_device() => "character device",
        None => "unknown",
    }
}

/// One object in the source tree and the target path it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: EntryKind,
    pub is_template: bool,
}

impl SourceEntry {
    /// `lstat` a source path and derive its target path.
    ///
    /// Returns the entry together with the source metadata so the caller
    /// does not stat it twice.
    pub fn from_path(source: &Path, paths: &RunPaths) -> Result<(Self, Metadata)> {
        let meta = fs::symlink_metadata(source).map_err(|e| Error::io(source, e))?;
        let kind = EntryKind::from_file_type(meta.file_type()).ok_or_else(|| {
            Error::UnsupportedKind {
                path: source.to_path_buf(),
            }
        })?;

        let relative = source
            .strip_prefix(&paths.source_root)
            .map_err(|_| Error::OutsideSourceTree {
                path: source.to_path_buf(),
            })?;
        let mut target = paths.target_root.join(relative);

        let template_name = target
            .file_name()
            .and_then(strip_template_suffix)
            .map(OsStr::to_os_string);
        let is_template = template_name.is_some();
        if let Some(name) = template_name {
            target.set_file_name(name);
        }

        let entry = Self {
            source: source.to_path_buf(),
            target,
            kind,
            is_template,
        };
        Ok((entry, meta))
    }

    /// Basename of the target path.
    pub fn target_name(&self) -> &OsStr {
        self.target.file_name().unwrap_or_default()
    }
}

/// Walk the source tree depth-first in file-name order.
///
/// The root itself and every override sidecar (`.#*`) are skipped. The
/// iterator is lazy and single-pass.
pub fn walk(source_root: &Path) -> impl Iterator<Item = Result<PathBuf>> + use<> {
    WalkDir::new(source_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_override_name(entry.file_name()))
        .map(|result| {
            result
                .map(walkdir::DirEntry::into_path)
                .map_err(|source| Error::Traversal {
                    path: source.path().map(Path::to_path_buf).unwrap_or_default(),
                    source,
                })
        })
}

//! Deciding whether a target already matches its source entry

use std::fs;
use std::os::unix::fs::MetadataExt;

use keeper_fs::io::files_equal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::EntryKind;
use crate::params::ResolvedEntry;

/// Outcome of comparing a resolved entry with the target filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Match,
    Mismatch,
}

/// Compare `resolved` against its target path.
///
/// Templates never match. Otherwise mode (type, rwx and special bits),
/// uid and gid must be identical, and then symlinks must point at the same
/// literal target and regular files must hold the same bytes. Any failure
/// to inspect the target counts as a mismatch.
pub fn compare(resolved: &ResolvedEntry) -> SyncState {
    if resolved.is_template() {
        return SyncState::Mismatch;
    }

    let target = resolved.target();
    let Ok(meta) = fs::symlink_metadata(target) else {
        return SyncState::Mismatch;
    };

    if meta.mode() != resolved.mode {
        debug!(
            target = %target.display(),
            found = format_args!("{:o}", meta.mode()),
            expected = format_args!("{:o}", resolved.mode),
            "mode differs"
        );
        return SyncState::Mismatch;
    }
    if meta.uid() != resolved.uid || meta.gid() != resolved.gid {
        debug!(target = %target.display(), uid = meta.uid(), gid = meta.gid(), "owner differs");
        return SyncState::Mismatch;
    }

    let file_type = meta.file_type();
    let same = match resolved.kind() {
        EntryKind::Directory => file_type.is_dir(),
        EntryKind::Symlink => {
            file_type.is_symlink()
                && match (fs::read_link(resolved.source()), fs::read_link(target)) {
                    // Path equality normalizes components; link targets are
                    // compared byte for byte.
                    (Ok(expected), Ok(found)) => expected.as_os_str() == found.as_os_str(),
                    _ => false,
                }
        }
        EntryKind::File => file_type.is_file() && files_equal(resolved.source(), target),
    };

    if same {
        SyncState::Match
    } else {
        SyncState::Mismatch
    }
}

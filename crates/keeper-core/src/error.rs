//! Error types for keeper-core

use std::path::PathBuf;

/// Result type for keeper-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in keeper-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Walking the source tree failed
    #[error("walk error at {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// An override sidecar exists but cannot be parsed
    #[error("params error: {0}")]
    Params(#[source] keeper_fs::Error),

    /// Reading or writing the run manifest failed
    #[error("manifest error: {0}")]
    Manifest(#[source] keeper_fs::Error),

    /// Removing an abandoned entry failed for a reason other than
    /// the directory still having content
    #[error("removing {path}: {source}")]
    Removal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Gathering template facts failed
    #[error("host facts error: {message}")]
    Facts { message: String },

    /// The target exists but is a different kind of object
    #[error("non {expected} destination already exists: {path} ({found})")]
    Conflict {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },

    /// Source entry is neither directory, symlink nor regular file
    #[error("unsupported source entry type at {path}")]
    UnsupportedKind { path: PathBuf },

    /// A source path is not below the source root
    #[error("{path} is outside the source tree")]
    OutsideSourceTree { path: PathBuf },

    /// Template rendering failed
    #[error("template {path}: {message}")]
    Render { path: PathBuf, message: String },

    /// I/O error on a specific path
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error from keeper-fs
    #[error(transparent)]
    Fs(#[from] keeper_fs::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the whole run.
    ///
    /// Everything else is a per-entry failure: it is reported as a warning
    /// and the run moves on to the next entry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Traversal { .. }
                | Self::Params(_)
                | Self::Manifest(_)
                | Self::Removal { .. }
                | Self::Facts { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_names_path_and_existing_kind() {
        let err = Error::Conflict {
            path: PathBuf::from("/etc/motd"),
            expected: "regular",
            found: "directory".into(),
        };
        assert_eq!(
            err.to_string(),
            "non regular destination already exists: /etc/motd (directory)"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn manifest_errors_are_fatal() {
        let err = Error::Manifest(keeper_fs::Error::io(
            "/repo/.keeper/.previous_list",
            std::io::Error::other("denied"),
        ));
        assert!(err.is_fatal());
    }
}

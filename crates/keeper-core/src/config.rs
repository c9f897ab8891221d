//! Repository configuration and per-run paths
//!
//! A repository may carry an optional `keeper.toml` at its root. Every key
//! has a default, so a bare repository with just a `base/` tree works.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use keeper_fs::{ConfigStore, KeeperPath};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level system directories that are never re-owned or chmod-ed just
/// because the source tree mirrors them.
pub const DEFAULT_PROTECTED: &[&str] = &[
    "/base", "/bin", "/boot", "/dev", "/etc", "/home", "/lib", "/proc", "/root", "/sbin", "/sys",
    "/usr", "/var",
];

const DEFAULT_FACTS_COMMAND: &str = "./myenvs";

/// Contents of `keeper.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeeperConfig {
    /// Source tree root, relative to the repository root
    pub base_dir: PathBuf,
    /// Run state directory, relative to the repository root
    pub state_dir: PathBuf,
    /// Filesystem root the source tree is mapped onto
    pub target_root: PathBuf,
    /// Target paths (as seen from `/`) that are never touched
    pub protected: Vec<PathBuf>,
    /// Executable printing custom template variables as JSON
    pub facts_command: Option<PathBuf>,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(KeeperPath::BaseDir.as_str()),
            state_dir: PathBuf::from(KeeperPath::StateDir.as_str()),
            target_root: PathBuf::from("/"),
            protected: DEFAULT_PROTECTED.iter().map(PathBuf::from).collect(),
            facts_command: Some(PathBuf::from(DEFAULT_FACTS_COMMAND)),
        }
    }
}

impl KeeperConfig {
    /// Load `keeper.toml` from the repository root, falling back to
    /// defaults when it does not exist.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = repo_root.join(KeeperPath::ConfigFile);
        if !path.exists() {
            return Ok(Self::default());
        }
        Ok(ConfigStore::new().load(&path)?)
    }

    /// Resolve every configured path against `repo_root`.
    pub fn paths(&self, repo_root: &Path) -> RunPaths {
        let protected = self
            .protected
            .iter()
            .map(|p| reroot(&self.target_root, p))
            .collect();

        RunPaths {
            repo_root: repo_root.to_path_buf(),
            source_root: repo_root.join(&self.base_dir),
            target_root: self.target_root.clone(),
            manifest: repo_root
                .join(&self.state_dir)
                .join(KeeperPath::PreviousList),
            protected,
        }
    }

    /// The facts command resolved against `repo_root`.
    pub fn facts_command(&self, repo_root: &Path) -> Option<PathBuf> {
        self.facts_command.as_ref().map(|cmd| repo_root.join(cmd))
    }
}

/// Paths used by one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub repo_root: PathBuf,
    pub source_root: PathBuf,
    pub target_root: PathBuf,
    pub manifest: PathBuf,
    pub protected: HashSet<PathBuf>,
}

impl RunPaths {
    /// Default layout under `repo_root` with no protected paths.
    pub fn new(repo_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self {
            source_root: repo_root.join(KeeperPath::BaseDir),
            manifest: repo_root
                .join(KeeperPath::StateDir)
                .join(KeeperPath::PreviousList),
            target_root: target_root.into(),
            protected: HashSet::new(),
            repo_root,
        }
    }

    /// Add protected target paths, given as seen from `/`.
    pub fn with_protected<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let rerooted = reroot(&self.target_root, path.as_ref());
            self.protected.insert(rerooted);
        }
        self
    }

    pub fn is_protected(&self, target: &Path) -> bool {
        self.protected.contains(target)
    }

    /// `source` relative to the repository root, for reporting.
    pub fn display_source<'a>(&self, source: &'a Path) -> &'a Path {
        source.strip_prefix(&self.repo_root).unwrap_or(source)
    }
}

/// Map an absolute path onto `target_root`.
fn reroot(target_root: &Path, path: &Path) -> PathBuf {
    target_root.join(path.strip_prefix("/").unwrap_or(path))
}

//! [`TestTree`] builder for reconciliation scenarios.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary keeper repository and a scratch directory standing in for
/// the filesystem root.
///
/// Layout:
///
/// ```text
/// <tmp>/repo/base/...              source tree
/// <tmp>/repo/.keeper/.previous_list
/// <tmp>/root/...                   target root
/// ```
///
/// # Example
///
/// ```rust,no_run
/// use keeper_test_utils::TestTree;
///
/// let tree = TestTree::new();
/// tree.source_dir("etc", 0o755);
/// tree.source_file("etc/motd", "welcome\n", 0o644);
/// tree.assert_target_not_exists("etc/motd");
/// ```
pub struct TestTree {
    temp_dir: TempDir,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Create the repository with an empty source tree and an empty target
    /// root.
    pub fn new() -> Self {
        let tree = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(tree.source_root()).unwrap();
        fs::create_dir_all(tree.target_root()).unwrap();
        tree
    }

    pub fn repo(&self) -> PathBuf {
        self.temp_dir.path().join("repo")
    }

    pub fn source_root(&self) -> PathBuf {
        self.repo().join("base")
    }

    pub fn target_root(&self) -> PathBuf {
        self.temp_dir.path().join("root")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.repo().join(".keeper").join(".previous_list")
    }

    /// Path of `rel` inside the source tree.
    pub fn source(&self, rel: &str) -> PathBuf {
        self.source_root().join(rel)
    }

    /// Path of `rel` inside the target root.
    pub fn target(&self, rel: &str) -> PathBuf {
        self.target_root().join(rel)
    }

    /// Numeric uid owning the fixture, i.e. the current user.
    pub fn uid(&self) -> u32 {
        fs::metadata(self.temp_dir.path()).unwrap().uid()
    }

    /// Numeric gid owning the fixture.
    pub fn gid(&self) -> u32 {
        fs::metadata(self.temp_dir.path()).unwrap().gid()
    }

    /// Create a source directory (and parents) with an exact mode.
    pub fn source_dir(&self, rel: &str, mode: u32) {
        let path = self.source(rel);
        fs::create_dir_all(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    /// Write a source file with an exact mode, creating parents.
    pub fn source_file(&self, rel: &str, content: &str, mode: u32) {
        let path = self.source(rel);
        write(&path, content);
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    /// Create a source symlink pointing at `link`.
    pub fn source_symlink(&self, rel: &str, link: &str) {
        let path = self.source(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        symlink(link, &path).unwrap();
    }

    /// Write an override sidecar, e.g. `("etc", ".#_globparams", "owner: svc")`.
    pub fn sidecar(&self, dir: &str, name: &str, yaml: &str) {
        write(&self.source(dir).join(name), yaml);
    }

    pub fn remove_source(&self, rel: &str) {
        let path = self.source(rel);
        if fs::symlink_metadata(&path).unwrap().is_dir() {
            fs::remove_dir_all(path).unwrap();
        } else {
            fs::remove_file(path).unwrap();
        }
    }

    /// Write a file directly into the target root, creating parents.
    pub fn target_file(&self, rel: &str, content: &str) {
        write(&self.target(rel), content);
    }

    pub fn target_mode(&self, rel: &str) -> u32 {
        fs::symlink_metadata(self.target(rel)).unwrap().mode()
    }

    pub fn read_target(&self, rel: &str) -> String {
        fs::read_to_string(self.target(rel))
            .unwrap_or_else(|_| panic!("Could not read target: {rel}"))
    }

    /// Seed the previous-run manifest with paths inside the target root.
    pub fn previous_manifest(&self, rels: &[&str]) {
        let text: String = rels
            .iter()
            .map(|rel| format!("{}\n", self.target(rel).display()))
            .collect();
        write(&self.manifest_path(), &text);
    }

    /// Manifest lines, with the target root prefix stripped.
    pub fn manifest_entries(&self) -> Vec<String> {
        let content = fs::read(self.manifest_path()).unwrap_or_default();
        let text = String::from_utf8_lossy(&content);
        let prefix = format!("{}/", self.target_root().display());
        text.lines()
            .map(|line| line.strip_prefix(&prefix).unwrap_or(line).to_string())
            .collect()
    }

    /// Assert that `rel` exists in the target root (symlinks not followed).
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_target_exists(&self, rel: &str) {
        let path = self.target(rel);
        assert!(
            fs::symlink_metadata(&path).is_ok(),
            "Expected target to exist: {}",
            path.display()
        );
    }

    /// Assert that `rel` does **not** exist in the target root.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_target_not_exists(&self, rel: &str) {
        let path = self.target(rel);
        assert!(
            fs::symlink_metadata(&path).is_err(),
            "Expected target NOT to exist: {}",
            path.display()
        );
    }
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

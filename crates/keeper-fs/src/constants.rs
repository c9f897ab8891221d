//! Constants and enums for well-known keeper paths.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Prefix shared by every override sidecar. Traversal skips these names.
pub const OVERRIDE_PREFIX: &str = ".#";

/// Suffix marking a source file as a template.
pub const TEMPLATE_SUFFIX: &str = ".template";

/// Well-known names inside a keeper repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperPath {
    /// The `base` directory (source tree root)
    BaseDir,
    /// The `.keeper` directory (run state)
    StateDir,
    /// The `.previous_list` file (manifest of the last completed run)
    PreviousList,
    /// The `keeper.toml` file (optional repository configuration)
    ConfigFile,
    /// The `.dryrun` marker (forces simulation mode when present)
    DryRunMarker,
    /// The `.#_params` file (directory override, lives inside the directory)
    DirParams,
    /// The `.#_globparams` file (override shared by all files of a directory)
    GlobalParams,
}

impl KeeperPath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaseDir => "base",
            Self::StateDir => ".keeper",
            Self::PreviousList => ".previous_list",
            Self::ConfigFile => "keeper.toml",
            Self::DryRunMarker => ".dryrun",
            Self::DirParams => ".#_params",
            Self::GlobalParams => ".#_globparams",
        }
    }
}

impl AsRef<Path> for KeeperPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for KeeperPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for KeeperPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Name of the override file for a single file entry, keyed by the
/// entry's target basename. Works on raw bytes so any file name maps to
/// its own sidecar.
pub fn file_params_name(target_name: &OsStr) -> OsString {
    let mut name = OsString::from(OVERRIDE_PREFIX);
    name.push(target_name);
    name.push("_params");
    name
}

/// True if `name` belongs to an override sidecar rather than a real entry.
pub fn is_override_name(name: &OsStr) -> bool {
    name.as_bytes().starts_with(OVERRIDE_PREFIX.as_bytes())
}

/// Strip the template suffix from a file name.
///
/// Returns `None` if the name is not a template (including the bare
/// `.template` name, which has no stem).
pub fn strip_template_suffix(name: &OsStr) -> Option<&OsStr> {
    name.as_bytes()
        .strip_suffix(TEMPLATE_SUFFIX.as_bytes())
        .filter(|stem| !stem.is_empty())
        .map(OsStr::from_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(name: &str) -> &OsStr {
        OsStr::new(name)
    }

    #[test]
    fn file_params_name_uses_prefix_and_suffix() {
        assert_eq!(file_params_name(os("motd")), ".#motd_params");
    }

    #[test]
    fn file_params_name_keeps_raw_bytes() {
        let name = OsStr::from_bytes(b"caf\xe9.conf");
        assert_eq!(
            file_params_name(name).as_bytes(),
            b".#caf\xe9.conf_params"
        );
    }

    #[test]
    fn override_names_are_detected() {
        assert!(is_override_name(os(".#_params")));
        assert!(is_override_name(os(".#motd_params")));
        assert!(is_override_name(OsStr::from_bytes(b".#\xff_params")));
        assert!(!is_override_name(os(".bashrc")));
        assert!(!is_override_name(os("motd")));
    }

    #[test]
    fn template_suffix_is_stripped() {
        assert_eq!(strip_template_suffix(os("hosts.template")), Some(os("hosts")));
        assert_eq!(strip_template_suffix(os("hosts")), None);
        assert_eq!(strip_template_suffix(os(".template")), None);
        assert_eq!(
            strip_template_suffix(OsStr::from_bytes(b"\xe9t\xe9.template")),
            Some(OsStr::from_bytes(b"\xe9t\xe9"))
        );
    }
}

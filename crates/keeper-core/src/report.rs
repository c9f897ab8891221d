//! Structured result of a reconciliation run

use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use crate::config::RunPaths;
use crate::entry::EntryKind;
use crate::manifest::Removal;
use crate::mode::mode_string;
use crate::params::ResolvedEntry;

/// One visited source entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRecord {
    pub kind: EntryKind,
    pub template: bool,
    #[serde(serialize_with = "serialize_mode")]
    pub mode: u32,
    pub owner: String,
    pub group: String,
    /// Source path relative to the repository root
    pub source: PathBuf,
    pub target: PathBuf,
    /// Whether the target needed (or in a dry run, would need) changes
    pub changed: bool,
}

fn serialize_mode<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&mode_string(*mode))
}

impl EntryRecord {
    pub fn new(resolved: &ResolvedEntry, paths: &RunPaths, changed: bool) -> Self {
        Self {
            kind: resolved.kind(),
            template: resolved.is_template(),
            mode: resolved.mode,
            owner: resolved.owner.clone(),
            group: resolved.group.clone(),
            source: paths.display_source(resolved.source()).to_path_buf(),
            target: resolved.target().to_path_buf(),
            changed,
        }
    }
}

impl fmt::Display for EntryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " {} {} {}:{} {}  ->  {}",
            if self.template { 't' } else { '-' },
            mode_string(self.mode),
            self.owner,
            self.group,
            self.source.display(),
            self.target.display()
        )
    }
}

/// Everything a run did or would do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub entries: Vec<EntryRecord>,
    pub removals: Vec<Removal>,
    /// Per-entry failures; the run carried on past each of them
    pub warnings: Vec<String>,
}

impl SyncReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn changed(&self) -> impl Iterator<Item = &EntryRecord> {
        self.entries.iter().filter(|entry| entry.changed)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Receives report items the moment a run produces them.
///
/// [`SyncReport`] is only returned when a run completes. A sink also sees
/// everything that happened before a fatal error, including changes that
/// were already written.
pub trait ReportSink {
    fn entry(&mut self, _record: &EntryRecord) {}

    fn removal(&mut self, _removal: &Removal) {}

    fn warning(&mut self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::SourceEntry;
    use crate::mode::{MODE_FILE, MODE_SETUID, MODE_SYMLINK};
    use pretty_assertions::assert_eq;

    fn record(source: &str, target: &str, kind: EntryKind, mode: u32, template: bool) -> EntryRecord {
        let paths = RunPaths::new("/srv/repo", "/");
        let resolved = ResolvedEntry {
            entry: SourceEntry {
                source: PathBuf::from(source),
                target: PathBuf::from(target),
                kind,
                is_template: template,
            },
            owner: "svc".into(),
            group: "adm".into(),
            uid: 1000,
            gid: 4,
            mode,
        };
        EntryRecord::new(&resolved, &paths, true)
    }

    #[test]
    fn entry_lines() {
        let lines: Vec<String> = [
            record(
                "/srv/repo/base/usr/bin/tool",
                "/usr/bin/tool",
                EntryKind::File,
                MODE_FILE | MODE_SETUID | 0o755,
                false,
            ),
            record(
                "/srv/repo/base/etc/hosts.template",
                "/etc/hosts",
                EntryKind::File,
                MODE_FILE | 0o644,
                true,
            ),
            record(
                "/srv/repo/base/etc/localtime",
                "/etc/localtime",
                EntryKind::Symlink,
                MODE_SYMLINK | 0o777,
                false,
            ),
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        assert_eq!(
            lines,
            vec![
                " - -rwsr-xr-x svc:adm base/usr/bin/tool  ->  /usr/bin/tool",
                " t -rw-r--r-- svc:adm base/etc/hosts.template  ->  /etc/hosts",
                " - lrwxrwxrwx svc:adm base/etc/localtime  ->  /etc/localtime",
            ]
        );
    }

    #[derive(Default)]
    struct Lines(Vec<String>);

    impl ReportSink for Lines {
        fn removal(&mut self, removal: &Removal) {
            self.0.push(removal.to_string());
        }
    }

    #[test]
    fn sink_methods_default_to_no_ops() {
        let mut sink = Lines::default();
        let record = record(
            "/srv/repo/base/etc/motd",
            "/etc/motd",
            EntryKind::File,
            MODE_FILE | 0o644,
            false,
        );

        sink.entry(&record);
        sink.warning("ignored");
        sink.removal(&Removal::File("/etc/old.conf".into()));

        assert_eq!(sink.0, vec![" -f /etc/old.conf"]);
    }

    #[test]
    fn json_shape() {
        let mut report = SyncReport::new(true);
        report.entries.push(record(
            "/srv/repo/base/etc/motd",
            "/etc/motd",
            EntryKind::File,
            MODE_FILE | 0o644,
            false,
        ));
        report.removals.push(Removal::File("/etc/old.conf".into()));

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["entries"][0]["mode"], "-rw-r--r--");
        assert_eq!(value["entries"][0]["kind"], "file");
        assert_eq!(value["entries"][0]["source"], "base/etc/motd");
        assert_eq!(value["removals"][0]["action"], "file");
        assert_eq!(value["removals"][0]["path"], "/etc/old.conf");
    }
}

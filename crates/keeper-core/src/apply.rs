//! Materializing resolved entries on the target filesystem

use std::fs::{self, File, Permissions};
use std::io::{self, ErrorKind, Write};
use std::os::unix::fs::{PermissionsExt, chown, lchown, symlink};
use std::path::Path;

use keeper_fs::AtomicFile;
use tracing::debug;

use crate::entry::{EntryKind, describe_file_type};
use crate::params::ResolvedEntry;
use crate::render::ContentRenderer;
use crate::{Error, Result};

/// Writes resolved entries to their targets.
///
/// In dry-run mode every read-only step still runs (conflict checks,
/// reading link targets, rendering templates) so failures are reported
/// exactly as a real run would report them, but nothing is written.
pub struct Applier<'a> {
    renderer: &'a ContentRenderer,
    dry_run: bool,
}

impl<'a> Applier<'a> {
    pub fn new(renderer: &'a ContentRenderer, dry_run: bool) -> Self {
        Self { renderer, dry_run }
    }

    /// Make the target of `resolved` match it.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] if the target exists as another kind of object,
    /// otherwise the I/O or render error of the failing step. Regular files
    /// are written through a temporary file that is discarded on failure.
    pub fn sync(&self, resolved: &ResolvedEntry) -> Result<()> {
        debug!(
            target = %resolved.target().display(),
            kind = ?resolved.kind(),
            dry_run = self.dry_run,
            "syncing"
        );
        match resolved.kind() {
            EntryKind::Directory => self.sync_directory(resolved),
            EntryKind::Symlink => self.sync_symlink(resolved),
            EntryKind::File => self.sync_file(resolved),
        }
    }

    fn sync_directory(&self, resolved: &ResolvedEntry) -> Result<()> {
        let target = resolved.target();
        check_existing(target, fs::metadata(target), EntryKind::Directory)?;
        if self.dry_run {
            return Ok(());
        }

        fs::create_dir_all(target).map_err(|e| Error::io(target, e))?;
        chown(target, Some(resolved.uid), Some(resolved.gid)).map_err(|e| Error::io(target, e))?;
        set_mode(target, resolved.mode)
    }

    /// Replacing an existing link is remove-then-create, so the target is
    /// briefly absent.
    fn sync_symlink(&self, resolved: &ResolvedEntry) -> Result<()> {
        let target = resolved.target();
        let existing = check_existing(target, fs::symlink_metadata(target), EntryKind::Symlink)?;
        let link = fs::read_link(resolved.source()).map_err(|e| Error::io(resolved.source(), e))?;
        if self.dry_run {
            return Ok(());
        }

        if existing {
            fs::remove_file(target).map_err(|e| Error::io(target, e))?;
        }
        symlink(&link, target).map_err(|e| Error::io(target, e))?;
        lchown(target, Some(resolved.uid), Some(resolved.gid)).map_err(|e| Error::io(target, e))
    }

    fn sync_file(&self, resolved: &ResolvedEntry) -> Result<()> {
        let target = resolved.target();
        check_existing(target, fs::metadata(target), EntryKind::File)?;

        let content = if resolved.is_template() {
            Content::Rendered(self.renderer.render_file(resolved.source())?)
        } else {
            let source = File::open(resolved.source()).map_err(|e| Error::io(resolved.source(), e))?;
            Content::Copied(source)
        };
        if self.dry_run {
            return Ok(());
        }

        let mut file = AtomicFile::create(target)?;
        let written = match content {
            Content::Rendered(text) => file.write_all(text.as_bytes()),
            Content::Copied(mut source) => io::copy(&mut source, &mut file).map(drop),
        };
        written.map_err(|e| Error::io(file.path(), e))?;

        // Ownership first: chown clears setuid and setgid.
        file.set_owner(resolved.uid, resolved.gid)?;
        file.set_mode(resolved.mode)?;
        file.commit()?;
        Ok(())
    }
}

enum Content {
    Rendered(String),
    Copied(File),
}

/// Fail if `stat` shows something other than `expected` at `target`.
///
/// Returns whether the target exists.
fn check_existing(
    target: &Path,
    stat: io::Result<fs::Metadata>,
    expected: EntryKind,
) -> Result<bool> {
    match stat {
        Ok(meta) if EntryKind::from_file_type(meta.file_type()) == Some(expected) => Ok(true),
        Ok(meta) => Err(Error::Conflict {
            path: target.to_path_buf(),
            expected: expected.conflict_name(),
            found: describe_file_type(meta.file_type()).to_string(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(target, e)),
    }
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, Permissions::from_mode(mode & 0o7777)).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::SourceEntry;
    use crate::mode::{MODE_DIR, MODE_FILE, MODE_SETGID, MODE_SYMLINK};
    use crate::render::TemplateContext;
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::MetadataExt;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        uid: u32,
        gid: u32,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let meta = fs::metadata(dir.path()).unwrap();
        Fixture {
            root: dir.path().to_path_buf(),
            uid: meta.uid(),
            gid: meta.gid(),
            _dir: dir,
        }
    }

    impl Fixture {
        fn resolved(&self, source: &str, target: &str, kind: EntryKind, mode: u32) -> ResolvedEntry {
            ResolvedEntry {
                entry: SourceEntry {
                    source: self.root.join(source),
                    target: self.root.join(target),
                    kind,
                    is_template: source.ends_with(".template"),
                },
                owner: "root".into(),
                group: "root".into(),
                uid: self.uid,
                gid: self.gid,
                mode,
            }
        }
    }

    fn renderer() -> ContentRenderer {
        ContentRenderer::new(TemplateContext {
            hostname: "node1".into(),
            ..TemplateContext::default()
        })
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".keeper"))
            .collect()
    }

    #[test]
    fn creates_directory_with_parents_and_mode() {
        let f = fixture();
        let renderer = renderer();
        let entry = f.resolved("src", "a/b/c", EntryKind::Directory, MODE_DIR | MODE_SETGID | 0o750);

        Applier::new(&renderer, false).sync(&entry).unwrap();

        let meta = fs::symlink_metadata(f.root.join("a/b/c")).unwrap();
        assert_eq!(meta.mode(), MODE_DIR | MODE_SETGID | 0o750);
    }

    #[test]
    fn directory_over_file_conflicts() {
        let f = fixture();
        let renderer = renderer();
        fs::write(f.root.join("etc"), "").unwrap();
        let entry = f.resolved("src", "etc", EntryKind::Directory, MODE_DIR | 0o755);

        let err = Applier::new(&renderer, false).sync(&entry).unwrap_err();
        assert!(
            err.to_string().starts_with("non directory destination already exists"),
            "got: {err}"
        );
    }

    #[test]
    fn copies_file_atomically_with_mode() {
        let f = fixture();
        let renderer = renderer();
        fs::write(f.root.join("motd"), "welcome\n").unwrap();
        fs::create_dir(f.root.join("etc")).unwrap();
        fs::write(f.root.join("etc/motd"), "old content that is longer\n").unwrap();
        let entry = f.resolved("motd", "etc/motd", EntryKind::File, MODE_FILE | 0o600);

        Applier::new(&renderer, false).sync(&entry).unwrap();

        let target = f.root.join("etc/motd");
        assert_eq!(fs::read_to_string(&target).unwrap(), "welcome\n");
        assert_eq!(fs::metadata(&target).unwrap().mode(), MODE_FILE | 0o600);
        assert!(leftovers(&f.root.join("etc")).is_empty());
    }

    #[test]
    fn renders_template_into_target() {
        let f = fixture();
        let renderer = renderer();
        fs::write(f.root.join("hostname.template"), "{{ hostname }}\n").unwrap();
        let entry = f.resolved("hostname.template", "hostname", EntryKind::File, MODE_FILE | 0o644);

        Applier::new(&renderer, false).sync(&entry).unwrap();

        assert_eq!(
            fs::read_to_string(f.root.join("hostname")).unwrap(),
            "node1\n"
        );
    }

    #[test]
    fn failed_render_leaves_target_and_no_temp_file() {
        let f = fixture();
        let renderer = renderer();
        fs::write(f.root.join("bad.template"), "{{ nope }}").unwrap();
        fs::write(f.root.join("bad"), "previous").unwrap();
        let entry = f.resolved("bad.template", "bad", EntryKind::File, MODE_FILE | 0o644);

        let err = Applier::new(&renderer, false).sync(&entry).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
        assert_eq!(fs::read_to_string(f.root.join("bad")).unwrap(), "previous");
        assert!(leftovers(&f.root).is_empty());
    }

    #[test]
    fn file_over_directory_conflicts() {
        let f = fixture();
        let renderer = renderer();
        fs::write(f.root.join("motd"), "x").unwrap();
        fs::create_dir(f.root.join("target")).unwrap();
        let entry = f.resolved("motd", "target", EntryKind::File, MODE_FILE | 0o644);

        let err = Applier::new(&renderer, false).sync(&entry).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "non regular destination already exists: {} (directory)",
                f.root.join("target").display()
            )
        );
    }

    #[test]
    fn replaces_existing_symlink() {
        let f = fixture();
        let renderer = renderer();
        symlink("new-target", f.root.join("src-link")).unwrap();
        symlink("old-target", f.root.join("link")).unwrap();
        let entry = f.resolved("src-link", "link", EntryKind::Symlink, MODE_SYMLINK | 0o777);

        Applier::new(&renderer, false).sync(&entry).unwrap();

        assert_eq!(
            fs::read_link(f.root.join("link")).unwrap(),
            PathBuf::from("new-target")
        );
    }

    #[test]
    fn symlink_over_regular_file_conflicts() {
        let f = fixture();
        let renderer = renderer();
        symlink("somewhere", f.root.join("src-link")).unwrap();
        fs::write(f.root.join("link"), "").unwrap();
        let entry = f.resolved("src-link", "link", EntryKind::Symlink, MODE_SYMLINK | 0o777);

        let err = Applier::new(&renderer, false).sync(&entry).unwrap_err();
        assert!(matches!(err, Error::Conflict { expected: "symbolic link", .. }));
    }

    #[test]
    fn dry_run_checks_but_writes_nothing() {
        let f = fixture();
        let renderer = renderer();
        fs::write(f.root.join("motd"), "x").unwrap();
        fs::write(f.root.join("bad.template"), "{{ nope }}").unwrap();
        let applier = Applier::new(&renderer, true);

        applier
            .sync(&f.resolved("motd", "motd-copy", EntryKind::File, MODE_FILE | 0o644))
            .unwrap();
        applier
            .sync(&f.resolved("src", "newdir", EntryKind::Directory, MODE_DIR | 0o755))
            .unwrap();
        assert!(!f.root.join("motd-copy").exists());
        assert!(!f.root.join("newdir").exists());

        let err = applier
            .sync(&f.resolved("bad.template", "bad", EntryKind::File, MODE_FILE | 0o644))
            .unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }
}

//! Template test command implementation

use std::io::Write;
use std::path::Path;

use keeper_core::{ContentRenderer, HostFacts, KeeperConfig};

use crate::error::Result;

/// Render `file` with this host's facts and print it to stdout.
///
/// Nothing on the filesystem is touched, so templates can be checked
/// before they are committed to the source tree.
pub fn run_test_template(repo_root: &Path, file: &Path) -> Result<()> {
    let config = KeeperConfig::load(repo_root)?;
    let facts_command = config.facts_command(repo_root);
    let renderer = ContentRenderer::new(HostFacts::gather(repo_root, facts_command.as_deref())?);

    let rendered = renderer.render_file(file)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use std::fs;

    #[test]
    fn undefined_variable_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.template");
        fs::write(&file, "{{ missing }}").unwrap();

        let err = run_test_template(dir.path(), &file).unwrap_err();
        assert!(matches!(err, CliError::Core(keeper_core::Error::Render { .. })));
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_test_template(dir.path(), &dir.path().join("nope")).is_err());
    }
}

//! Atomic writes and content comparison
//!
//! Every regular file keeper produces is written to a temporary file in the
//! destination directory and renamed over the final path, so a partially
//! written file is never visible under its real name.

use std::fs::{self, File, Permissions};
use std::io::{self, BufReader, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::{Error, Result};

/// Size of the chunks compared by [`streams_equal`].
pub const COMPARE_CHUNK: usize = 4096;

const READ_BUFFER: usize = 256 * 1024;

const TEMP_PREFIX: &str = ".keeper";

/// A temporary file that replaces `target` when committed.
///
/// The temporary file lives in the same directory as the target so the
/// final rename never crosses a filesystem. Dropping an uncommitted
/// `AtomicFile` deletes the temporary file.
#[derive(Debug)]
pub struct AtomicFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl AtomicFile {
    /// Create a temporary file beside `target`.
    ///
    /// The parent directory must already exist.
    pub fn create(target: &Path) -> Result<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| Error::io(dir, e))?;

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Path of the temporary file.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Set owner and group of the temporary file.
    pub fn set_owner(&self, uid: u32, gid: u32) -> Result<()> {
        std::os::unix::fs::fchown(self.temp.as_file(), Some(uid), Some(gid))
            .map_err(|e| Error::io(self.path(), e))
    }

    /// Set permission bits (including setuid, setgid and sticky) of the
    /// temporary file. File type bits in `mode` are ignored.
    pub fn set_mode(&self, mode: u32) -> Result<()> {
        self.temp
            .as_file()
            .set_permissions(Permissions::from_mode(mode & 0o7777))
            .map_err(|e| Error::io(self.path(), e))
    }

    /// Flush to disk and atomically rename over the target.
    pub fn commit(self) -> Result<()> {
        let Self { temp, target } = self;

        temp.as_file()
            .sync_all()
            .map_err(|e| Error::io(temp.path(), e))?;

        temp.persist(&target)
            .map_err(|e| Error::io(&target, e.error))?;

        debug!(path = %target.display(), "committed atomic write");
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp.flush()
    }
}

/// Write content atomically to a file.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Missing parent directories are created.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut file = AtomicFile::create(path)?;
    file.write_all(content)
        .map_err(|e| Error::io(file.path(), e))?;
    file.commit()
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Read raw bytes, treating a missing file as `None`.
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Read text content, treating a missing file as `None`.
pub fn read_text_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Returns true if both files definitely have the same content.
///
/// Files of different length are never equal. Any error opening or
/// reading either file yields `false`.
pub fn files_equal(left: &Path, right: &Path) -> bool {
    if left == right {
        return true;
    }

    let (Ok(left_file), Ok(right_file)) = (File::open(left), File::open(right)) else {
        return false;
    };
    let (Ok(left_meta), Ok(right_meta)) = (left_file.metadata(), right_file.metadata()) else {
        return false;
    };
    if left_meta.len() != right_meta.len() {
        return false;
    }

    streams_equal(
        BufReader::with_capacity(READ_BUFFER, left_file),
        BufReader::with_capacity(READ_BUFFER, right_file),
    )
}

/// Compare two streams chunk by chunk until both are exhausted.
///
/// Stops at the first differing chunk. A read error counts as a mismatch.
pub fn streams_equal<L: Read, R: Read>(mut left: L, mut right: R) -> bool {
    let mut left_buf = [0u8; COMPARE_CHUNK];
    let mut right_buf = [0u8; COMPARE_CHUNK];

    loop {
        let Ok(left_len) = fill_chunk(&mut left, &mut left_buf) else {
            return false;
        };
        let Ok(right_len) = fill_chunk(&mut right, &mut right_buf) else {
            return false;
        };

        if left_buf[..left_len] != right_buf[..right_len] {
            return false;
        }
        // A short chunk means end of stream; equal slices mean both ended.
        if left_len < COMPARE_CHUNK {
            return true;
        }
    }
}

/// Read until `buf` is full or the stream ends.
fn fill_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device gone"))
        }
    }

    #[test]
    fn short_reads_do_not_cause_false_mismatch() {
        let data = vec![7u8; COMPARE_CHUNK * 3 + 17];
        let left = Trickle { data: &data, step: 1000 };
        let right = Cursor::new(data.clone());
        assert!(streams_equal(left, right));
    }

    #[test]
    fn read_error_is_a_mismatch() {
        assert!(!streams_equal(Broken, Cursor::new(b"abc".to_vec())));
    }

    #[test]
    fn empty_streams_are_equal() {
        assert!(streams_equal(io::empty(), io::empty()));
    }

    #[test]
    fn exact_chunk_multiple_is_equal() {
        let data = vec![1u8; COMPARE_CHUNK * 2];
        assert!(streams_equal(Cursor::new(data.clone()), Cursor::new(data)));
    }

    #[test]
    fn prefix_stream_is_not_equal() {
        let data = vec![1u8; COMPARE_CHUNK * 2];
        let prefix = data[..COMPARE_CHUNK].to_vec();
        assert!(!streams_equal(Cursor::new(data), Cursor::new(prefix)));
    }

    #[test]
    fn dropped_atomic_file_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target.conf");

        let temp_path = {
            let mut file = AtomicFile::create(&target).unwrap();
            file.write_all(b"partial").unwrap();
            file.path().to_path_buf()
        };

        assert!(!temp_path.exists());
        assert!(!target.exists());
    }
}

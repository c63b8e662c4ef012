//! Utility functions for the hashing copier.
//!
//! Directory creation, chunked reads, timestamp preservation and
//! report-friendly path rendering.

use filetime::{FileTime, set_file_times};
use std::fs::{self, Metadata};
use std::io::{self, Read};
use std::path::{Component, Path};

// =============================================================================
// Reading
// =============================================================================

/// Fill `buf` from `reader`, returning the number of bytes read.
///
/// Keeps reading until the buffer is full or EOF, so every chunk except the
/// last one is exactly `buf.len()` bytes. Retries on `Interrupted`.
pub(crate) fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
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

// =============================================================================
// Directory utilities
// =============================================================================

/// Create `dir` and any missing parents.
///
/// Tolerates concurrent creation by another worker: `AlreadyExists` is only
/// an error if the path is not a directory.
pub(crate) fn ensure_dir(dir: &Path) -> io::Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

// =============================================================================
// Metadata and timestamp utilities
// =============================================================================

/// Preserve file timestamps (mtime and atime)
pub(crate) fn preserve_timestamps(src_meta: &Metadata, dst: &Path) -> io::Result<()> {
    let mtime = FileTime::from_last_modification_time(src_meta);
    let atime = FileTime::from_last_access_time(src_meta);
    set_file_times(dst, atime, mtime)
}

// =============================================================================
// Path rendering
// =============================================================================

/// Render a source-relative path with `/` separators on every platform.
pub fn display_relative(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================

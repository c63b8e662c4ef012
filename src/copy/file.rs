//! Chunked, hashing single-file copy.
//!
//! Every byte read from the source is fed to an xxHash64 hasher before it
//! is written, so the returned hash describes exactly what landed on the
//! destination. Data goes to a temp file in the destination directory that
//! is only renamed into place once the whole file is written; on any error
//! or cancellation the temp file is dropped and deleted.

use crate::cancel::CancelToken;
use crate::error::FileError;
use crate::job::mb_per_sec;
use crate::options::OffloadOptions;
use crate::progress::ChunkTick;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use xxhash_rust::xxh64::{Xxh64, xxh64};

use super::utils::{ensure_dir, preserve_timestamps, read_chunk};

/// Seed used for every content hash.
pub const HASH_SEED: u64 = 0;

/// A completed, published copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCopy {
    /// Lower-case hex xxHash64 of the bytes read from the source
    pub hash: String,
    /// Bytes written
    pub bytes: u64,
    /// Time from opening the source to publishing the destination
    pub duration: Duration,
}

impl VerifiedCopy {
    /// Average speed of this copy in MB/s.
    pub fn speed_mbps(&self) -> f64 {
        mb_per_sec(self.bytes, self.duration)
    }
}

/// Render a 64-bit hash as 16 lower-case hex digits.
#[inline]
pub(crate) fn hex(hash: u64) -> String {
    format!("{hash:016x}")
}

/// xxHash64 of an in-memory buffer, in the same format the copier produces.
pub fn hash_bytes(data: &[u8]) -> String {
    hex(xxh64(data, HASH_SEED))
}

/// Stream a file through xxHash64 without copying it.
///
/// # Errors
///
/// Returns the underlying IO error if the file cannot be opened or read.
pub fn hash_file(path: &Path, chunk_size: usize) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut hasher = Xxh64::new(HASH_SEED);
    loop {
        let n = read_chunk(&mut file, &mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex(hasher.digest()))
}

/// Copy `src` to `dst` in chunks, hashing every byte read.
///
/// Missing destination directories are created. An existing file at `dst`
/// is replaced atomically, so a rerun never leaves bytes from an older,
/// longer file behind.
///
/// `on_chunk` is called after every chunk is written; `cancel` is checked
/// right after. A cancelled copy leaves nothing at `dst` and no temp file in
/// its directory.
///
/// # Errors
///
/// - [`FileError::SourceUnreadable`] if the source cannot be opened or read
/// - [`FileError::DestinationUnwritable`] if the destination directory, temp
///   file, write, sync or final rename fails
/// - [`FileError::Cancelled`] if `cancel` trips mid-copy
pub fn copy_file_hashed(
    src: &Path,
    dst: &Path,
    options: &OffloadOptions,
    cancel: &CancelToken,
    on_chunk: &mut dyn FnMut(ChunkTick),
) -> Result<VerifiedCopy, FileError> {
    let started = Instant::now();

    let source_err = |source: io::Error| FileError::SourceUnreadable {
        path: src.to_path_buf(),
        source,
    };
    let dest_err = |source: io::Error| FileError::DestinationUnwritable {
        path: dst.to_path_buf(),
        source,
    };

    // Open first: an unreadable source must not leave anything behind
    let mut src_file = File::open(src).map_err(source_err)?;
    let src_meta = src_file.metadata().map_err(source_err)?;

    let dst_parent = dst
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    ensure_dir(dst_parent).map_err(dest_err)?;

    let mut temp_file = create_temp_in(dst_parent, options).map_err(dest_err)?;

    let mut buf = vec![0u8; options.chunk_size.max(1)];
    let mut hasher = Xxh64::new(HASH_SEED);
    let mut bytes: u64 = 0;
    let mut last_tick = Instant::now();

    loop {
        let n = read_chunk(&mut src_file, &mut buf).map_err(source_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        temp_file
            .as_file_mut()
            .write_all(&buf[..n])
            .map_err(dest_err)?;
        bytes += n as u64;

        let now = Instant::now();
        on_chunk(ChunkTick {
            bytes: n as u64,
            elapsed: now - last_tick,
        });
        last_tick = now;

        if cancel.is_cancelled() {
            // temp_file is deleted on drop
            return Err(FileError::Cancelled {
                path: dst.to_path_buf(),
            });
        }
    }

    // Ensure data is on disk before rename
    if options.fsync {
        temp_file.as_file().sync_all().map_err(dest_err)?;
    }

    if options.preserve_permissions {
        fs::set_permissions(temp_file.path(), src_meta.permissions()).map_err(dest_err)?;
    }

    // persist() replaces any existing file at dst
    temp_file.persist(dst).map_err(|e| dest_err(e.error))?;

    if options.preserve_timestamps {
        if let Err(e) = preserve_timestamps(&src_meta, dst) {
            options.warn(&format!(
                "Failed to preserve timestamps on {}: {}",
                dst.display(),
                e
            ));
        }
    }

    Ok(VerifiedCopy {
        hash: hex(hasher.digest()),
        bytes,
        duration: started.elapsed(),
    })
}

/// Create the temp file that will become the destination.
fn create_temp_in(dir: &Path, options: &OffloadOptions) -> io::Result<tempfile::NamedTempFile> {
    if options.preserve_permissions {
        // Default (0o600); source permissions are applied before publishing
        return tempfile::NamedTempFile::new_in(dir);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // 0o666 so the umask decides, like a plain file create
        tempfile::Builder::new()
            .permissions(fs::Permissions::from_mode(0o666))
            .tempfile_in(dir)
    }
    #[cfg(not(unix))]
    {
        tempfile::NamedTempFile::new_in(dir)
    }
}

// =============================================================================
// Tests
// =============================================================================

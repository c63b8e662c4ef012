//! Error types for offload.
//!
//! Errors are split by scope:
//!
//! | Scope | Type | Effect |
//! |-------|------|--------|
//! | Job | [`Error`] | The request is rejected before anything is copied |
//! | File | [`FileError`] | Recorded against one file; the job continues |
//!
//! Job-level failures that happen *after* a job has started (an unreadable
//! source root, cancellation) are never returned as `Err`. They end the job
//! with [`JobOutcome::Failed`](crate::JobOutcome::Failed) or
//! [`JobOutcome::Cancelled`](crate::JobOutcome::Cancelled) so that a summary
//! and an audit report are always produced.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for offload operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Check if an IO error indicates "no space left on device".
///
/// | Platform | Error Detection |
/// |----------|-----------------|
/// | Unix | `ENOSPC` (errno 28) |
/// | Windows | `ERROR_DISK_FULL` (0x70) |
pub fn is_no_space_error(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::StorageFull {
        return true;
    }

    #[cfg(unix)]
    {
        if let Some(raw_error) = error.raw_os_error() {
            const ENOSPC: i32 = 28;
            return raw_error == ENOSPC;
        }
    }

    #[cfg(windows)]
    {
        if let Some(raw_error) = error.raw_os_error() {
            const ERROR_DISK_FULL: i32 = 112;
            return raw_error == ERROR_DISK_FULL;
        }
    }

    false
}

/// Errors that reject an offload request before it starts.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No source directory was given
    #[error("No source directory given")]
    EmptySource,

    /// No destination directory was given
    #[error("At least one destination is required")]
    NoDestination,

    /// More destinations than the engine supports
    #[error("At most 2 destinations are supported, got {count}")]
    TooManyDestinations {
        /// Number of destinations requested
        count: usize,
    },

    /// A destination is the source directory itself
    #[error("Destination is the source directory: {0}")]
    DestinationIsSource(PathBuf),

    /// A destination lies inside the source tree
    ///
    /// A rerun would enumerate the previous copy and nest it again.
    #[error("Destination is inside the source directory: {0}")]
    DestinationInsideSource(PathBuf),

    /// The same destination was given twice
    #[error("Destination given twice: {0}")]
    DuplicateDestination(PathBuf),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmptySource
            | Self::NoDestination
            | Self::TooManyDestinations { .. }
            | Self::DestinationIsSource(_)
            | Self::DestinationInsideSource(_)
            | Self::DuplicateDestination(_) => ErrorCode::InvalidInput,
        }
    }
}

/// Errors scoped to a single file.
///
/// These never abort a job. They are stored in the file's
/// [`FileRecord`](crate::FileRecord) and rendered into the audit report.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FileError {
    /// The source file could not be opened or read
    #[error("Failed to read source {path}: {source}")]
    SourceUnreadable {
        /// Source file path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The destination file or one of its directories could not be written
    #[error("Failed to write destination {path}: {source}")]
    DestinationUnwritable {
        /// Destination file path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Two destinations produced different hashes for the same source file
    ///
    /// Both copies are left in place so they can be inspected; the file is
    /// never counted as copied.
    #[error(
        "Hash mismatch between destinations: {} in {}, {} in {}",
        first.hash, first.destination.display(), second.hash, second.destination.display()
    )]
    HashMismatch {
        /// Source-relative path of the file
        path: PathBuf,
        /// Hash computed while copying to the first destination
        first: DestinationHash,
        /// Hash computed while copying to the second destination
        second: DestinationHash,
    },

    /// The copy was stopped by the cancellation token
    ///
    /// Any partially written destination data has already been removed.
    #[error("Copy cancelled: {path}")]
    Cancelled {
        /// Destination file path that was being written
        path: PathBuf,
    },
}

impl FileError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SourceUnreadable { .. } => ErrorCode::SourceUnreadable,
            Self::DestinationUnwritable { source, .. } if is_no_space_error(source) => {
                ErrorCode::NoSpace
            }
            Self::DestinationUnwritable { .. } => ErrorCode::DestinationUnwritable,
            Self::HashMismatch { .. } => ErrorCode::HashMismatch,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
        }
    }

    /// Returns true if this error came from the cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// A hash paired with the destination root it was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DestinationHash {
    /// Destination root
    pub destination: PathBuf,
    /// Lower-case hex xxHash64
    pub hash: String,
}

/// Stable error codes for machine-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorCode {
    /// Bad arguments
    InvalidInput,
    /// Source root could not be enumerated
    EnumerationFailed,
    /// Source file could not be read
    SourceUnreadable,
    /// Destination could not be written
    DestinationUnwritable,
    /// Destination ran out of space
    NoSpace,
    /// Destinations disagree on a file's hash
    HashMismatch,
    /// Stopped by the caller
    Cancelled,
    /// Engine bug or unexpected state
    Internal,
}

impl ErrorCode {
    /// The code as a snake_case string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::EnumerationFailed => "enumeration_failed",
            Self::SourceUnreadable => "source_unreadable",
            Self::DestinationUnwritable => "destination_unwritable",
            Self::NoSpace => "no_space",
            Self::HashMismatch => "hash_mismatch",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

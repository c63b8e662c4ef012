//! Job data model.
//!
//! - [`CopyJob`]: what to copy and where (validated request)
//! - [`FileTask`]: one enumerated source file
//! - [`CopyOutcome`]: result of copying one file to one destination
//! - [`FileRecord`]: everything known about one file after all destinations
//! - [`JobSummary`] / [`OffloadResult`]: what the caller gets back

use crate::error::{Error, ErrorCode, FileError, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum number of destination roots per job.
pub const MAX_DESTINATIONS: usize = 2;

const MIB: f64 = 1024.0 * 1024.0;

/// A validated copy request: one source root, one or two destination roots.
///
/// Immutable once created. Destinations keep the order they were given in;
/// that order is the copy order and the order used in the audit report.
#[derive(Debug, Clone)]
pub struct CopyJob {
    source: PathBuf,
    destinations: Vec<PathBuf>,
    created_at: DateTime<Local>,
}

impl CopyJob {
    /// Validate and create a job.
    ///
    /// Empty destination paths are ignored, so a caller with two optional
    /// destination slots can pass both.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptySource`] if `source` is empty
    /// - [`Error::NoDestination`] if no non-empty destination remains
    /// - [`Error::TooManyDestinations`] for more than two destinations
    /// - [`Error::DuplicateDestination`] if a destination repeats
    /// - [`Error::DestinationIsSource`] if a destination equals the source
    /// - [`Error::DestinationInsideSource`] if a destination is nested in the source
    pub fn new<P, I, Q>(source: P, destinations: I) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = Q>,
        Q: AsRef<Path>,
    {
        let source = source.as_ref().to_path_buf();
        if source.as_os_str().is_empty() {
            return Err(Error::EmptySource);
        }

        let destinations: Vec<PathBuf> = destinations
            .into_iter()
            .map(|d| d.as_ref().to_path_buf())
            .filter(|d| !d.as_os_str().is_empty())
            .collect();

        if destinations.is_empty() {
            return Err(Error::NoDestination);
        }
        if destinations.len() > MAX_DESTINATIONS {
            return Err(Error::TooManyDestinations {
                count: destinations.len(),
            });
        }
        for (i, dest) in destinations.iter().enumerate() {
            if *dest == source {
                return Err(Error::DestinationIsSource(dest.clone()));
            }
            // Component-wise, so `/card2` is not inside `/card`
            if dest.starts_with(&source) {
                return Err(Error::DestinationInsideSource(dest.clone()));
            }
            if destinations[..i].contains(dest) {
                return Err(Error::DuplicateDestination(dest.clone()));
            }
        }

        Ok(Self {
            source,
            destinations,
            created_at: Local::now(),
        })
    }

    /// Source root directory.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Destination roots, in copy order.
    pub fn destinations(&self) -> &[PathBuf] {
        &self.destinations
    }

    /// When the job was requested. Also names the audit report.
    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

/// One regular file found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileTask {
    /// Path relative to the source root; reproduced under every destination
    pub relative_path: PathBuf,
    /// Size in bytes at enumeration time
    pub size: u64,
}

impl FileTask {
    /// Absolute source path of this file.
    pub fn source_path(&self, source_root: &Path) -> PathBuf {
        source_root.join(&self.relative_path)
    }

    /// Destination path of this file under `destination_root`.
    pub fn destination_path(&self, destination_root: &Path) -> PathBuf {
        destination_root.join(&self.relative_path)
    }
}

/// Result of one (file, destination) copy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CopyOutcome {
    /// Destination root this copy went to
    pub destination: PathBuf,
    /// Lower-case hex xxHash64 of the bytes read from the source, if the copy succeeded
    pub hash: Option<String>,
    /// Bytes written
    pub bytes: u64,
    /// Time spent on this copy
    pub duration: Duration,
    /// Error message if the copy failed
    pub error: Option<String>,
    /// Error code if the copy failed
    pub error_code: Option<ErrorCode>,
}

impl CopyOutcome {
    pub(crate) fn verified(destination: &Path, hash: String, bytes: u64, duration: Duration) -> Self {
        Self {
            destination: destination.to_path_buf(),
            hash: Some(hash),
            bytes,
            duration,
            error: None,
            error_code: None,
        }
    }

    pub(crate) fn failed(destination: &Path, error: &FileError) -> Self {
        Self {
            destination: destination.to_path_buf(),
            hash: None,
            bytes: 0,
            duration: Duration::ZERO,
            error: Some(error.to_string()),
            error_code: Some(error.code()),
        }
    }

    /// Whether the copy completed and produced a hash.
    pub fn success(&self) -> bool {
        self.error.is_none() && self.hash.is_some()
    }

    /// Average speed of this copy in MB/s.
    pub fn speed_mbps(&self) -> f64 {
        mb_per_sec(self.bytes, self.duration)
    }
}

/// Per-file status as written to the audit report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FileStatus {
    /// Every destination holds a verified copy
    Ok,
    /// At least one destination failed, or the destinations disagree
    Error,
}

impl FileStatus {
    /// Report tag: `[OK]` or `[ERREUR]`.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Error => "[ERREUR]",
        }
    }
}

/// Everything known about one file once all its destinations were attempted.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileRecord {
    /// Path relative to the source root
    pub relative_path: PathBuf,
    /// Source size in bytes
    pub size: u64,
    /// Overall status
    pub status: FileStatus,
    /// Verified hash; `None` if no destination succeeded or the destinations disagree
    pub hash: Option<String>,
    /// Combined error detail, empty on success
    pub error: Option<String>,
    /// Code of the first error
    pub error_code: Option<ErrorCode>,
    /// One entry per destination, in destination order
    pub outcomes: Vec<CopyOutcome>,
    /// When processing of this file finished
    pub completed_at: DateTime<Local>,
}

/// Lifecycle of an offload job.
///
/// `Idle → Enumerating → Copying → Finalizing → {Completed, Cancelled, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JobState {
    /// Created, not started
    Idle,
    /// Listing the source tree
    Enumerating,
    /// Copying files
    Copying,
    /// Writing audit reports
    Finalizing,
    /// All files attempted
    Completed,
    /// Stopped by the cancellation token
    Cancelled,
    /// Source could not be enumerated
    Failed,
}

impl JobState {
    /// Returns true for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "Idle",
            Self::Enumerating => "Enumerating",
            Self::Copying => "Copying",
            Self::Finalizing => "Finalizing",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JobOutcome {
    /// Every file was attempted (some may have failed)
    Completed,
    /// Cancelled before every file was attempted
    Cancelled,
    /// The source tree could not be enumerated
    Failed,
}

impl JobOutcome {
    /// The terminal [`JobState`] for this outcome.
    pub fn state(self) -> JobState {
        match self {
            Self::Completed => JobState::Completed,
            Self::Cancelled => JobState::Cancelled,
            Self::Failed => JobState::Failed,
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state().fmt(f)
    }
}

/// Counts and outcome of a finished job.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct JobSummary {
    /// How the job ended
    pub outcome: JobOutcome,
    /// Files found under the source root
    pub files_total: u64,
    /// Files copied and verified to every destination
    pub files_copied: u64,
    /// Files recorded with an error
    pub errors: u64,
    /// Bytes written across all destinations
    pub bytes_copied: u64,
    /// Wall time from start to the end of copying
    pub duration: Duration,
    /// `bytes_copied / duration` in MB/s
    pub average_speed_mbps: f64,
    /// Job-level failure message (enumeration failure)
    pub fatal_error: Option<String>,
    /// Files that were being copied when the job was cancelled; their partial
    /// destination data was removed
    pub cancelled_files: Vec<PathBuf>,
}

impl JobSummary {
    pub(crate) fn empty(outcome: JobOutcome) -> Self {
        Self {
            outcome,
            files_total: 0,
            files_copied: 0,
            errors: 0,
            bytes_copied: 0,
            duration: Duration::ZERO,
            average_speed_mbps: 0.0,
            fatal_error: None,
            cancelled_files: Vec::new(),
        }
    }

    /// Completed with no file errors.
    pub fn is_clean(&self) -> bool {
        self.outcome == JobOutcome::Completed && self.errors == 0
    }
}

/// A report that could not be written to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReportWriteError {
    /// Report path that failed
    pub path: PathBuf,
    /// Error message
    pub message: String,
}

/// Everything handed back to the caller when a job reaches a terminal state.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OffloadResult {
    /// Counts and outcome
    pub summary: JobSummary,
    /// One record per attempted file, in enumeration order
    pub records: Vec<FileRecord>,
    /// Audit reports that were written
    pub report_paths: Vec<PathBuf>,
    /// Audit reports that could not be written
    pub report_errors: Vec<ReportWriteError>,
}

pub(crate) fn mb_per_sec(bytes: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / MIB / secs
    } else {
        0.0
    }
}

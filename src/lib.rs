//! # offload
//!
//! Verified offload of a directory tree to one or two destinations.
//!
//! ## Core Features
//!
//! - **Streaming integrity hash**: every byte is fed to xxHash64 as it is copied
//! - **Dual destinations**: the source is read once per destination and the
//!   two hashes must agree
//! - **Atomic writes**: each file is written to a temp file and renamed into
//!   place, so a destination file never looks complete while it is short
//! - **Cooperative cancellation**: checked after every chunk; the in-flight
//!   file is discarded
//! - **Smoothed progress**: percentage, MB/s over a sliding window, and ETA
//! - **Audit report**: one line per file, written to every destination root
//!   even after cancellation or failure
//!
//! ## Quick Start with Builder API
//!
//! ```no_run
//! use offload::OffloadBuilder;
//!
//! let result = OffloadBuilder::new("/media/card")
//!     .destination("/mnt/raid")
//!     .destination("/mnt/shuttle")
//!     .run()?;
//!
//! println!(
//!     "{}: {} copied, {} errors",
//!     result.summary.outcome, result.summary.files_copied, result.summary.errors
//! );
//! # Ok::<(), offload::Error>(())
//! ```
//!
//! ## Orchestrator API
//!
//! ```no_run
//! use offload::{CancelToken, CopyJob, Offload, OffloadOptions};
//!
//! let job = CopyJob::new("/media/card", ["/mnt/raid"])?;
//! let cancel = CancelToken::new();
//! let result = Offload::new(job, OffloadOptions::default().with_parallel(2), cancel)
//!     .on_file_done(|r| println!("{} {}", r.status.tag(), r.relative_path.display()))
//!     .run();
//! # Ok::<(), offload::Error>(())
//! ```
//!
//! ## Audit Report
//!
//! Named `Report_YYYYMMDD_HHMMSS.txt` after the job's creation time. Per-file
//! lines read:
//!
//! ```text
//! 14:03:22 - A001/C0001.MP4 | [OK] | 9c1e4b0d2f6a7e35 |
//! 14:03:40 - A001/C0002.MP4 | [ERREUR] | N/A | Failed to write destination ...
//! ```
//!
//! ## Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `progress` | Progress bar support with indicatif |
//! | `tracing` | Structured logging with tracing crate |
//! | `serde` | Serialize options, summaries, records and progress samples |
//! | `full` | Enable all optional features |

#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod cancel;
mod copy;
mod error;
mod job;
mod offload;
mod options;
mod progress;
mod report;

pub use builder::OffloadBuilder;
pub use cancel::CancelToken;
pub use copy::{
    HASH_SEED, SourceTree, VerifiedCopy, copy_file_hashed, display_relative, enumerate_source,
    hash_bytes, hash_file,
};
pub use error::{DestinationHash, Error, ErrorCode, FileError, Result, is_no_space_error};
pub use job::{
    CopyJob, CopyOutcome, FileRecord, FileStatus, FileTask, JobOutcome, JobState, JobSummary,
    MAX_DESTINATIONS, OffloadResult, ReportWriteError,
};
pub use offload::{FileDoneCallback, Offload, StateCallback, run_offload};
pub use options::{DEFAULT_CHUNK_SIZE, DEFAULT_SPEED_WINDOW, OffloadOptions, ProgressScope};
pub use progress::{
    ChunkTick, CopyProgressSample, ETA_UNKNOWN, ProgressAggregator, ProgressCallback,
    SpeedEstimator, format_eta,
};
pub use report::{
    NOT_AVAILABLE, render_record_line, render_report, report_file_name, write_reports,
};

#[cfg(feature = "progress")]
#[cfg_attr(docsrs, doc(cfg(feature = "progress")))]
pub use progress::{create_progress_bar, update_progress_bar};

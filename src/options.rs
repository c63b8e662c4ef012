//! Configuration options for offload jobs.
//!
//! This module provides [`OffloadOptions`] for tuning a job and
//! [`ProgressScope`] for choosing what "100%" means when copying to
//! more than one destination.
//!
//! # Example
//!
//! ```
//! use offload::{OffloadOptions, ProgressScope};
//!
//! let options = OffloadOptions::default()
//!     .with_parallel(4)
//!     .with_chunk_size(8 * 1024 * 1024)
//!     .with_progress_scope(ProgressScope::SourceBytes);
//! ```

/// Default chunk size: 4 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default number of samples kept by the speed estimator.
pub const DEFAULT_SPEED_WINDOW: usize = 30;

/// What the job-wide progress total counts.
///
/// # Default
///
/// The default is [`ProgressScope::AllDestinations`], so 100% means every
/// destination holds a complete copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProgressScope {
    /// Total = sum of source sizes × number of destinations.
    ///
    /// Every byte written to every destination advances progress.
    #[default]
    AllDestinations,
    /// Total = sum of source sizes.
    ///
    /// Only the copy to the first destination advances progress; the second
    /// copy still feeds the speed estimate.
    SourceBytes,
}

/// Options for an offload job.
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `chunk_size` | 4 MiB | Read/hash/write buffer size |
/// | `parallel` | 1 | Files copied concurrently |
/// | `fsync` | `true` | Sync each file before publishing it |
/// | `preserve_timestamps` | `true` | Copy mtime/atime |
/// | `preserve_permissions` | `true` | Copy permission bits |
/// | `progress_scope` | `AllDestinations` | See [`ProgressScope`] |
/// | `report_prefix` | `"Report"` | Audit report file name prefix |
/// | `speed_window` | 30 | Speed samples averaged for the rate |
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct OffloadOptions {
    /// Size of the buffer used for each read/hash/write cycle (default: 4 MiB)
    ///
    /// This is also the cancellation and progress granularity.
    pub chunk_size: usize,

    /// Number of files copied concurrently (default: 1)
    ///
    /// Each file is still hashed and written sequentially; only distinct
    /// files overlap.
    pub parallel: usize,

    /// Whether to sync each file to disk before it becomes visible (default: true)
    pub fsync: bool,

    /// Whether to preserve file timestamps (default: true)
    pub preserve_timestamps: bool,

    /// Whether to preserve file permissions (default: true)
    pub preserve_permissions: bool,

    /// What the progress total counts
    pub progress_scope: ProgressScope,

    /// Audit report file name prefix (default: "Report")
    ///
    /// Reports are named `<prefix>_YYYYMMDD_HHMMSS.txt`.
    pub report_prefix: String,

    /// Number of throughput samples averaged by the speed estimator (default: 30)
    pub speed_window: usize,

    /// Callback for warnings (optional)
    ///
    /// If not set and `tracing` feature is enabled, warnings are logged via tracing.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub warn_handler: Option<fn(&str)>,
}

impl Default for OffloadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel: 1,
            fsync: true,
            preserve_timestamps: true,
            preserve_permissions: true,
            progress_scope: ProgressScope::AllDestinations,
            report_prefix: "Report".to_owned(),
            speed_window: DEFAULT_SPEED_WINDOW,
            warn_handler: None,
        }
    }
}

impl OffloadOptions {
    /// Create options with a warning handler
    #[must_use]
    pub fn with_warn_handler(mut self, handler: fn(&str)) -> Self {
        self.warn_handler = Some(handler);
        self
    }

    /// Set the chunk size in bytes
    ///
    /// Value is clamped to at least 1.
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Set the number of files copied concurrently
    ///
    /// Value is clamped to at least 1 to prevent panics.
    #[must_use]
    pub fn with_parallel(mut self, n: usize) -> Self {
        self.parallel = n.max(1);
        self
    }

    /// Disable fsync for faster (but less durable) copies
    #[must_use]
    pub fn without_fsync(mut self) -> Self {
        self.fsync = false;
        self
    }

    /// Disable timestamp preservation
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.preserve_timestamps = false;
        self
    }

    /// Disable permission preservation
    #[must_use]
    pub fn without_permissions(mut self) -> Self {
        self.preserve_permissions = false;
        self
    }

    /// Set what the progress total counts
    #[must_use]
    pub fn with_progress_scope(mut self, scope: ProgressScope) -> Self {
        self.progress_scope = scope;
        self
    }

    /// Set the audit report file name prefix
    #[must_use]
    pub fn with_report_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.report_prefix = prefix.into();
        self
    }

    /// Set the speed estimator window
    ///
    /// Value is clamped to at least 1.
    #[must_use]
    pub fn with_speed_window(mut self, samples: usize) -> Self {
        self.speed_window = samples.max(1);
        self
    }

    pub(crate) fn warn(&self, msg: &str) {
        if let Some(handler) = self.warn_handler {
            handler(msg);
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!("{}", msg);
        }
    }
}

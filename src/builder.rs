//! Builder API for configuring and running an offload.
//!
//! The builder collects the source, destinations, options and callbacks,
//! validates them once in [`OffloadBuilder::build`] and hands back a ready
//! [`Offload`].
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use offload::OffloadBuilder;
//!
//! let result = OffloadBuilder::new("/media/card")
//!     .destination("/mnt/raid")
//!     .run()?;
//! println!("Verified {} files", result.summary.files_copied);
//! # Ok::<(), offload::Error>(())
//! ```
//!
//! ## Two Destinations With Progress
//!
//! ```no_run
//! use offload::OffloadBuilder;
//!
//! let result = OffloadBuilder::new("/media/card")
//!     .destination("/mnt/raid")
//!     .destination("/mnt/shuttle")
//!     .parallel(2)
//!     .on_progress(|p| eprintln!("{:.0}% {:.1} MB/s", p.percentage, p.speed_mbps))
//!     .run()?;
//!
//! for path in &result.report_paths {
//!     println!("report: {}", path.display());
//! }
//! # Ok::<(), offload::Error>(())
//! ```

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::job::{CopyJob, FileRecord, JobState, OffloadResult};
use crate::offload::{FileDoneCallback, Offload, StateCallback};
use crate::options::{OffloadOptions, ProgressScope};
use crate::progress::{CopyProgressSample, ProgressCallback};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A builder for configuring and running an offload.
#[derive(Clone)]
pub struct OffloadBuilder {
    source: PathBuf,
    destinations: Vec<PathBuf>,
    options: OffloadOptions,
    cancel: CancelToken,
    on_progress: Option<ProgressCallback>,
    on_file_done: Option<FileDoneCallback>,
    on_state: Option<StateCallback>,
}

impl std::fmt::Debug for OffloadBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadBuilder")
            .field("source", &self.source)
            .field("destinations", &self.destinations)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl OffloadBuilder {
    /// Start a builder for the given source root, with default options.
    pub fn new<P: AsRef<Path>>(source: P) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            destinations: Vec::new(),
            options: OffloadOptions::default(),
            cancel: CancelToken::new(),
            on_progress: None,
            on_file_done: None,
            on_state: None,
        }
    }

    /// Add a destination root. Call twice for a dual offload.
    #[must_use]
    pub fn destination<P: AsRef<Path>>(mut self, dest: P) -> Self {
        self.destinations.push(dest.as_ref().to_path_buf());
        self
    }

    /// Replace all options at once.
    #[must_use]
    pub fn options(mut self, options: OffloadOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the number of files copied concurrently.
    ///
    /// Default is 1. Each file is still hashed and written in order.
    #[must_use]
    pub fn parallel(mut self, files: usize) -> Self {
        self.options = self.options.with_parallel(files);
        self
    }

    /// Set the chunk size in bytes (default 4 MiB).
    #[must_use]
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.options = self.options.with_chunk_size(bytes);
        self
    }

    /// Choose what the progress total counts.
    #[must_use]
    pub fn progress_scope(mut self, scope: ProgressScope) -> Self {
        self.options = self.options.with_progress_scope(scope);
        self
    }

    /// Set the audit report name prefix (default `Report`).
    #[must_use]
    pub fn report_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options = self.options.with_report_prefix(prefix);
        self
    }

    /// Disable fsync before publishing each file.
    ///
    /// Faster, but a power loss right after the job can leave files that
    /// were reported as verified without their data on disk.
    #[must_use]
    pub fn no_fsync(mut self) -> Self {
        self.options = self.options.without_fsync();
        self
    }

    /// Don't preserve file timestamps.
    #[must_use]
    pub fn no_timestamps(mut self) -> Self {
        self.options = self.options.without_timestamps();
        self
    }

    /// Don't preserve file permissions.
    #[must_use]
    pub fn no_permissions(mut self) -> Self {
        self.options = self.options.without_permissions();
        self
    }

    /// Set a cancellation token for cooperative cancellation.
    ///
    /// Accepts a [`CancelToken`] or an `Arc<AtomicBool>` shared with, e.g.,
    /// a signal handler.
    ///
    /// ```no_run
    /// use offload::{CancelToken, OffloadBuilder};
    ///
    /// let cancel = CancelToken::new();
    /// let handle = cancel.clone();
    /// // Another thread may call handle.cancel() at any time
    /// let result = OffloadBuilder::new("/media/card")
    ///     .destination("/mnt/raid")
    ///     .cancel_token(cancel)
    ///     .run()?;
    /// # Ok::<(), offload::Error>(())
    /// ```
    #[must_use]
    pub fn cancel_token(mut self, token: impl Into<CancelToken>) -> Self {
        self.cancel = token.into();
        self
    }

    /// Set a handler for warnings.
    #[must_use]
    pub fn on_warning(mut self, handler: fn(&str)) -> Self {
        self.options = self.options.with_warn_handler(handler);
        self
    }

    /// Receive a progress sample after every chunk.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CopyProgressSample) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Receive each file's record as soon as it is done.
    #[must_use]
    pub fn on_file_done<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FileRecord) + Send + Sync + 'static,
    {
        self.on_file_done = Some(Arc::new(callback));
        self
    }

    /// Receive every state transition.
    #[must_use]
    pub fn on_state<F>(mut self, callback: F) -> Self
    where
        F: Fn(JobState) + Send + Sync + 'static,
    {
        self.on_state = Some(Arc::new(callback));
        self
    }

    /// Get the current options.
    pub fn options_ref(&self) -> &OffloadOptions {
        &self.options
    }

    /// Validate the request and return a ready [`Offload`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`](crate::Error) if the source or destinations are
    /// invalid; see [`CopyJob::new`].
    pub fn build(self) -> Result<Offload> {
        let job = CopyJob::new(&self.source, &self.destinations)?;
        Ok(Offload::new(job, self.options, self.cancel).set_callbacks(
            self.on_progress,
            self.on_file_done,
            self.on_state,
        ))
    }

    /// Validate and run to completion.
    ///
    /// # Errors
    ///
    /// Only request validation can fail; see [`build`](Self::build).
    pub fn run(self) -> Result<OffloadResult> {
        Ok(self.build()?.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::job::JobOutcome;
    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn test_builder_basic() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("card");
        let dst = dir.path().join("dst");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.txt"), "hello").unwrap();

        let result = OffloadBuilder::new(&src)
            .destination(&dst)
            .no_fsync()
            .run()
            .unwrap();

        assert!(result.summary.is_clean());
        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_builder_requires_destination() {
        let result = OffloadBuilder::new("/card").build();
        assert!(matches!(result, Err(Error::NoDestination)));
    }

    #[test]
    fn test_builder_rejects_third_destination() {
        let result = OffloadBuilder::new("/card")
            .destination("/a")
            .destination("/b")
            .destination("/c")
            .build();
        assert!(matches!(result, Err(Error::TooManyDestinations { count: 3 })));
    }

    #[test]
    fn test_builder_options_chain() {
        let builder = OffloadBuilder::new("/card")
            .parallel(3)
            .chunk_size(1024)
            .progress_scope(ProgressScope::SourceBytes)
            .report_prefix("Offload")
            .no_timestamps()
            .no_permissions();

        let options = builder.options_ref();
        assert_eq!(options.parallel, 3);
        assert_eq!(options.chunk_size, 1024);
        assert_eq!(options.progress_scope, ProgressScope::SourceBytes);
        assert_eq!(options.report_prefix, "Offload");
        assert!(!options.preserve_timestamps);
        assert!(!options.preserve_permissions);
    }

    #[test]
    fn test_builder_report_prefix_names_report() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();

        let result = OffloadBuilder::new(&src)
            .destination(dir.path().join("dst"))
            .report_prefix("Shoot")
            .run()
            .unwrap();

        let name = result.report_paths[0].file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("Shoot_"));
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn test_builder_shared_flag_cancels() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a"), "a").unwrap();

        let flag = Arc::new(AtomicBool::new(true));
        let result = OffloadBuilder::new(&src)
            .destination(dir.path().join("dst"))
            .cancel_token(flag)
            .run()
            .unwrap();

        assert_eq!(result.summary.outcome, JobOutcome::Cancelled);
    }

    #[test]
    fn test_builder_callbacks() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a"), "abc").unwrap();

        let files = Arc::new(AtomicUsize::new(0));
        let states = Arc::new(Mutex::new(Vec::new()));
        let (f, s) = (files.clone(), states.clone());

        OffloadBuilder::new(&src)
            .destination(dir.path().join("dst"))
            .on_file_done(move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .on_state(move |state| s.lock().unwrap().push(state))
            .run()
            .unwrap();

        assert_eq!(files.load(Ordering::SeqCst), 1);
        assert_eq!(states.lock().unwrap().last(), Some(&JobState::Completed));
    }
}

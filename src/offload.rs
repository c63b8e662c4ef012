//! The offload orchestrator.
//!
//! [`Offload`] drives one job through
//! `Idle → Enumerating → Copying → Finalizing → {Completed, Cancelled, Failed}`:
//!
//! 1. Enumerate the source tree and total its size
//! 2. Copy every file to every destination, hashing as it goes, and compare
//!    the hashes between destinations
//! 3. Render the audit report and write it to every destination root
//!
//! Per-file failures are recorded and the job moves on. Cancellation and an
//! unreadable source end the job early, but a summary is always returned and
//! a report is always attempted.

use crate::cancel::CancelToken;
use crate::copy::{SourceTree, copy_file_hashed, enumerate_source};
use crate::error::{DestinationHash, FileError, Result};
use crate::job::{
    CopyJob, CopyOutcome, FileRecord, FileStatus, FileTask, JobOutcome, JobState, JobSummary,
    OffloadResult, mb_per_sec,
};
use crate::options::{OffloadOptions, ProgressScope};
use crate::progress::{ChunkTick, ProgressAggregator, ProgressCallback};
use crate::report::{render_report, write_reports};
use chrono::Local;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Called once per file after all its destinations were attempted.
pub type FileDoneCallback = Arc<dyn Fn(&FileRecord) + Send + Sync>;

/// Called on every state transition.
pub type StateCallback = Arc<dyn Fn(JobState) + Send + Sync>;

/// One offload job, ready to run.
///
/// # Example
///
/// ```no_run
/// use offload::{CancelToken, CopyJob, Offload, OffloadOptions};
///
/// let job = CopyJob::new("/media/card", ["/mnt/raid", "/mnt/shuttle"])?;
/// let result = Offload::new(job, OffloadOptions::default(), CancelToken::new())
///     .on_progress(|p| eprintln!("{:.1}% ETA {}", p.percentage, p.eta_display()))
///     .run();
///
/// println!("{} copied, {} errors", result.summary.files_copied, result.summary.errors);
/// # Ok::<(), offload::Error>(())
/// ```
pub struct Offload {
    job: CopyJob,
    options: OffloadOptions,
    cancel: CancelToken,
    on_progress: Option<ProgressCallback>,
    on_file_done: Option<FileDoneCallback>,
    on_state: Option<StateCallback>,
}

impl std::fmt::Debug for Offload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Offload")
            .field("job", &self.job)
            .field("options", &self.options)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// How one file ended.
enum FileResult {
    /// Every destination was attempted
    Done(FileRecord),
    /// Cancelled while this file was being copied; partial data removed.
    /// Carries a record when an earlier destination was already attempted.
    Interrupted(PathBuf, Option<FileRecord>),
    /// Cancelled before this file started
    NotStarted,
}

/// Serializes progress from every worker into one aggregator.
struct ProgressHub {
    aggregator: ProgressAggregator,
    last_tick: Instant,
    sequential: bool,
    on_progress: Option<ProgressCallback>,
}

impl ProgressHub {
    fn new(
        total: u64,
        speed_window: usize,
        sequential: bool,
        on_progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            aggregator: ProgressAggregator::new(total, speed_window),
            last_tick: Instant::now(),
            sequential,
            on_progress,
        }
    }

    /// One chunk landed.
    ///
    /// A sequential job times each chunk with the copier's own clock. With
    /// parallel workers the rate is measured between consecutive chunks of
    /// the whole job, so concurrent copies add up.
    fn tick(&mut self, tick: ChunkTick, credit: bool, file: &Path) {
        let now = Instant::now();
        let elapsed = if self.sequential {
            tick.elapsed
        } else {
            now - self.last_tick
        };
        self.aggregator.record_speed(tick.bytes, elapsed);
        self.last_tick = now;
        if credit {
            self.aggregator.advance(tick.bytes);
        }
        self.emit(Some(file));
    }

    /// A (file, destination) copy ended: credit whatever the ticks did not.
    fn settle(&mut self, bytes: u64, file: &Path) {
        self.aggregator.advance(bytes);
        self.emit(Some(file));
    }

    fn emit(&mut self, file: Option<&Path>) {
        if let Some(callback) = &self.on_progress {
            let sample = self.aggregator.sample(file.map(Path::to_path_buf));
            callback(&sample);
        }
    }
}

impl Offload {
    /// Prepare a job. Nothing touches the filesystem until [`run`](Self::run).
    pub fn new(job: CopyJob, options: OffloadOptions, cancel: CancelToken) -> Self {
        Self {
            job,
            options,
            cancel,
            on_progress: None,
            on_file_done: None,
            on_state: None,
        }
    }

    /// Receive a [`CopyProgressSample`](crate::CopyProgressSample) after every chunk.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&crate::CopyProgressSample) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Receive each [`FileRecord`] as soon as the file is done.
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

    pub(crate) fn set_callbacks(
        mut self,
        on_progress: Option<ProgressCallback>,
        on_file_done: Option<FileDoneCallback>,
        on_state: Option<StateCallback>,
    ) -> Self {
        self.on_progress = on_progress;
        self.on_file_done = on_file_done;
        self.on_state = on_state;
        self
    }

    /// The job this offload will run.
    pub fn job(&self) -> &CopyJob {
        &self.job
    }

    /// Run the job to a terminal state.
    ///
    /// Never fails: enumeration failure and cancellation are reported in
    /// [`JobSummary::outcome`], per-file failures in the records.
    pub fn run(self) -> OffloadResult {
        let started = Instant::now();

        #[cfg(feature = "tracing")]
        tracing::info!(
            source = %self.job.source().display(),
            destinations = self.job.destinations().len(),
            "offload started"
        );

        self.transition(JobState::Enumerating);
        let tree = match enumerate_source(self.job.source(), &self.options) {
            Ok(tree) => tree,
            Err(e) => {
                let message = format!(
                    "Failed to enumerate {}: {}",
                    self.job.source().display(),
                    e
                );
                #[cfg(feature = "tracing")]
                tracing::error!(error = %message, "enumeration failed");

                let mut summary = JobSummary::empty(JobOutcome::Failed);
                summary.fatal_error = Some(message);
                summary.duration = started.elapsed();
                self.transition(JobState::Finalizing);
                return self.finish(summary, Vec::new());
            }
        };

        if tree.is_empty() {
            // Nothing to copy is 100% done
            ProgressHub::new(0, self.options.speed_window, true, self.on_progress.clone())
                .emit(None);
            let mut summary = JobSummary::empty(JobOutcome::Completed);
            summary.duration = started.elapsed();
            return self.finish(summary, Vec::new());
        }

        self.transition(JobState::Copying);
        let results = self.copy_all(&tree);

        let mut records = Vec::with_capacity(results.len());
        let mut cancelled_files = Vec::new();
        let mut interrupted = false;
        for result in results {
            match result {
                FileResult::Done(record) => records.push(record),
                FileResult::Interrupted(path, record) => {
                    interrupted = true;
                    records.extend(record);
                    cancelled_files.push(path);
                }
                FileResult::NotStarted => interrupted = true,
            }
        }

        let files_copied = records
            .iter()
            .filter(|r| r.status == FileStatus::Ok)
            .count() as u64;
        let bytes_copied: u64 = records
            .iter()
            .flat_map(|r| r.outcomes.iter())
            .map(|o| o.bytes)
            .sum();
        let duration = started.elapsed();

        let summary = JobSummary {
            outcome: if interrupted {
                JobOutcome::Cancelled
            } else {
                JobOutcome::Completed
            },
            files_total: tree.len() as u64,
            files_copied,
            errors: records.len() as u64 - files_copied,
            bytes_copied,
            duration,
            average_speed_mbps: mb_per_sec(bytes_copied, duration),
            fatal_error: None,
            cancelled_files,
        };

        #[cfg(feature = "tracing")]
        if interrupted {
            tracing::warn!(
                files_done = records.len(),
                files_total = summary.files_total,
                "offload cancelled"
            );
        }

        self.transition(JobState::Finalizing);
        self.finish(summary, records)
    }

    /// Copy every file, sequentially or on a bounded pool.
    fn copy_all(&self, tree: &SourceTree) -> Vec<FileResult> {
        let dest_count = self.job.destinations().len() as u64;
        let total = match self.options.progress_scope {
            ProgressScope::AllDestinations => tree.total_bytes.saturating_mul(dest_count),
            ProgressScope::SourceBytes => tree.total_bytes,
        };
        let hub = Mutex::new(ProgressHub::new(
            total,
            self.options.speed_window,
            self.options.parallel <= 1,
            self.on_progress.clone(),
        ));

        if self.options.parallel <= 1 {
            return tree
                .files
                .iter()
                .map(|task| self.copy_one(task, &hub))
                .collect();
        }

        let do_copy = || -> Vec<FileResult> {
            tree.files
                .par_iter()
                .map(|task| self.copy_one(task, &hub))
                .collect()
        };

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.parallel)
            .build()
        {
            Ok(pool) => pool.install(do_copy),
            Err(e) => {
                self.options.warn(&format!(
                    "Failed to create thread pool ({e}), using global pool"
                ));
                do_copy()
            }
        }
    }

    /// Copy one file to every destination and cross-check the hashes.
    fn copy_one(&self, task: &FileTask, hub: &Mutex<ProgressHub>) -> FileResult {
        if self.cancel.is_cancelled() {
            return FileResult::NotStarted;
        }

        let src = task.source_path(self.job.source());
        let mut outcomes = Vec::with_capacity(self.job.destinations().len());
        let mut errors: Vec<FileError> = Vec::new();

        for (index, dest_root) in self.job.destinations().iter().enumerate() {
            let credit =
                index == 0 || self.options.progress_scope == ProgressScope::AllDestinations;
            let dst = task.destination_path(dest_root);
            let mut credited: u64 = 0;

            let mut on_chunk = |tick: ChunkTick| {
                if credit {
                    credited += tick.bytes;
                }
                lock(hub).tick(tick, credit, &task.relative_path);
            };
            let result =
                copy_file_hashed(&src, &dst, &self.options, &self.cancel, &mut on_chunk);

            match result {
                Ok(copy) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        file = %task.relative_path.display(),
                        destination = %dest_root.display(),
                        hash = %copy.hash,
                        mbps = copy.speed_mbps(),
                        "copied"
                    );
                    outcomes.push(CopyOutcome::verified(
                        dest_root,
                        copy.hash,
                        copy.bytes,
                        copy.duration,
                    ));
                }
                Err(e) if e.is_cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(file = %task.relative_path.display(), "discarded partial copy");
                    // Earlier destinations already have a result worth keeping
                    let record = if outcomes.is_empty() {
                        None
                    } else {
                        outcomes.push(CopyOutcome::failed(dest_root, &e));
                        errors.push(e);
                        let record = build_record(task, outcomes, &errors);
                        self.file_done(&record, hub);
                        Some(record)
                    };
                    return FileResult::Interrupted(task.relative_path.clone(), record);
                }
                Err(e) => {
                    self.options.warn(&format!(
                        "Failed to copy {}: {}",
                        task.relative_path.display(),
                        e
                    ));
                    outcomes.push(CopyOutcome::failed(dest_root, &e));
                    errors.push(e);
                }
            }

            if credit {
                lock(hub).settle(task.size.saturating_sub(credited), &task.relative_path);
            }
        }

        if let Some(mismatch) = check_hashes(task, &outcomes) {
            self.options.warn(&mismatch.to_string());
            errors.push(mismatch);
        }

        let record = build_record(task, outcomes, &errors);
        self.file_done(&record, hub);
        FileResult::Done(record)
    }

    fn file_done(&self, record: &FileRecord, hub: &Mutex<ProgressHub>) {
        if let Some(callback) = &self.on_file_done {
            // Under the hub lock so callers see one file at a time
            let _guard = lock(hub);
            callback(record);
        }
    }

    /// Write the reports and enter the terminal state.
    fn finish(&self, summary: JobSummary, records: Vec<FileRecord>) -> OffloadResult {
        let text = render_report(&self.job, &records, &summary);
        let (report_paths, report_errors) =
            write_reports(&self.job, &self.options.report_prefix, &text);

        for failure in &report_errors {
            self.options.warn(&format!(
                "Failed to write report {}: {}",
                failure.path.display(),
                failure.message
            ));
        }
        #[cfg(feature = "tracing")]
        for path in &report_paths {
            tracing::info!(report = %path.display(), "report written");
        }

        self.transition(summary.outcome.state());

        #[cfg(feature = "tracing")]
        tracing::info!(
            outcome = %summary.outcome,
            copied = summary.files_copied,
            errors = summary.errors,
            mbps = summary.average_speed_mbps,
            "offload finished"
        );

        OffloadResult {
            summary,
            records,
            report_paths,
            report_errors,
        }
    }

    fn transition(&self, state: JobState) {
        #[cfg(feature = "tracing")]
        tracing::debug!(state = %state, "state");
        if let Some(callback) = &self.on_state {
            callback(state);
        }
    }
}

/// Run an offload with a progress callback and no other hooks.
///
/// # Errors
///
/// Returns an [`Error`](crate::Error) if the request is invalid (see
/// [`CopyJob::new`]). Everything after validation is reported in the result.
pub fn run_offload<P, I, Q>(
    source: P,
    destinations: I,
    options: OffloadOptions,
    cancel: CancelToken,
    on_progress: Option<ProgressCallback>,
) -> Result<OffloadResult>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Q>,
    Q: AsRef<Path>,
{
    let job = CopyJob::new(source, destinations)?;
    Ok(Offload::new(job, options, cancel)
        .set_callbacks(on_progress, None, None)
        .run())
}

fn lock(hub: &Mutex<ProgressHub>) -> std::sync::MutexGuard<'_, ProgressHub> {
    // A panicking callback must not stop the remaining workers
    hub.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Two successful copies must carry the same hash.
fn check_hashes(task: &FileTask, outcomes: &[CopyOutcome]) -> Option<FileError> {
    let mut verified = outcomes
        .iter()
        .filter_map(|o| o.hash.as_ref().map(|h| (o, h)));
    let (first, first_hash) = verified.next()?;
    verified
        .find(|(_, hash)| *hash != first_hash)
        .map(|(second, second_hash)| FileError::HashMismatch {
            path: task.relative_path.clone(),
            first: DestinationHash {
                destination: first.destination.clone(),
                hash: first_hash.clone(),
            },
            second: DestinationHash {
                destination: second.destination.clone(),
                hash: second_hash.clone(),
            },
        })
}

fn build_record(task: &FileTask, outcomes: Vec<CopyOutcome>, errors: &[FileError]) -> FileRecord {
    let mismatch = errors
        .iter()
        .any(|e| matches!(e, FileError::HashMismatch { .. }));
    let hash = if mismatch {
        None
    } else {
        outcomes.iter().find_map(|o| o.hash.clone())
    };

    let (status, error, error_code) = if errors.is_empty() {
        (FileStatus::Ok, None, None)
    } else {
        let detail = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        (FileStatus::Error, Some(detail), errors.first().map(FileError::code))
    };

    FileRecord {
        relative_path: task.relative_path.clone(),
        size: task.size,
        status,
        hash,
        error,
        error_code,
        outcomes,
        completed_at: Local::now(),
    }
}

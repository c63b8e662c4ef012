//! Throughput smoothing and job-wide progress.
//!
//! The copier reports a [`ChunkTick`] after every chunk. The orchestrator
//! feeds those ticks into a [`ProgressAggregator`], which owns a
//! [`SpeedEstimator`] and produces a [`CopyProgressSample`] for the caller.
//!
//! A terminal progress bar built on `indicatif` is available with the
//! `progress` feature.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::options::DEFAULT_SPEED_WINDOW;

const MIB: f64 = 1024.0 * 1024.0;

/// Sentinel shown when no remaining-time estimate is available.
pub const ETA_UNKNOWN: &str = "--:--";

/// Callback for progress updates
///
/// Called once per chunk, and once more when a file finishes on a
/// destination. Calls are serialized even when files are copied in parallel.
pub type ProgressCallback = Arc<dyn Fn(&CopyProgressSample) + Send + Sync>;

/// One completed chunk, as reported by the copier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTick {
    /// Bytes written by this chunk
    pub bytes: u64,
    /// Time since the previous chunk of the same file (or since the file was opened)
    pub elapsed: Duration,
}

/// Snapshot of job-wide progress pushed to the caller.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CopyProgressSample {
    /// Percent complete, 0 to 100, never decreasing within a job
    pub percentage: f64,
    /// Smoothed transfer rate in MB/s
    pub speed_mbps: f64,
    /// Bytes credited towards the total so far
    pub bytes_transferred: u64,
    /// Bytes the job will move in total
    pub total_bytes: u64,
    /// Estimated remaining time; `None` while the rate is unknown
    pub eta: Option<Duration>,
    /// Source-relative path of the file that produced this sample
    pub current_file: Option<PathBuf>,
}

impl CopyProgressSample {
    /// Remaining time formatted by [`format_eta`].
    pub fn eta_display(&self) -> String {
        format_eta(self.eta)
    }
}

/// Format a remaining-time estimate.
///
/// `mm:ss` below one hour, `hh:mm:ss` from one hour on, and
/// [`ETA_UNKNOWN`] when there is no estimate.
///
/// ```
/// use offload::format_eta;
/// use std::time::Duration;
///
/// assert_eq!(format_eta(Some(Duration::from_secs(75))), "01:15");
/// assert_eq!(format_eta(Some(Duration::from_secs(3600))), "01:00:00");
/// assert_eq!(format_eta(None), "--:--");
/// ```
pub fn format_eta(eta: Option<Duration>) -> String {
    let Some(eta) = eta else {
        return ETA_UNKNOWN.to_owned();
    };
    let secs = eta.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Sliding-window average of per-chunk throughput.
///
/// Each sample is the instantaneous rate `bytes / elapsed` in MB/s. The
/// smoothed rate is the arithmetic mean of the last `capacity` samples, so
/// once the window is full it always lies between the smallest and the
/// largest sample it holds.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_WINDOW)
    }
}

impl SpeedEstimator {
    /// Create an estimator averaging over `capacity` samples (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one chunk. Samples with zero elapsed time carry no rate and are ignored.
    pub fn record(&mut self, bytes: u64, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(bytes as f64 / MIB / secs);
    }

    /// Smoothed rate in MB/s; 0 when no sample has been recorded.
    pub fn mbps(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Number of samples currently in the window.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if no sample has been recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Window size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Turns byte counts into percentage and remaining time for one job.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    total: u64,
    moved: u64,
    last_percentage: f64,
    speed: SpeedEstimator,
}

impl ProgressAggregator {
    /// Create an aggregator for a job moving `total` bytes.
    pub fn new(total: u64, speed_window: usize) -> Self {
        Self {
            total,
            moved: 0,
            last_percentage: 0.0,
            speed: SpeedEstimator::new(speed_window),
        }
    }

    /// Credit `bytes` towards the total. Never exceeds the total.
    pub fn advance(&mut self, bytes: u64) {
        self.moved = self.moved.saturating_add(bytes).min(self.total);
    }

    /// Feed one throughput sample to the speed estimator.
    pub fn record_speed(&mut self, bytes: u64, elapsed: Duration) {
        self.speed.record(bytes, elapsed);
    }

    /// Bytes credited so far.
    pub fn moved(&self) -> u64 {
        self.moved
    }

    /// Total bytes for the job.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Smoothed rate in MB/s.
    pub fn speed_mbps(&self) -> f64 {
        self.speed.mbps()
    }

    /// Percent complete, clamped to [0, 100]. An empty job is 100% complete.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.moved as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Remaining time at the current smoothed rate, or `None` if the rate is zero.
    pub fn eta(&self) -> Option<Duration> {
        let remaining = self.total - self.moved;
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        let rate = self.speed.mbps() * MIB;
        if rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(remaining as f64 / rate).ok()
    }

    /// Build a sample. The reported percentage never goes backwards.
    pub fn sample(&mut self, current_file: Option<PathBuf>) -> CopyProgressSample {
        let percentage = self.percentage().max(self.last_percentage);
        self.last_percentage = percentage;
        CopyProgressSample {
            percentage,
            speed_mbps: self.speed.mbps(),
            bytes_transferred: self.moved,
            total_bytes: self.total,
            eta: self.eta(),
            current_file,
        }
    }
}

#[cfg(feature = "progress")]
pub use bar::{create_progress_bar, update_progress_bar};

#[cfg(feature = "progress")]
mod bar {
    use super::CopyProgressSample;
    use indicatif::{ProgressBar, ProgressStyle};

    /// Create a progress bar for an offload moving `total_bytes`.
    #[must_use]
    pub fn create_progress_bar(total_bytes: u64) -> ProgressBar {
        let pb = ProgressBar::new(total_bytes);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb
    }

    /// Move the bar to `sample` and show the smoothed rate and ETA.
    pub fn update_progress_bar(pb: &ProgressBar, sample: &CopyProgressSample) {
        pb.set_length(sample.total_bytes);
        pb.set_position(sample.bytes_transferred);
        pb.set_message(format!(
            "{:.1} MB/s ETA {}",
            sample.speed_mbps,
            sample.eta_display()
        ));
    }
}

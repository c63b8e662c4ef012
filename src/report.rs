//! Audit report rendering and writing.
//!
//! The report is plain text, one line per file:
//!
//! ```text
//! <HH:MM:SS> - <relative/path> | <[OK]|[ERREUR]> | <hash or N/A> | <error detail>
//! ```
//!
//! [`render_report`] is a pure function of the job, the per-file records and
//! the summary. [`write_reports`] puts the same text in every destination
//! root under a name built by [`report_file_name`].

use crate::copy::display_relative;
use crate::job::{CopyJob, FileRecord, JobOutcome, JobSummary, MAX_DESTINATIONS, ReportWriteError};
use crate::progress::format_eta;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::copy::ensure_dir;

const RULE: &str = "==========================================";
const THIN_RULE: &str = "------------------------------------------";

/// Placeholder for a missing hash or destination.
pub const NOT_AVAILABLE: &str = "N/A";

/// Report file name: `<prefix>_YYYYMMDD_HHMMSS.txt`.
///
/// ```
/// use chrono::{Local, TimeZone};
/// use offload::report_file_name;
///
/// let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
/// assert_eq!(report_file_name("Report", at), "Report_20240309_070501.txt");
/// ```
pub fn report_file_name(prefix: &str, created_at: DateTime<Local>) -> String {
    format!("{}_{}.txt", prefix, created_at.format("%Y%m%d_%H%M%S"))
}

/// Render one per-file report line (without the trailing newline).
pub fn render_record_line(record: &FileRecord) -> String {
    format!(
        "{} - {} | {} | {} | {}",
        record.completed_at.format("%H:%M:%S"),
        display_relative(&record.relative_path),
        record.status.tag(),
        record.hash.as_deref().unwrap_or(NOT_AVAILABLE),
        single_line(record.error.as_deref().unwrap_or("")),
    )
}

/// Render the full report text.
pub fn render_report(job: &CopyJob, records: &[FileRecord], summary: &JobSummary) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "OFFLOAD REPORT - {}",
        job.created_at().format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Source       : {}", job.source().display());
    for i in 0..MAX_DESTINATIONS {
        match job.destinations().get(i) {
            Some(dest) => {
                let _ = writeln!(out, "Destination {}: {}", i + 1, dest.display());
            }
            None => {
                let _ = writeln!(out, "Destination {}: {NOT_AVAILABLE}", i + 1);
            }
        }
    }
    let _ = writeln!(out, "{THIN_RULE}");
    let _ = writeln!(out, "FILES (xxHash64):");

    for record in records {
        let _ = writeln!(out, "{}", render_record_line(record));
    }

    if summary.outcome == JobOutcome::Cancelled {
        let _ = writeln!(out, "CANCELLED BY USER");
        for path in &summary.cancelled_files {
            let _ = writeln!(out, "Discarded (incomplete): {}", display_relative(path));
        }
    }
    if let Some(fatal) = &summary.fatal_error {
        let _ = writeln!(out, "FATAL ERROR: {}", single_line(fatal));
    }

    let _ = writeln!(out, "{THIN_RULE}");
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "Outcome      : {}", summary.outcome);
    let _ = writeln!(
        out,
        "Files        : {} / {} copied, {} errors",
        summary.files_copied, summary.files_total, summary.errors
    );
    let _ = writeln!(out, "Bytes copied : {}", summary.bytes_copied);
    let _ = writeln!(out, "Average speed: {:.2} MB/s", summary.average_speed_mbps);
    let _ = writeln!(out, "Duration     : {}", format_eta(Some(summary.duration)));
    let _ = writeln!(out, "{RULE}");

    out
}

/// Write `text` to every destination root of `job`.
///
/// Each report is written to a temp file and renamed into place, replacing
/// any report of the same name. A destination that cannot take the report
/// does not stop the others.
pub fn write_reports(
    job: &CopyJob,
    prefix: &str,
    text: &str,
) -> (Vec<PathBuf>, Vec<ReportWriteError>) {
    let name = report_file_name(prefix, job.created_at());
    let mut written = Vec::new();
    let mut failed = Vec::new();

    for dest in job.destinations() {
        let path = dest.join(&name);
        match write_report_file(dest, &path, text) {
            Ok(()) => written.push(path),
            Err(e) => failed.push(ReportWriteError {
                path,
                message: e.to_string(),
            }),
        }
    }

    (written, failed)
}

fn write_report_file(dir: &Path, path: &Path, text: &str) -> io::Result<()> {
    ensure_dir(dir)?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(text.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Keep a value on one report line.
fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

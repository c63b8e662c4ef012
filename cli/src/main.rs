//! offload - Verified Offload
//!
//! Copy a camera card or folder to one or two destinations, hashing every
//! byte with xxHash64 and leaving an audit report in each destination.

use clap::{ArgAction, Parser, ValueEnum};
use indicatif::ProgressBar;
use offload::{
    CancelToken, Error as OffloadError, ErrorCode, FileStatus, JobOutcome, OffloadBuilder,
    OffloadResult, ProgressScope, create_progress_bar, render_record_line, update_progress_bar,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// offload - Verified copy to one or two destinations
///
/// Every file is hashed while it is copied. With two destinations the
/// hashes must agree. A report named <PREFIX>_YYYYMMDD_HHMMSS.txt is written
/// to each destination, even when the offload is cancelled.
///
/// Usage:
///   offload SOURCE DEST
///   offload SOURCE DEST DEST2
#[derive(Parser, Debug)]
#[command(name = "offload", version, about, long_about = None)]
struct Args {
    /// Source directory (card, drive or folder)
    source: PathBuf,

    /// Destination directory
    dest: PathBuf,

    /// Second destination directory
    dest2: Option<PathBuf>,

    /// Number of files copied concurrently
    #[arg(short = 'j', long, default_value = "1")]
    jobs: usize,

    /// Chunk size in MiB
    #[arg(long, value_name = "MIB", default_value = "4",
          value_parser = clap::value_parser!(u64).range(1..=1024))]
    chunk_size: u64,

    /// Profile-driven defaults
    #[arg(long, value_enum, default_value = "modern")]
    profile: ProfileName,

    /// What 100% means with two destinations
    #[arg(long, value_enum, default_value = "all")]
    progress_scope: ScopeArg,

    /// Report file name prefix
    #[arg(long, value_name = "NAME", default_value = "Report")]
    report_prefix: String,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    output: OutputMode,

    /// Disable progress bar
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Do not preserve file timestamps
    #[arg(long)]
    no_times: bool,

    /// Do not preserve file permissions
    #[arg(long)]
    no_perms: bool,

    /// Do not call fsync after each file (faster but less safe)
    #[arg(long)]
    no_sync: bool,

    /// Verbose output (-v per-file lines, -vv debug logs)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileName {
    Modern,
    Safe,
    Fast,
}

impl ProfileName {
    fn as_str(self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Safe => "safe",
            Self::Fast => "fast",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    /// Count every byte written to every destination
    All,
    /// Count source bytes once
    Source,
}

impl From<ScopeArg> for ProgressScope {
    fn from(s: ScopeArg) -> Self {
        match s {
            ScopeArg::All => ProgressScope::AllDestinations,
            ScopeArg::Source => ProgressScope::SourceBytes,
        }
    }
}

impl ScopeArg {
    fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Source => "source",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ProfileDefaults {
    preserve_timestamps: bool,
    preserve_permissions: bool,
    fsync: bool,
    verbose: u8,
}

fn profile_defaults(profile: ProfileName) -> ProfileDefaults {
    match profile {
        ProfileName::Modern => ProfileDefaults {
            preserve_timestamps: true,
            preserve_permissions: true,
            fsync: true,
            verbose: 0,
        },
        ProfileName::Safe => ProfileDefaults {
            preserve_timestamps: true,
            preserve_permissions: true,
            fsync: true,
            verbose: 1,
        },
        ProfileName::Fast => ProfileDefaults {
            preserve_timestamps: false,
            preserve_permissions: false,
            fsync: false,
            verbose: 0,
        },
    }
}

type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
enum CliError {
    #[error("{source}")]
    Request { source: OffloadError },

    #[error("Failed to serialize JSON output: {source}")]
    JsonSerialize { source: serde_json::Error },
}

impl CliError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Request { source } => source.code(),
            Self::JsonSerialize { .. } => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone)]
struct EffectiveConfig {
    profile: ProfileName,
    jobs: usize,
    chunk_size_mib: u64,
    progress_scope: ScopeArg,
    preserve_timestamps: bool,
    preserve_permissions: bool,
    fsync: bool,
    output_mode: OutputMode,
    verbose: u8,
}

impl EffectiveConfig {
    fn to_json_value(&self) -> Value {
        json!({
            "profile": self.profile.as_str(),
            "jobs": self.jobs,
            "chunk_size_mib": self.chunk_size_mib,
            "progress_scope": self.progress_scope.as_str(),
            "preserve_timestamps": self.preserve_timestamps,
            "preserve_permissions": self.preserve_permissions,
            "fsync": self.fsync,
            "output_mode": self.output_mode.as_str(),
        })
    }

    fn print_human_stderr(&self) {
        eprintln!("Effective configuration:");
        eprintln!("  profile: {}", self.profile.as_str());
        eprintln!("  jobs: {}", self.jobs);
        eprintln!("  chunk_size: {} MiB", self.chunk_size_mib);
        eprintln!("  progress_scope: {}", self.progress_scope.as_str());
        eprintln!("  preserve_timestamps: {}", self.preserve_timestamps);
        eprintln!("  preserve_permissions: {}", self.preserve_permissions);
        eprintln!("  fsync: {}", self.fsync);
        eprintln!("  output_mode: {}", self.output_mode.as_str());
    }
}

fn exit_code_for(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::InvalidInput => 2,
        _ => 1,
    }
}

fn exit_code_for_result(result: &OffloadResult) -> i32 {
    match result.summary.outcome {
        JobOutcome::Cancelled => 130,
        JobOutcome::Failed => 1,
        JobOutcome::Completed if result.summary.errors > 0 => 1,
        JobOutcome::Completed => 0,
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error[{}]: {}", error.code(), error);
            exit_code_for(error.code())
        }
    };
    std::process::exit(code);
}

fn run() -> CliResult<i32> {
    let args = Args::parse();
    let config = effective_config(&args);
    init_logging(config.verbose, args.quiet);

    let cancel = CancelToken::new();
    {
        let cancel_clone = cancel.clone();
        ctrlc::set_handler(move || {
            if cancel_clone.is_cancelled() {
                eprintln!("\nForce quit.");
                std::process::exit(130);
            }
            cancel_clone.cancel();
            eprintln!(
                "\nCancelling... the file in flight will be discarded. Press Ctrl+C again to abort immediately."
            );
        })
        .ok();
    }

    if config.output_mode == OutputMode::Human && config.verbose > 0 {
        config.print_human_stderr();
    }

    let mut builder = OffloadBuilder::new(&args.source)
        .destination(&args.dest)
        .parallel(config.jobs)
        .chunk_size(usize::try_from(config.chunk_size_mib * 1024 * 1024).unwrap_or(usize::MAX))
        .progress_scope(config.progress_scope.into())
        .report_prefix(args.report_prefix.clone())
        .cancel_token(cancel);
    if let Some(dest2) = &args.dest2 {
        builder = builder.destination(dest2);
    }
    if !config.preserve_timestamps {
        builder = builder.no_timestamps();
    }
    if !config.preserve_permissions {
        builder = builder.no_permissions();
    }
    if !config.fsync {
        builder = builder.no_fsync();
    }

    let pb: Option<ProgressBar> = if config.output_mode == OutputMode::Human && !args.quiet {
        Some(create_progress_bar(0))
    } else {
        None
    };
    if let Some(pb) = &pb {
        let bar = pb.clone();
        builder = builder.on_progress(move |sample| update_progress_bar(&bar, sample));
        if config.verbose > 0 {
            let bar = pb.clone();
            builder = builder.on_file_done(move |record| bar.println(render_record_line(record)));
        }
    } else if config.output_mode == OutputMode::Human && config.verbose > 0 {
        builder = builder.on_file_done(|record| eprintln!("{}", render_record_line(record)));
    }

    let offload = builder
        .build()
        .map_err(|source| CliError::Request { source })?;
    let result = offload.run();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match config.output_mode {
        OutputMode::Human => print_human(&result, args.quiet),
        OutputMode::Json => emit_json(&config, &result)?,
    }

    Ok(exit_code_for_result(&result))
}

fn effective_config(args: &Args) -> EffectiveConfig {
    let defaults = profile_defaults(args.profile);
    EffectiveConfig {
        profile: args.profile,
        jobs: args.jobs.max(1),
        chunk_size_mib: args.chunk_size,
        progress_scope: args.progress_scope,
        preserve_timestamps: defaults.preserve_timestamps && !args.no_times,
        preserve_permissions: defaults.preserve_permissions && !args.no_perms,
        fsync: defaults.fsync && !args.no_sync,
        output_mode: args.output,
        verbose: defaults.verbose.max(args.verbose),
    }
}

/// Library warnings go through `tracing`; `RUST_LOG` overrides the level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("offload={level}")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();
}

fn print_human(result: &OffloadResult, quiet: bool) {
    let summary = &result.summary;

    for record in result.records.iter().filter(|r| r.status == FileStatus::Error) {
        eprintln!(
            "error[{}]: {}: {}",
            record.error_code.unwrap_or(ErrorCode::Internal),
            record.relative_path.display(),
            record.error.as_deref().unwrap_or("")
        );
    }
    for failure in &result.report_errors {
        eprintln!(
            "warning: report not written to {}: {}",
            failure.path.display(),
            failure.message
        );
    }

    match summary.outcome {
        JobOutcome::Failed => {
            eprintln!(
                "error[{}]: {}",
                ErrorCode::EnumerationFailed,
                summary.fatal_error.as_deref().unwrap_or("source could not be read")
            );
        }
        JobOutcome::Cancelled => {
            eprintln!(
                "Cancelled after verifying {} of {} files ({}).",
                summary.files_copied,
                summary.files_total,
                format_bytes(summary.bytes_copied)
            );
            for path in &summary.cancelled_files {
                eprintln!("  discarded incomplete copy: {}", path.display());
            }
        }
        JobOutcome::Completed => {
            if !quiet {
                if summary.files_total == 0 {
                    println!("Nothing to copy");
                } else {
                    println!(
                        "Verified {} of {} files, {} errors ({}, {:.1} MB/s)",
                        summary.files_copied,
                        summary.files_total,
                        summary.errors,
                        format_bytes(summary.bytes_copied),
                        summary.average_speed_mbps
                    );
                }
            }
        }
    }

    if !quiet {
        for path in &result.report_paths {
            println!("Report: {}", path.display());
        }
    }
}

fn emit_json(config: &EffectiveConfig, result: &OffloadResult) -> CliResult<()> {
    let mut payload = json!({
        "schema_version": "1.0",
        "mode": "offload",
        "effective_config": config.to_json_value(),
    });
    // summary, records, report_paths, report_errors
    let result_value =
        serde_json::to_value(result).map_err(|source| CliError::JsonSerialize { source })?;
    if let (Value::Object(out), Value::Object(fields)) = (&mut payload, result_value) {
        out.extend(fields);
    }
    print_json_value(&payload)
}

fn print_json_value(value: &Value) -> CliResult<()> {
    let serialized =
        serde_json::to_string(value).map_err(|source| CliError::JsonSerialize { source })?;
    println!("{serialized}");
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

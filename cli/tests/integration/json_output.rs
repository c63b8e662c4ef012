//! Machine-readable output tests for the offload CLI.

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::TestFixture;
use serde_json::Value;
use std::fs;

fn run_json(args: &[&std::ffi::OsStr]) -> (Value, Option<i32>) {
    let output = cargo_bin_cmd!("offload")
        .arg("--output")
        .arg("json")
        .args(args)
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let value: Value = serde_json::from_str(stdout.trim()).unwrap();
    (value, output.status.code())
}

#[test]
fn test_json_summary_and_records() {
    let fx = TestFixture::new();
    fx.write_source("A001/clip.mov", b"0123456789");
    fx.write_source("empty.txt", b"");
    let (src, dst) = (fx.src(), fx.dst1());

    let (value, code) = run_json(&[src.as_os_str(), dst.as_os_str()]);

    assert_eq!(code, Some(0));
    assert_eq!(value["schema_version"], "1.0");
    assert_eq!(value["mode"], "offload");
    assert_eq!(value["effective_config"]["profile"], "modern");
    assert_eq!(value["effective_config"]["progress_scope"], "all");

    let summary = &value["summary"];
    assert_eq!(summary["outcome"], "completed");
    assert_eq!(summary["files_total"], 2);
    assert_eq!(summary["files_copied"], 2);
    assert_eq!(summary["errors"], 0);
    assert_eq!(summary["bytes_copied"], 10);

    let records = value["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["status"], "ok");
    let hash = records[0]["hash"].as_str().unwrap();
    assert_eq!(hash.len(), 16);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    // Empty input, seed 0
    assert_eq!(records[1]["hash"], "ef46db3751d8e999");

    let reports = value["report_paths"].as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(fs::metadata(reports[0].as_str().unwrap()).unwrap().is_file());
}

#[test]
fn test_json_records_destination_error() {
    let fx = TestFixture::new();
    fx.write_source("clip.mov", b"frames");
    fs::write(fx.dst2(), b"").unwrap();
    let (src, d1, d2) = (fx.src(), fx.dst1(), fx.dst2());

    let (value, code) = run_json(&[src.as_os_str(), d1.as_os_str(), d2.as_os_str()]);

    assert_eq!(code, Some(1));
    assert_eq!(value["summary"]["errors"], 1);
    let record = &value["records"][0];
    assert_eq!(record["status"], "error");
    assert_eq!(record["error_code"], "destination_unwritable");
    assert_eq!(record["outcomes"].as_array().unwrap().len(), 2);
    assert!(record["outcomes"][0]["hash"].is_string());
    assert!(record["outcomes"][1]["hash"].is_null());
    assert_eq!(value["report_errors"].as_array().unwrap().len(), 1);
}

#[test]
fn test_json_failed_enumeration() {
    let fx = TestFixture::new();
    let missing = fx.root.path().join("nope");
    let dst = fx.dst1();

    let (value, code) = run_json(&[missing.as_os_str(), dst.as_os_str()]);

    assert_eq!(code, Some(1));
    assert_eq!(value["summary"]["outcome"], "failed");
    assert!(value["summary"]["fatal_error"].is_string());
    assert_eq!(value["records"].as_array().unwrap().len(), 0);
}

#[test]
fn test_json_source_scope() {
    let fx = TestFixture::new();
    fx.write_source("a.bin", b"abc");
    let (src, d1, d2) = (fx.src(), fx.dst1(), fx.dst2());
    let scope = std::ffi::OsStr::new("--progress-scope");
    let source = std::ffi::OsStr::new("source");

    let (value, code) = run_json(&[
        scope,
        source,
        src.as_os_str(),
        d1.as_os_str(),
        d2.as_os_str(),
    ]);

    assert_eq!(code, Some(0));
    assert_eq!(value["effective_config"]["progress_scope"], "source");
    // Bytes copied still counts both destinations
    assert_eq!(value["summary"]["bytes_copied"], 6);
}

//! Basic functionality integration tests for the offload CLI.

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::{TestFixture, read_report};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_single_destination() {
    let fx = TestFixture::new();
    fx.write_source("A001/C0001.MP4", b"first clip");
    fx.write_source("notes.txt", b"");

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg("-q")
        .arg("--no-sync")
        .arg(fx.src())
        .arg(fx.dst1())
        .assert()
        .success();

    assert_eq!(
        fs::read(fx.dst1().join("A001/C0001.MP4")).unwrap(),
        b"first clip"
    );
    assert!(fx.dst1().join("notes.txt").is_file());

    let report = read_report(&fx.dst1());
    assert_eq!(report.matches("| [OK] |").count(), 2);
    assert!(report.contains("A001/C0001.MP4 | [OK] | "));
    assert!(report.contains("Destination 2: N/A"));
}

#[test]
fn test_two_destinations_get_identical_reports() {
    let fx = TestFixture::new();
    fx.create_files(5, 10_000);

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg("-q")
        .arg("--no-sync")
        .arg("-j")
        .arg("2")
        .arg(fx.src())
        .arg(fx.dst1())
        .arg(fx.dst2())
        .assert()
        .success();

    for i in 0..5 {
        let name = format!("clip{i:03}.mov");
        assert_eq!(fs::read(fx.dst1().join(&name)).unwrap().len(), 10_000);
        assert_eq!(fs::read(fx.dst2().join(&name)).unwrap().len(), 10_000);
    }

    let first = read_report(&fx.dst1());
    let second = read_report(&fx.dst2());
    assert_eq!(first, second);
    assert_eq!(first.matches("| [OK] |").count(), 5);
}

#[test]
fn test_summary_and_report_path_printed() {
    let fx = TestFixture::new();
    fx.create_files(3, 100);

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg("--no-sync")
        .arg(fx.src())
        .arg(fx.dst1())
        .assert()
        .success()
        .stdout(predicate::str::contains("Verified 3 of 3 files, 0 errors"))
        .stdout(predicate::str::contains("Report: "));
}

#[test]
fn test_report_prefix() {
    let fx = TestFixture::new();
    fx.create_files(1, 10);

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg("-q")
        .arg("--report-prefix")
        .arg("Shoot")
        .arg(fx.src())
        .arg(fx.dst1())
        .assert()
        .success();

    let names: Vec<String> = fs::read_dir(fx.dst1())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("Shoot_") && n.ends_with(".txt")));
}

#[test]
fn test_empty_source_writes_report() {
    let fx = TestFixture::new();

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg(fx.src())
        .arg(fx.dst1())
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to copy"));

    let report = read_report(&fx.dst1());
    assert!(report.contains("Outcome      : Completed"));
}

#[test]
fn test_rerun_overwrites_with_same_content() {
    let fx = TestFixture::new();
    fx.write_source("clip.mov", b"take one");
    fs::create_dir_all(fx.dst1()).unwrap();
    fs::write(fx.dst1().join("clip.mov"), b"an older and much longer file").unwrap();

    for _ in 0..2 {
        cargo_bin_cmd!("offload")
            .arg("-q")
            .arg(fx.src())
            .arg(fx.dst1())
            .assert()
            .success();
    }

    assert_eq!(fs::read(fx.dst1().join("clip.mov")).unwrap(), b"take one");
    // Runs within the same second share a report name and overwrite it
    let reports = fs::read_dir(fx.dst1())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("Report_")
        })
        .count();
    assert!((1..=2).contains(&reports));
}

#[test]
fn test_verbose_prints_file_lines() {
    let fx = TestFixture::new();
    fx.write_source("a.wav", b"audio");

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg("-q")
        .arg("-v")
        .arg(fx.src())
        .arg(fx.dst1())
        .assert()
        .success()
        .stderr(predicate::str::contains("a.wav | [OK] | "));
}

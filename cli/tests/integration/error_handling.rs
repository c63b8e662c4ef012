//! Error handling integration tests for the offload CLI.
//!
//! These tests verify:
//! - Request validation and its exit code
//! - Per-file destination failures are recorded and the job continues
//! - An unreadable source fails the job but still leaves a report

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::{TestFixture, read_report};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_missing_destination_argument() {
    let fx = TestFixture::new();

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg(fx.src()).assert().failure().code(2);
}

#[test]
fn test_same_destination_twice_is_invalid() {
    let fx = TestFixture::new();

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg(fx.src())
        .arg(fx.dst1())
        .arg(fx.dst1())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error[invalid_input]"));
}

#[test]
fn test_destination_equal_to_source_is_invalid() {
    let fx = TestFixture::new();

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg(fx.src())
        .arg(fx.src())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Destination is the source"));
}

#[test]
fn test_destination_inside_source_is_invalid() {
    let fx = TestFixture::new();
    fx.write_source("clip.mov", b"frames");

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg(fx.src())
        .arg(fx.src().join("backup"))
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("inside the source directory"));

    assert!(!fx.src().join("backup").exists());
}

#[test]
fn test_chunk_size_zero_rejected() {
    let fx = TestFixture::new();

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg("--chunk-size")
        .arg("0")
        .arg(fx.src())
        .arg(fx.dst1())
        .assert()
        .failure()
        .code(2);
}

/// One destination cannot be written: the file is an error, the other copy
/// is kept, and the job still completes.
#[test]
fn test_unwritable_second_destination() {
    let fx = TestFixture::new();
    fx.write_source("clip.mov", b"frames");
    // A regular file where the destination directory should be, so the
    // failure happens even when running as root
    fs::write(fx.dst2(), b"").unwrap();

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg("-q")
        .arg(fx.src())
        .arg(fx.dst1())
        .arg(fx.dst2())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error[destination_unwritable]"));

    assert_eq!(fs::read(fx.dst1().join("clip.mov")).unwrap(), b"frames");
    let report = read_report(&fx.dst1());
    assert_eq!(report.matches("[ERREUR]").count(), 1);
    assert!(!report.contains("| [OK] |"));
}

#[test]
fn test_missing_source_fails_with_report() {
    let fx = TestFixture::new();
    let missing = fx.root.path().join("no_card");

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg("-q")
        .arg(&missing)
        .arg(fx.dst1())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error[enumeration_failed]"));

    let report = read_report(&fx.dst1());
    assert!(report.contains("FATAL ERROR"));
    assert!(report.contains("Outcome      : Failed"));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_recorded() {
    use std::os::unix::fs::PermissionsExt;

    let fx = TestFixture::new();
    fx.write_source("ok.mov", b"fine");
    fx.write_source("locked.mov", b"secret");
    let locked = fx.src().join("locked.mov");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root can read anything; nothing to test there
    if fs::File::open(&locked).is_ok() {
        return;
    }

    let mut cmd = cargo_bin_cmd!("offload");
    cmd.arg("-q")
        .arg(fx.src())
        .arg(fx.dst1())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error[source_unreadable]"));

    assert!(!fx.dst1().join("locked.mov").exists());
    let report = read_report(&fx.dst1());
    assert!(report.contains("locked.mov | [ERREUR] | N/A | "));
    assert!(report.contains("ok.mov | [OK] | "));

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
}

//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test fixture with a source card and two destination roots.
pub struct TestFixture {
    pub root: TempDir,
}

impl TestFixture {
    /// Create a fixture with an empty `card/` source directory.
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(root.path().join("card")).expect("Failed to create source dir");
        Self { root }
    }

    /// Source root.
    pub fn src(&self) -> PathBuf {
        self.root.path().join("card")
    }

    /// First destination root (not created).
    pub fn dst1(&self) -> PathBuf {
        self.root.path().join("raid")
    }

    /// Second destination root (not created).
    pub fn dst2(&self) -> PathBuf {
        self.root.path().join("shuttle")
    }

    /// Write a file under the source root, creating parents.
    pub fn write_source(&self, relative: &str, content: &[u8]) {
        let path = self.src().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(path, content).expect("Failed to write file");
    }

    /// Create a specified number of files with the given size (in bytes).
    pub fn create_files(&self, count: usize, size: usize) {
        for i in 0..count {
            self.write_source(&format!("clip{i:03}.mov"), &"x".repeat(size).into_bytes());
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the single audit report in a destination root.
pub fn find_report(dest: &Path) -> PathBuf {
    let reports: Vec<PathBuf> = fs::read_dir(dest)
        .expect("Failed to read destination")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with("Report_"))
                .unwrap_or(false)
        })
        .collect();
    assert_eq!(reports.len(), 1, "expected one report in {:?}", dest);
    reports[0].clone()
}

/// Read the single audit report in a destination root.
pub fn read_report(dest: &Path) -> String {
    fs::read_to_string(find_report(dest)).expect("Failed to read report")
}

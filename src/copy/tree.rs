//! Source tree enumeration.

use crate::job::FileTask;
use crate::options::OffloadOptions;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Every regular file under a source root, in copy order.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    /// Files in depth-first, name-sorted order
    pub files: Vec<FileTask>,
    /// Sum of all file sizes
    pub total_bytes: u64,
}

impl SourceTree {
    /// Number of files found.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no file was found.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// List every regular file under `root`, recursively.
///
/// Entries are visited in name order so two runs over the same tree produce
/// the same file order. Symlinks and special files (sockets, devices, etc.)
/// are skipped with a warning.
///
/// # Errors
///
/// Fails if `root` is not a readable directory or if any directory below it
/// cannot be listed. A partial listing is never returned.
pub fn enumerate_source(root: &Path, options: &OffloadOptions) -> io::Result<SourceTree> {
    let meta = fs::metadata(root)?;
    if !meta.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut tree = SourceTree::default();
    collect_files(root, Path::new(""), options, &mut tree)?;
    Ok(tree)
}

/// Recursively collect the files of `dir`, relative to the source root.
fn collect_files(
    dir: &Path,
    relative: &Path,
    options: &OffloadOptions,
    tree: &mut SourceTree,
) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let src_path = entry.path();
        let rel_path: PathBuf = relative.join(entry.file_name());

        // file_type() does not follow symlinks
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            options.warn(&format!("Skipping symlink: {}", src_path.display()));
        } else if file_type.is_dir() {
            collect_files(&src_path, &rel_path, options, tree)?;
        } else if file_type.is_file() {
            let size = entry.metadata()?.len();
            tree.total_bytes += size;
            tree.files.push(FileTask {
                relative_path: rel_path,
                size,
            });
        } else {
            options.warn(&format!("Skipping special file: {}", src_path.display()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn test_enumerate_nested_sorted() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("B/sub")).unwrap();
        fs::create_dir_all(root.join("A")).unwrap();
        fs::write(root.join("z.txt"), "zz").unwrap();
        fs::write(root.join("A/clip.mov"), "12345").unwrap();
        fs::write(root.join("B/sub/deep.bin"), "").unwrap();

        let tree = enumerate_source(root, &OffloadOptions::default()).unwrap();

        let paths: Vec<_> = tree.files.iter().map(|f| f.relative_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("A/clip.mov"),
                PathBuf::from("B/sub/deep.bin"),
                PathBuf::from("z.txt"),
            ]
        );
        assert_eq!(tree.total_bytes, 7);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_enumerate_empty_dir() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("empty_sub")).unwrap();

        let tree = enumerate_source(dir.path(), &OffloadOptions::default()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.total_bytes, 0);
    }

    #[test]
    fn test_enumerate_missing_root_fails() {
        let dir = tempdir().unwrap();
        let result = enumerate_source(&dir.path().join("nope"), &OffloadOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_enumerate_file_root_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let err = enumerate_source(&file, &OffloadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotADirectory);
    }

    #[cfg(unix)]
    #[test]
    fn test_enumerate_skips_symlinks_with_warning() {
        use std::os::unix::fs::symlink;

        static WARN_COUNT: AtomicUsize = AtomicUsize::new(0);
        fn warn_handler(msg: &str) {
            if msg.contains("symlink") {
                WARN_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), "data").unwrap();
        symlink(dir.path().join("real.txt"), dir.path().join("link.txt")).unwrap();

        let options = OffloadOptions::default().with_warn_handler(warn_handler);
        let tree = enumerate_source(dir.path(), &options).unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.files[0].relative_path, PathBuf::from("real.txt"));
        assert_eq!(WARN_COUNT.load(Ordering::SeqCst), 1);
    }
}

//! Filesystem assertions shared by integration tests

use attachment_dl::storage::is_temp_file_name;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every regular file under `root`, relative to it, sorted
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

/// Panic if any in-progress temporary file remains under `root`
pub fn assert_no_temp_files(root: &Path) {
    let leftovers: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| is_temp_file_name(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect();
    assert!(leftovers.is_empty(), "temporary files left behind: {leftovers:?}");
}

/// Panic unless `path` lies inside `root`
pub fn assert_contained(root: &Path, path: &Path) {
    assert!(
        path.starts_with(root),
        "{} escapes {}",
        path.display(),
        root.display()
    );
}

//! Assertions on feed and staging directories

use nupkg_restore::PackageReference;
use nupkg_restore::feed;
use std::path::{Path, PathBuf};

/// Assert the feed holds a complete entry for `name version`; returns the entry dir
pub fn assert_entry_complete(feed_root: &Path, name: &str, version: &str) -> PathBuf {
    let reference = PackageReference::new(name, version);
    let dir = feed::entry_dir(feed_root, &reference);
    assert!(dir.is_dir(), "missing feed entry {}", dir.display());

    let archive = dir.join(feed::archive_file_name(&reference));
    assert!(archive.is_file(), "missing archive in {}", dir.display());
    assert!(
        dir.join(feed::nuspec_file_name(&reference)).is_file(),
        "missing manifest in {}",
        dir.display()
    );
    assert!(dir.join(feed::METADATA_FILE_NAME).is_file());

    let marker = std::fs::read_to_string(dir.join(feed::hash_file_name(&reference)))
        .expect("integrity marker");
    assert_eq!(marker, feed::sha512_base64(&archive).expect("hash archive"));
    dir
}

/// Assert no entry directory exists for `name`
pub fn assert_no_entry(feed_root: &Path, name: &str) {
    let dir = feed_root.join(name.to_lowercase());
    assert!(!dir.exists(), "unexpected feed entry {}", dir.display());
}

/// Assert nothing is left in the staging directory or as a temporary feed directory
pub fn assert_no_leftovers(staging: &Path, feed_root: &Path) {
    if let Ok(entries) = std::fs::read_dir(staging) {
        let left: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        assert!(left.is_empty(), "staging files left behind: {left:?}");
    }
    if let Ok(entries) = std::fs::read_dir(feed_root) {
        let temp: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".restore-"))
            .map(|e| e.path())
            .collect();
        assert!(temp.is_empty(), "temporary feed directories left behind: {temp:?}");
    }
}

/// Every file under `dir` with its contents, in a stable order
pub fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let bytes = std::fs::read(e.path()).expect("read feed file");
            (e.path().to_path_buf(), bytes)
        })
        .collect()
}

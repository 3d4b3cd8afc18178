//! Offline feed layout and membership checks
//!
//! The feed uses the v3 local-folder layout:
//!
//! ```text
//! <feed>/<id>/<version>/
//!     <id>.<version>.nupkg
//!     <id>.<version>.nupkg.sha512   base64 SHA-512 of the archive, written last
//!     <id>.nuspec
//!     .nupkg.metadata
//!     ...package content...
//! ```
//!
//! `<id>` is the lower-case package id and `<version>` the normalized version.

use crate::types::{FeedStatus, PackageReference};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha512};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the per-entry metadata file
pub const METADATA_FILE_NAME: &str = ".nupkg.metadata";

/// Directory holding a package's entry
pub fn entry_dir(feed_root: &Path, reference: &PackageReference) -> PathBuf {
    feed_root
        .join(reference.id_lower())
        .join(reference.normalized_version())
}

/// Archive file name inside an entry
pub fn archive_file_name(reference: &PackageReference) -> String {
    reference.archive_file_name()
}

/// Integrity marker file name inside an entry
pub fn hash_file_name(reference: &PackageReference) -> String {
    format!("{}.sha512", reference.archive_file_name())
}

/// Manifest file name inside an entry
pub fn nuspec_file_name(reference: &PackageReference) -> String {
    format!("{}.nuspec", reference.id_lower())
}

/// Base64 SHA-512 of a file's contents
pub fn sha512_base64(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha512::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(STANDARD.encode(hasher.finalize()))
}

/// Check whether the feed already holds a valid entry for `reference`
pub async fn check_membership(
    reference: &PackageReference,
    feed_root: &Path,
) -> io::Result<FeedStatus> {
    let dir = entry_dir(feed_root, reference);
    let reference = reference.clone();
    tokio::task::spawn_blocking(move || inspect_entry(&dir, &reference))
        .await
        .map_err(|e| io::Error::other(format!("membership check task failed: {e}")))?
}

fn inspect_entry(dir: &Path, reference: &PackageReference) -> io::Result<FeedStatus> {
    if !dir.exists() {
        return Ok(FeedStatus::Absent);
    }

    let invalid = |reason: String| -> io::Result<FeedStatus> {
        debug!(%reference, %reason, "feed entry is invalid");
        Ok(FeedStatus::PresentInvalid { reason })
    };

    if !dir.join(nuspec_file_name(reference)).is_file() {
        return invalid("manifest is missing".into());
    }

    let marker = match std::fs::read_to_string(dir.join(hash_file_name(reference))) {
        Ok(marker) => marker.trim().to_string(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return invalid("integrity marker is missing".into());
        }
        Err(e) => return Err(e),
    };
    if marker.is_empty() {
        return invalid("integrity marker is empty".into());
    }

    let archive = dir.join(archive_file_name(reference));
    if archive.is_file() {
        let actual = sha512_base64(&archive)?;
        if actual != marker {
            return invalid("archive hash does not match integrity marker".into());
        }
    }

    Ok(FeedStatus::PresentValid)
}

/// Delete a package's entry directory; a missing entry is not an error
pub async fn remove_entry(reference: &PackageReference, feed_root: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(entry_dir(feed_root, reference)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn write_entry(feed: &Path, reference: &PackageReference, archive: &[u8]) -> PathBuf {
        let dir = entry_dir(feed, reference);
        std::fs::create_dir_all(&dir).unwrap();
        let archive_path = dir.join(archive_file_name(reference));
        std::fs::write(&archive_path, archive).unwrap();
        std::fs::write(dir.join(nuspec_file_name(reference)), "<package/>").unwrap();
        let hash = sha512_base64(&archive_path).unwrap();
        std::fs::write(dir.join(hash_file_name(reference)), hash).unwrap();
        dir
    }

    #[test]
    fn entry_dir_uses_lowercase_id_and_normalized_version() {
        let reference = PackageReference::new("Serilog.Sinks.File", "5.0");
        assert_eq!(
            entry_dir(Path::new("/feed"), &reference),
            PathBuf::from("/feed/serilog.sinks.file/5.0.0")
        );
        assert_eq!(hash_file_name(&reference), "serilog.sinks.file.5.0.0.nupkg.sha512");
        assert_eq!(nuspec_file_name(&reference), "serilog.sinks.file.nuspec");
    }

    #[test]
    fn sha512_matches_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(
            sha512_base64(&path).unwrap(),
            "z4PhNX7vuL3xVChQ1m2AB9Yg5AULVxXcg/SpIdNs6c5H0NE8XYXysP+DGNKHfuwvY7kxvUdBeoGlODJ6+SfaPg=="
        );
    }

    #[tokio::test]
    async fn absent_when_directory_missing() {
        let feed = tempfile::tempdir().unwrap();
        let reference = PackageReference::new("A", "1.0");
        assert_eq!(
            check_membership(&reference, feed.path()).await.unwrap(),
            FeedStatus::Absent
        );
    }

    #[tokio::test]
    async fn valid_when_marker_matches_archive() {
        let feed = tempfile::tempdir().unwrap();
        let reference = PackageReference::new("A", "1.0");
        write_entry(feed.path(), &reference, b"archive bytes");
        assert_eq!(
            check_membership(&reference, feed.path()).await.unwrap(),
            FeedStatus::PresentValid
        );
    }

    #[tokio::test]
    async fn invalid_when_marker_missing() {
        let feed = tempfile::tempdir().unwrap();
        let reference = PackageReference::new("A", "1.0");
        let dir = write_entry(feed.path(), &reference, b"archive bytes");
        std::fs::remove_file(dir.join(hash_file_name(&reference))).unwrap();
        assert!(matches!(
            check_membership(&reference, feed.path()).await.unwrap(),
            FeedStatus::PresentInvalid { .. }
        ));
    }

    #[tokio::test]
    async fn invalid_when_archive_was_modified() {
        let feed = tempfile::tempdir().unwrap();
        let reference = PackageReference::new("A", "1.0");
        let dir = write_entry(feed.path(), &reference, b"archive bytes");
        std::fs::write(dir.join(archive_file_name(&reference)), b"tampered").unwrap();
        match check_membership(&reference, feed.path()).await.unwrap() {
            FeedStatus::PresentInvalid { reason } => assert!(reason.contains("hash")),
            other => panic!("expected invalid entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_when_manifest_missing() {
        let feed = tempfile::tempdir().unwrap();
        let reference = PackageReference::new("A", "1.0");
        let dir = write_entry(feed.path(), &reference, b"archive bytes");
        std::fs::remove_file(dir.join(nuspec_file_name(&reference))).unwrap();
        assert!(matches!(
            check_membership(&reference, feed.path()).await.unwrap(),
            FeedStatus::PresentInvalid { .. }
        ));
    }

    #[tokio::test]
    async fn remove_entry_deletes_directory_and_tolerates_absence() {
        let feed = tempfile::tempdir().unwrap();
        let reference = PackageReference::new("A", "1.0");
        let dir = write_entry(feed.path(), &reference, b"x");
        remove_entry(&reference, feed.path()).await.unwrap();
        assert!(!dir.exists());
        remove_entry(&reference, feed.path()).await.unwrap();
    }
}

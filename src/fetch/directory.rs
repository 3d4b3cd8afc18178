use super::ArchiveFetcher;
use crate::error::FetchError;
use crate::types::PackageReference;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Copies pre-placed archives out of a local directory
///
/// Archives are looked up as `<name>.<version>.nupkg` (as written in the package list),
/// then by the normalized lower-case file name, then by a case-insensitive scan of the
/// directory. The pre-placed file itself is never modified.
pub struct DirectoryFetcher {
    source_dir: PathBuf,
}

impl DirectoryFetcher {
    /// Create a fetcher reading from `source_dir`
    pub fn new(source_dir: PathBuf) -> Self {
        Self { source_dir }
    }

    /// Locate the archive for `reference`
    pub async fn locate(&self, reference: &PackageReference) -> Option<PathBuf> {
        let candidates = [
            format!("{}.{}.nupkg", reference.name, reference.version),
            reference.archive_file_name(),
        ];

        for name in &candidates {
            let path = self.source_dir.join(name);
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                return Some(path);
            }
        }

        let mut entries = tokio::fs::read_dir(&self.source_dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name().to_string_lossy().to_lowercase();
            if candidates.iter().any(|c| c.to_lowercase() == file_name) {
                return Some(entry.path());
            }
        }

        None
    }
}

#[async_trait]
impl ArchiveFetcher for DirectoryFetcher {
    async fn fetch(
        &self,
        reference: &PackageReference,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let Some(source) = self.locate(reference).await else {
            return Err(FetchError::NotFound {
                path: self.source_dir.join(reference.archive_file_name()),
            });
        };

        debug!(%reference, source = %source.display(), dest = %dest.display(), "copying pre-placed archive");

        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = tokio::fs::copy(&source, dest) => result.map_err(|source| FetchError::Io {
                path: dest.to_path_buf(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        self.source_dir.display().to_string()
    }
}

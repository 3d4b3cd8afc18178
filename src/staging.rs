//! Staging slots for in-flight archives

use crate::types::PackageReference;
use std::io;
use std::path::{Path, PathBuf};

/// Transient file holding one downloaded archive for the duration of one attempt
///
/// The path is derived from the package's normalized identity, so two packages
/// never share a slot. Call [`StagingSlot::release`] when the attempt ends; if the
/// slot is dropped without release (panic, cancelled future) the file is removed
/// synchronously on drop.
#[derive(Debug)]
pub struct StagingSlot {
    path: PathBuf,
    released: bool,
}

impl StagingSlot {
    /// Slot for `reference` inside the download directory
    pub fn for_reference(download_dir: &Path, reference: &PackageReference) -> Self {
        Self {
            path: download_dir.join(format!("{}.part", reference.archive_file_name())),
            released: false,
        }
    }

    /// Path of the staged archive
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged file; a file that was never written is not an error
    pub async fn release(mut self) -> io::Result<()> {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for StagingSlot {
    fn drop(&mut self) {
        if !self.released {
            // Best-effort cleanup - ignore errors
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

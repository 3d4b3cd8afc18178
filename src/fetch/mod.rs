//! Archive retrieval
//!
//! An [`ArchiveFetcher`] copies one package archive into a staging path. Two
//! implementations ship with the crate:
//!
//! - [`HttpFetcher`] downloads from a remote gallery's flat container
//! - [`DirectoryFetcher`] copies pre-placed archives from a local directory
//!
//! Fetchers never clean up the destination on failure; the retry controller owns the
//! staging slot and removes it on every exit path.

mod directory;
mod http;

pub use directory::DirectoryFetcher;
pub use http::HttpFetcher;

use crate::config::{Config, SourceLocation};
use crate::error::{FetchError, Result};
use crate::types::PackageReference;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Retrieves one package archive into a local file
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Write the archive for `reference` to `dest`, returning the number of bytes written
    ///
    /// Must return [`FetchError::Cancelled`] promptly once `cancel` fires.
    async fn fetch(
        &self,
        reference: &PackageReference,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<u64, FetchError>;

    /// Human-readable description of where archives come from
    fn describe(&self) -> String;
}

/// Build the fetcher matching the configured source
pub fn from_config(config: &Config) -> Result<Arc<dyn ArchiveFetcher>> {
    match &config.source {
        SourceLocation::Http(base_url) => Ok(Arc::new(HttpFetcher::new(
            base_url.as_str(),
            config.token.clone(),
            config.fetch_timeout,
            config.connect_timeout,
        )?)),
        SourceLocation::Directory(dir) => Ok(Arc::new(DirectoryFetcher::new(dir.clone()))),
    }
}

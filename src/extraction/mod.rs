//! Package extraction into the offline feed
//!
//! A [`PackageExtractor`] takes a staged archive and materializes it as a complete feed
//! entry. Failures come in two classes: trust verification failures
//! ([`ExtractError::Signature`], carrying every issue found) and everything else
//! ([`ExtractError::Generic`]).
//!
//! Publishing must be atomic from the feed's point of view: an entry directory either
//! does not exist or is complete.

mod nupkg;
mod nuspec;
mod trust;

pub use nupkg::{NupkgExtractor, NupkgMetadata};
pub use nuspec::{NuspecMetadata, parse_nuspec};
pub use trust::verify_package;

use crate::error::ExtractError;
use crate::types::PackageReference;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Extracts a staged archive into the feed
#[async_trait]
pub trait PackageExtractor: Send + Sync {
    /// Extract `archive` as the feed entry for `reference`, returning the entry directory
    async fn extract(
        &self,
        reference: &PackageReference,
        archive: &Path,
        feed_root: &Path,
    ) -> Result<PathBuf, ExtractError>;
}

use super::PackageExtractor;
use super::nuspec::parse_nuspec;
use super::trust::verify_package;
use crate::config::TrustPolicy;
use crate::error::ExtractError;
use crate::feed;
use crate::types::{IssueSeverity, PackageReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Signature entry written by package signing tools
const SIGNATURE_ENTRY: &str = ".signature.p7s";

/// Contents of an entry's `.nupkg.metadata` file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NupkgMetadata {
    /// Metadata format version
    pub version: u32,
    /// Base64 SHA-512 of the archive
    pub content_hash: String,
    /// Where the archive came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Extracts `.nupkg` archives into the v3 feed layout
///
/// Trust verification runs before anything is written. The entry is assembled in a
/// temporary directory inside the feed root and renamed into place, with the integrity
/// marker written last.
#[derive(Clone, Debug, Default)]
pub struct NupkgExtractor {
    policy: TrustPolicy,
    source: Option<String>,
}

impl NupkgExtractor {
    /// Create an extractor enforcing `policy`
    pub fn new(policy: TrustPolicy) -> Self {
        Self {
            policy,
            source: None,
        }
    }

    /// Record `source` in each entry's metadata file
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[async_trait]
impl PackageExtractor for NupkgExtractor {
    async fn extract(
        &self,
        reference: &PackageReference,
        archive: &Path,
        feed_root: &Path,
    ) -> Result<PathBuf, ExtractError> {
        let this = self.clone();
        let reference = reference.clone();
        let archive = archive.to_path_buf();
        let feed_root = feed_root.to_path_buf();

        tokio::task::spawn_blocking(move || this.extract_blocking(&reference, &archive, &feed_root))
            .await
            .map_err(|e| ExtractError::generic(format!("extraction task failed: {e}")))?
    }
}

impl NupkgExtractor {
    fn extract_blocking(
        &self,
        reference: &PackageReference,
        archive_path: &Path,
        feed_root: &Path,
    ) -> Result<PathBuf, ExtractError> {
        let file = File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ExtractError::generic(format!("not a valid package archive: {e}")))?;

        let nuspec_name = archive
            .file_names()
            .find(|name| !name.contains('/') && name.to_lowercase().ends_with(".nuspec"))
            .map(str::to_string)
            .ok_or_else(|| ExtractError::generic("package archive contains no manifest"))?;

        let mut nuspec_xml = String::new();
        archive
            .by_name(&nuspec_name)
            .map_err(|e| ExtractError::generic(format!("failed to read manifest: {e}")))?
            .read_to_string(&mut nuspec_xml)?;
        let manifest = parse_nuspec(&nuspec_xml)?;

        let signature_size = archive.by_name(SIGNATURE_ENTRY).ok().map(|f| f.size());
        let issues = verify_package(&self.policy, reference, &manifest, signature_size);
        if issues.iter().any(|i| i.severity == IssueSeverity::Error) {
            return Err(ExtractError::Signature {
                identity: format!("{} {}", manifest.id, manifest.version),
                issues,
            });
        }
        for issue in &issues {
            debug!(%reference, code = %issue.code, "{}", issue.message);
        }

        std::fs::create_dir_all(feed_root)?;
        let staging = tempfile::Builder::new()
            .prefix(".restore-")
            .tempdir_in(feed_root)?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| ExtractError::generic(format!("failed to read archive entry: {e}")))?;
            let name = entry.name().to_string();
            if entry.is_dir() || name == nuspec_name || is_packaging_entry(&name) {
                continue;
            }

            let Some(relative) = entry_path(&name) else {
                warn!(%reference, entry = %name, "skipping entry with unsafe path");
                continue;
            };

            let target = staging.path().join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)
                .map_err(|e| ExtractError::generic(format!("failed to extract {name}: {e}")))?;
        }

        std::fs::write(
            staging.path().join(feed::nuspec_file_name(reference)),
            nuspec_xml.as_bytes(),
        )?;

        let stored_archive = staging.path().join(feed::archive_file_name(reference));
        std::fs::copy(archive_path, &stored_archive)?;
        let content_hash = feed::sha512_base64(&stored_archive)?;

        let metadata = NupkgMetadata {
            version: 2,
            content_hash: content_hash.clone(),
            source: self.source.clone(),
        };
        let metadata_json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| ExtractError::generic(format!("failed to encode metadata: {e}")))?;
        std::fs::write(
            staging.path().join(feed::METADATA_FILE_NAME),
            metadata_json,
        )?;

        std::fs::write(
            staging.path().join(feed::hash_file_name(reference)),
            content_hash,
        )?;

        let entry_dir = feed::entry_dir(feed_root, reference);
        publish(staging.path(), &entry_dir)?;

        info!(%reference, entry = %entry_dir.display(), "package extracted");
        Ok(entry_dir)
    }
}

/// Move a fully assembled entry into place, replacing any stale one
fn publish(staging: &Path, entry_dir: &Path) -> io::Result<()> {
    if let Some(parent) = entry_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::remove_dir_all(entry_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::rename(staging, entry_dir)
}

/// Packaging bookkeeping that does not belong in the feed entry
fn is_packaging_entry(name: &str) -> bool {
    name.starts_with("_rels/")
        || name.starts_with("package/")
        || name == "[Content_Types].xml"
        || name == SIGNATURE_ENTRY
}

/// Decode a percent-encoded entry name into a relative path, rejecting traversal
fn entry_path(name: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(name).ok()?;
    let path = PathBuf::from(decoded.replace('\\', "/"));

    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    (!relative.as_os_str().is_empty()).then_some(relative)
}

use crate::error::ExtractError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct NuspecDocument {
    metadata: NuspecMetadata,
}

/// Identity fields read from a package manifest
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NuspecMetadata {
    /// Package id as declared by the package
    pub id: String,
    /// Package version as declared by the package
    pub version: String,
}

/// Parse the identity out of `.nuspec` XML
pub fn parse_nuspec(xml: &str) -> Result<NuspecMetadata, ExtractError> {
    let xml = xml.trim_start_matches('\u{feff}');
    let document: NuspecDocument = quick_xml::de::from_str(xml)
        .map_err(|e| ExtractError::generic(format!("invalid package manifest: {e}")))?;

    let metadata = document.metadata;
    if metadata.id.trim().is_empty() || metadata.version.trim().is_empty() {
        return Err(ExtractError::generic(
            "package manifest is missing id or version",
        ));
    }

    Ok(NuspecMetadata {
        id: metadata.id.trim().to_string(),
        version: metadata.version.trim().to_string(),
    })
}

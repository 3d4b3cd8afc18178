use super::nuspec::NuspecMetadata;
use crate::config::TrustPolicy;
use crate::types::{PackageReference, SignatureIssue, normalize_version};

/// Package signature is present but unusable
pub const CODE_INVALID_SIGNATURE: &str = "NU3003";
/// Package is not signed
pub const CODE_NOT_SIGNED: &str = "NU3004";
/// Package content does not match what was requested
pub const CODE_INTEGRITY: &str = "NU3008";

/// Check a package against the trust policy
///
/// `signature_size` is the size of the archive's signature entry, or `None` when the
/// archive is unsigned. Returns every issue found; any issue with error severity
/// means the package must be rejected.
pub fn verify_package(
    policy: &TrustPolicy,
    reference: &PackageReference,
    manifest: &NuspecMetadata,
    signature_size: Option<u64>,
) -> Vec<SignatureIssue> {
    let mut issues = Vec::new();

    match signature_size {
        Some(0) => issues.push(SignatureIssue::error(
            CODE_INVALID_SIGNATURE,
            "The package signature file is empty.",
        )),
        Some(_) => {}
        None if policy.require_signed => issues.push(SignatureIssue::error(
            CODE_NOT_SIGNED,
            "The package is not signed and the trust policy requires signed packages.",
        )),
        None => issues.push(SignatureIssue::info(
            CODE_NOT_SIGNED,
            "The package is not signed.",
        )),
    }

    if !manifest.id.eq_ignore_ascii_case(&reference.name) {
        issues.push(SignatureIssue::error(
            CODE_INTEGRITY,
            format!(
                "The package id '{}' does not match the requested id '{}'.",
                manifest.id, reference.name
            ),
        ));
    }

    if normalize_version(&manifest.version) != reference.normalized_version() {
        issues.push(SignatureIssue::error(
            CODE_INTEGRITY,
            format!(
                "The package version '{}' does not match the requested version '{}'.",
                manifest.version, reference.version
            ),
        ));
    }

    issues
}

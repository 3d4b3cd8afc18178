//! Core types: package references, feed status, per-item outcomes and events

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single package to materialize into the offline feed
///
/// Equality and hashing use the name and version exactly as written in the package
/// list. On-disk paths and download URLs use the normalized identity instead
/// (see [`PackageReference::id_lower`] and [`PackageReference::normalized_version`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageReference {
    /// Package id as written in the list
    pub name: String,
    /// Package version as written in the list
    pub version: String,
}

impl PackageReference {
    /// Create a reference from a name and version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Lower-case package id, used for feed directories and gallery URLs
    pub fn id_lower(&self) -> String {
        self.name.to_lowercase()
    }

    /// Normalized version string, used for feed directories and gallery URLs
    pub fn normalized_version(&self) -> String {
        normalize_version(&self.version)
    }

    /// `<id>.<version>` in normalized form
    pub fn file_stem(&self) -> String {
        format!("{}.{}", self.id_lower(), self.normalized_version())
    }

    /// File name of the archive inside the feed and on the gallery
    pub fn archive_file_name(&self) -> String {
        format!("{}.nupkg", self.file_stem())
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Normalize a package version the way package galleries do
///
/// Build metadata is dropped, numeric parts lose leading zeros, short versions are padded
/// to three parts, a zero fourth part is dropped and the result is lower-cased.
/// Versions whose numeric parts do not parse are only lower-cased.
///
/// ```
/// use nupkg_restore::types::normalize_version;
///
/// assert_eq!(normalize_version("1.0"), "1.0.0");
/// assert_eq!(normalize_version("01.2.3.0"), "1.2.3");
/// assert_eq!(normalize_version("2.0.0-Beta+build.5"), "2.0.0-beta");
/// ```
pub fn normalize_version(version: &str) -> String {
    let without_metadata = version.split('+').next().unwrap_or(version);
    let (release, prerelease) = match without_metadata.split_once('-') {
        Some((release, prerelease)) => (release, Some(prerelease)),
        None => (without_metadata, None),
    };

    let parsed: Option<Vec<u64>> = release.split('.').map(|p| p.parse().ok()).collect();
    let Some(mut parts) = parsed.filter(|parts| parts.len() <= 4) else {
        return version.to_lowercase();
    };

    while parts.len() < 3 {
        parts.push(0);
    }
    if parts.len() == 4 && parts[3] == 0 {
        parts.pop();
    }

    let mut normalized = parts
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".");
    if let Some(prerelease) = prerelease {
        normalized.push('-');
        normalized.push_str(prerelease);
    }
    normalized.to_lowercase()
}

/// Result of checking whether the feed already holds a package
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedStatus {
    /// No entry for the package
    Absent,
    /// A complete entry whose integrity marker matches the stored archive
    PresentValid,
    /// An entry exists but is incomplete or corrupt
    PresentInvalid {
        /// What is wrong with the entry
        reason: String,
    },
}

/// Severity of a trust verification issue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Fails verification
    Error,
    /// Reported, does not fail verification
    Warning,
    /// Informational
    Info,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueSeverity::Error => "Error",
            IssueSeverity::Warning => "Warning",
            IssueSeverity::Info => "Information",
        };
        f.write_str(s)
    }
}

/// One finding from package trust verification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureIssue {
    /// How serious the finding is
    pub severity: IssueSeverity,
    /// Diagnostic code (e.g. `NU3004`)
    pub code: String,
    /// Human-readable description
    pub message: String,
}

impl SignatureIssue {
    /// Create an error-severity issue
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Create an info-severity issue
    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Info,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SignatureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.severity, self.code, self.message)
    }
}

/// Why an attempt (or a whole item) failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum FailureReason {
    /// The archive could not be fetched
    Transport {
        /// Transport error detail
        detail: String,
    },
    /// Trust verification rejected the archive
    Signature {
        /// Package identity reported by the extractor
        identity: String,
        /// Every issue found during verification
        issues: Vec<SignatureIssue>,
    },
    /// Any other extraction failure (corruption, I/O)
    Extraction {
        /// Extraction error detail
        detail: String,
    },
    /// The run was cancelled before the item finished
    Cancelled,
}

impl FailureReason {
    /// Short name of the error class for console output
    pub fn class(&self) -> &'static str {
        match self {
            FailureReason::Transport { .. } => "TransportError",
            FailureReason::Signature { .. } => "SignatureError",
            FailureReason::Extraction { .. } => "GenericError",
            FailureReason::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport { detail } => write!(f, "{detail}"),
            FailureReason::Signature { identity, issues } => write!(
                f,
                "signature validation failed for {identity} ({} issue(s))",
                issues.len()
            ),
            FailureReason::Extraction { detail } => write!(f, "{detail}"),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal result for one package reference
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Already present and valid in the feed
    Skipped,
    /// Fetched and extracted during this run
    Succeeded {
        /// Number of attempts used (1 = first try)
        attempts: u32,
    },
    /// Every attempt failed
    Failed {
        /// Reason of the last failed attempt
        reason: FailureReason,
        /// Number of attempts made
        attempts: u32,
    },
}

impl ItemOutcome {
    /// Whether this outcome clears the batch success flag
    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

/// Event emitted while a batch runs
///
/// Subscribe via [`crate::Restorer::subscribe`]. Events are dropped when nobody listens.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The batch is starting
    BatchStarted {
        /// Number of unique references
        total: usize,
        /// Worker count
        concurrency: usize,
    },

    /// The feed already had a valid copy
    ItemSkipped {
        /// The skipped package
        reference: PackageReference,
    },

    /// A corrupt feed entry was deleted so it can be fetched again
    InvalidEntryRemoved {
        /// The affected package
        reference: PackageReference,
        /// What was wrong with the entry
        reason: String,
    },

    /// One attempt failed; another may follow
    AttemptFailed {
        /// The affected package
        reference: PackageReference,
        /// Attempt number (1-based)
        attempt: u32,
        /// Attempt limit
        max_attempts: u32,
        /// Why the attempt failed
        reason: FailureReason,
    },

    /// Package fetched and extracted into the feed
    ItemRestored {
        /// The restored package
        reference: PackageReference,
        /// Attempts used
        attempts: u32,
    },

    /// Package failed after exhausting its attempts
    ItemFailed {
        /// The failed package
        reference: PackageReference,
        /// Attempts made
        attempts: u32,
        /// Reason of the last attempt
        reason: FailureReason,
    },

    /// Completion crossed a milestone
    Progress {
        /// References with a terminal outcome
        completed: usize,
        /// Total references
        total: usize,
        /// Milestone percentage (multiple of the progress step, or 100)
        percent: u32,
    },

    /// Every reference reached a terminal outcome
    BatchFinished {
        /// Restored this run
        succeeded: usize,
        /// Already present
        skipped: usize,
        /// Failed after retries
        failed: usize,
    },
}

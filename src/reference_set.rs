//! Package list parsing
//!
//! A package list holds one `<name> <version>` pair per line. Lines that do not match
//! (blank lines, comments, anything malformed) are ignored rather than rejected.

use crate::error::{Error, Result};
use crate::types::PackageReference;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Name: word characters, period, comma, underscore, hyphen. Version: word, period, hyphen.
const LINE_PATTERN: &str = r"^\s*([\w.,\-]+)\s+([\w.\-]+)\s*$";

#[allow(clippy::expect_used)]
static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LINE_PATTERN).expect("package line pattern is valid"));

/// Parse a single line into a reference, if it matches
pub fn parse_line(line: &str) -> Option<PackageReference> {
    let caps = LINE_RE.captures(line)?;
    Some(PackageReference::new(&caps[1], &caps[2]))
}

/// Parse package list text into a set of unique references
///
/// Lines naming the same feed entry (`Foo 1.0` and `foo 1.0.0`) collapse to the first
/// spelling in the list.
pub fn parse_references(content: &str) -> HashSet<PackageReference> {
    let mut references = HashSet::new();
    let mut stems = HashSet::new();
    let mut ignored = 0usize;

    for (index, line) in content.lines().enumerate() {
        match parse_line(line) {
            Some(reference) => {
                if stems.insert(reference.file_stem()) {
                    references.insert(reference);
                } else {
                    debug!(line_number = index + 1, %reference, "duplicate package identity");
                }
            }
            None => {
                if !line.trim().is_empty() {
                    debug!(line_number = index + 1, line, "ignoring unrecognized line");
                    ignored += 1;
                }
            }
        }
    }

    if ignored > 0 {
        info!(ignored, "ignored unrecognized lines in package list");
    }

    references
}

/// Read a package list file into a set of unique references
///
/// Fails with [`Error::InputNotFound`] when the file does not exist.
pub async fn load_references(path: &Path) -> Result<HashSet<PackageReference>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let references = parse_references(&content);
    info!(path = %path.display(), count = references.len(), "loaded package list");
    Ok(references)
}

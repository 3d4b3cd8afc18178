//! Configuration types for nupkg-restore

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Public gallery flat-container root used when no source is given
pub const DEFAULT_SOURCE: &str = "https://api.nuget.org/v3-flatcontainer";

/// Where package archives come from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceLocation {
    /// Remote gallery root; archives live at `<root>/<id>/<version>/<id>.<version>.nupkg`
    Http(Url),
    /// Local directory holding pre-placed `<name>.<version>.nupkg` archives
    Directory(PathBuf),
}

impl Default for SourceLocation {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        SourceLocation::Http(Url::parse(DEFAULT_SOURCE).expect("default source is a valid URL"))
    }
}

impl FromStr for SourceLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidSource("source must not be empty".into()));
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            let url = Url::parse(s.trim_end_matches('/'))
                .map_err(|e| Error::InvalidSource(format!("{s}: {e}")))?;
            return Ok(SourceLocation::Http(url));
        }

        if s.starts_with("file://") {
            let url = Url::parse(s).map_err(|e| Error::InvalidSource(format!("{s}: {e}")))?;
            let path = url
                .to_file_path()
                .map_err(|_| Error::InvalidSource(format!("{s}: not a local path")))?;
            return Ok(SourceLocation::Directory(path));
        }

        Ok(SourceLocation::Directory(PathBuf::from(s)))
    }
}

impl TryFrom<String> for SourceLocation {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SourceLocation> for String {
    fn from(source: SourceLocation) -> Self {
        source.to_string()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Http(url) => f.write_str(url.as_str().trim_end_matches('/')),
            SourceLocation::Directory(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Retry behavior for a single package
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per package, including the first (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt (default: 2 seconds)
    #[serde(default = "default_backoff", with = "duration_serde")]
    pub backoff: Duration,

    /// Multiplier applied to the delay after each further failure (default: 1.0, fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for the delay (default: 60 seconds)
    #[serde(default = "default_max_backoff", with = "duration_serde")]
    pub max_backoff: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff: default_max_backoff(),
            jitter: false,
        }
    }
}

/// Package trust requirements applied during extraction
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrustPolicy {
    /// Reject packages that carry no signature (default: false)
    #[serde(default)]
    pub require_signed: bool,
}

/// Main configuration for a restore run
///
/// Usually assembled by the command line; `--config` can supply a JSON base that the
/// command line then overrides.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Offline feed root to populate
    #[serde(default)]
    pub feed_dir: PathBuf,

    /// File listing `<name> <version>` pairs, one per line
    #[serde(default)]
    pub packages_file: PathBuf,

    /// Archive source (default: the public gallery)
    #[serde(default)]
    pub source: SourceLocation,

    /// Staging directory for in-flight downloads (default: `<temp>/nupkg-restore`)
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Bearer credential for the HTTP source
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Report every skipped and restored package, not only failures and milestones
    #[serde(default)]
    pub verbose: bool,

    /// Packages processed at the same time (default: 4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Whole-request timeout for one archive download (default: 600 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Connection establishment timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Per-package retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Trust verification policy
    #[serde(default)]
    pub trust: TrustPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_dir: PathBuf::new(),
            packages_file: PathBuf::new(),
            source: SourceLocation::default(),
            download_dir: default_download_dir(),
            token: None,
            verbose: false,
            concurrency: default_concurrency(),
            fetch_timeout: default_fetch_timeout(),
            connect_timeout: default_connect_timeout(),
            retry: RetryConfig::default(),
            trust: TrustPolicy::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("feed_dir", &self.feed_dir)
            .field("packages_file", &self.packages_file)
            .field("source", &self.source)
            .field("download_dir", &self.download_dir)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("verbose", &self.verbose)
            .field("concurrency", &self.concurrency)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry", &self.retry)
            .field("trust", &self.trust)
            .finish()
    }
}

impl Config {
    /// Load a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "config",
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.feed_dir.as_os_str().is_empty() {
            return Err(Error::config("feed_dir", "feed directory must be set"));
        }
        if self.packages_file.as_os_str().is_empty() {
            return Err(Error::config("packages_file", "package list must be set"));
        }
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "concurrency must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts",
                "max_attempts must be at least 1",
            ));
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier >= 1.0) {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "backoff_multiplier must be a finite number >= 1.0",
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(Error::config("fetch_timeout", "fetch timeout must be positive"));
        }
        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("nupkg-restore")
}

fn default_concurrency() -> usize {
    4
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff() -> Duration {
    Duration::from_secs(2)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

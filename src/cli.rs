//! Command-line interface
//!
//! Flags override values from the optional `--config` JSON file, which in turn overrides
//! the built-in defaults.

use crate::config::Config;
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Populate an offline NuGet feed from a package list
#[derive(Debug, Parser)]
#[command(name = "nupkg-restore", version, about, long_about = None)]
pub struct Cli {
    /// Offline feed directory to populate
    #[arg(long, value_name = "DIR")]
    pub feed: Option<PathBuf>,

    /// File listing `<name> <version>` pairs, one per line
    #[arg(long, value_name = "FILE")]
    pub packages: Option<PathBuf>,

    /// Gallery URL or local directory of pre-placed archives
    #[arg(long, value_name = "URL|DIR")]
    pub source: Option<String>,

    /// Staging directory for in-flight downloads
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Bearer token for the gallery
    #[arg(long, env = "NUPKG_RESTORE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Print every skipped and restored package
    #[arg(short, long)]
    pub verbose: bool,

    /// Packages processed at the same time
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Attempts per package before it is reported as failed
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long, value_name = "SECS")]
    pub retry_delay_secs: Option<u64>,

    /// Timeout for a single archive download, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Reject packages without a signature
    #[arg(long)]
    pub require_signed: bool,

    /// JSON configuration file applied before the flags above
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Build the run configuration: defaults, then `--config`, then flags
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };

        if let Some(feed) = self.feed {
            config.feed_dir = feed;
        }
        if let Some(packages) = self.packages {
            config.packages_file = packages;
        }
        if let Some(source) = self.source {
            config.source = source.parse()?;
        }
        if let Some(download_dir) = self.download_dir {
            config.download_dir = download_dir;
        }
        if self.token.is_some() {
            config.token = self.token;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(secs) = self.retry_delay_secs {
            config.retry.backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = self.timeout_secs {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        config.verbose |= self.verbose;
        config.trust.require_signed |= self.require_signed;

        Ok(config)
    }
}

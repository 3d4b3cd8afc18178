//! Restore configurations for tests

use nupkg_restore::{Config, RetryConfig, SourceLocation};
use std::path::Path;
use std::time::Duration;

/// Configuration rooted in `root` with fast retries
///
/// The feed lives in `<root>/feed`, staging in `<root>/staging`.
pub fn test_config(root: &Path, source: SourceLocation) -> Config {
    Config {
        feed_dir: root.join("feed"),
        packages_file: root.join("packages.txt"),
        source,
        download_dir: root.join("staging"),
        concurrency: 2,
        fetch_timeout: Duration::from_secs(10),
        retry: RetryConfig {
            max_attempts: 2,
            backoff: Duration::from_millis(10),
            ..Default::default()
        },
        ..Default::default()
    }
}

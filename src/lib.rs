//! # nupkg-restore
//!
//! Populates an offline NuGet feed from a list of `<name> <version>` package references.
//!
//! ## Design Philosophy
//!
//! nupkg-restore is designed to be:
//! - **Idempotent** - Packages already present and valid in the feed are skipped
//! - **Bounded** - A fixed worker pool caps concurrent downloads and extractions
//! - **Isolated** - One package failing never stops the others
//! - **Event-driven** - Consumers subscribe to events instead of parsing logs
//!
//! ## Quick Start
//!
//! ```no_run
//! use nupkg_restore::{Config, Restorer};
//! use nupkg_restore::reference_set::parse_references;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         feed_dir: "/srv/offline-feed".into(),
//!         packages_file: "packages.txt".into(),
//!         ..Default::default()
//!     };
//!
//!     let restorer = Restorer::from_config(config)?;
//!
//!     // Subscribe to events
//!     let mut events = restorer.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let references = parse_references("Newtonsoft.Json 13.0.3\nSerilog 3.1.1\n");
//!     let report = restorer.run_all(references, &CancellationToken::new()).await?;
//!     assert!(report.is_success());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command-line interface
pub mod cli;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Package extraction and trust verification
pub mod extraction;
/// Offline feed layout and membership checks
pub mod feed;
/// Archive retrieval
pub mod fetch;
/// Concurrent fetch-and-populate pipeline
pub mod pipeline;
/// Package list parsing
pub mod reference_set;
/// Console rendering of events
pub mod report;
/// Retry logic with backoff
pub mod retry;
/// Staging slots for in-flight archives
pub mod staging;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, RetryConfig, SourceLocation, TrustPolicy};
pub use error::{Error, ExtractError, FetchError, Result};
pub use extraction::{NupkgExtractor, PackageExtractor};
pub use fetch::{ArchiveFetcher, DirectoryFetcher, HttpFetcher};
pub use pipeline::{BatchReport, BatchResult, Restorer};
pub use types::{
    Event, FailureReason, FeedStatus, IssueSeverity, ItemOutcome, PackageReference,
    SignatureIssue,
};

use tokio_util::sync::CancellationToken;

/// Cancel `cancel` when the process receives a termination signal
///
/// Spawns a background task that waits for a signal and then cancels the token, which
/// aborts in-flight fetches and backoff waits. Packages already extracted stay in the feed.
///
/// On Unix both SIGTERM and SIGINT cancel; elsewhere only Ctrl+C does.
pub fn cancel_on_signal(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = wait_for_signal() => {
                tracing::warn!("Cancelling restore, in-flight packages will be reported as failed");
                cancel.cancel();
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "SIGINT handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = terminate => tracing::info!("SIGTERM received"),
        _ = interrupt => tracing::info!("SIGINT received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl+C received");
}

//! Concurrent fetch-and-populate pipeline
//!
//! [`Restorer`] runs every package reference through the per-item retry controller on a
//! fixed-size worker pool. Workers pull references from a shared work queue and push
//! `(reference, outcome)` pairs onto a result channel; the caller drains the channel
//! into a [`BatchResult`] and then joins the pool, so [`Restorer::run_all`] only returns
//! once every reference has a terminal outcome.
//!
//! # Example
//!
//! ```no_run
//! use nupkg_restore::{Config, Restorer};
//! use nupkg_restore::reference_set::load_references;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> nupkg_restore::Result<()> {
//! let config = Config {
//!     feed_dir: "/srv/offline-feed".into(),
//!     packages_file: "packages.txt".into(),
//!     ..Default::default()
//! };
//! let references = load_references(&config.packages_file).await?;
//! let restorer = Restorer::from_config(config)?;
//! let report = restorer.run_all(references, &CancellationToken::new()).await?;
//! println!("{} failed", report.failed);
//! # Ok(())
//! # }
//! ```

mod item;
mod progress;


pub use progress::{BatchReport, BatchResult, Milestone, PROGRESS_STEP_PERCENT};

use crate::config::Config;
use crate::error::Result;
use crate::extraction::{NupkgExtractor, PackageExtractor};
use crate::fetch::{self, ArchiveFetcher};
use crate::types::{Event, FailureReason, ItemOutcome, PackageReference};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Restores a batch of packages into the offline feed (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Restorer {
    /// Run configuration
    pub(crate) config: Arc<Config>,
    /// Archive source
    pub(crate) fetcher: Arc<dyn ArchiveFetcher>,
    /// Feed writer
    pub(crate) extractor: Arc<dyn PackageExtractor>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl Restorer {
    /// Create a restorer from explicit collaborators
    pub fn new(
        config: Config,
        fetcher: Arc<dyn ArchiveFetcher>,
        extractor: Arc<dyn PackageExtractor>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            config: Arc::new(config),
            fetcher,
            extractor,
            event_tx,
        }
    }

    /// Create a restorer using the fetcher for the configured source and the nupkg extractor
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = fetch::from_config(&config)?;
        let extractor = NupkgExtractor::new(config.trust.clone()).with_source(config.source.to_string());
        Ok(Self::new(config, fetcher, Arc::new(extractor)))
    }

    /// Subscribe to batch events
    ///
    /// Receivers that fall behind by more than the channel capacity lose the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Emit an event to all subscribers; dropped if nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Restore every reference, returning once each has a terminal outcome
    ///
    /// References naming the same feed entry are processed once, under the first spelling
    /// supplied. One reference failing never stops the others. Cancelling `cancel` aborts in-flight fetches and backoff waits; the
    /// affected references are reported as [`FailureReason::Cancelled`].
    pub async fn run_all(
        &self,
        references: impl IntoIterator<Item = PackageReference>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let started = Instant::now();
        let mut stems = HashSet::new();
        let references: Vec<PackageReference> = references
            .into_iter()
            .filter(|reference| stems.insert(reference.file_stem()))
            .collect();
        let total = references.len();
        let workers = self.config.concurrency.max(1).min(total);

        tokio::fs::create_dir_all(&self.config.feed_dir).await?;
        tokio::fs::create_dir_all(&self.config.download_dir).await?;

        info!(
            total,
            workers,
            feed = %self.config.feed_dir.display(),
            source = %self.fetcher.describe(),
            "starting restore batch"
        );
        self.emit_event(Event::BatchStarted {
            total,
            concurrency: workers,
        });

        let (work_tx, work_rx) = mpsc::channel(total.max(1));
        for reference in &references {
            if work_tx.send(reference.clone()).await.is_err() {
                break;
            }
        }
        drop(work_tx);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let (result_tx, mut result_rx) = mpsc::channel(workers.max(1) * 2);
        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            let restorer = self.clone();
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            pool.spawn(async move {
                loop {
                    let next = work_rx.lock().await.recv().await;
                    let Some(reference) = next else { break };
                    let outcome = restorer.restore_item(&reference, &cancel).await;
                    if result_tx.send((reference, outcome)).await.is_err() {
                        break;
                    }
                }
                debug!(worker_id, "restore worker finished");
            });
        }
        drop(result_tx);

        let batch = BatchResult::new(total);
        let mut outcomes = Vec::with_capacity(total);
        while let Some((reference, outcome)) = result_rx.recv().await {
            self.record(&batch, &outcome);
            outcomes.push((reference, outcome));
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "restore worker panicked");
            }
        }

        let reported: HashSet<PackageReference> =
            outcomes.iter().map(|(r, _)| r.clone()).collect();
        for reference in references.into_iter().filter(|r| !reported.contains(r)) {
            let reason = FailureReason::Extraction {
                detail: "worker panicked".into(),
            };
            error!(%reference, "no outcome reported for package");
            self.emit_event(Event::ItemFailed {
                reference: reference.clone(),
                attempts: 0,
                reason: reason.clone(),
            });
            let outcome = ItemOutcome::Failed {
                reason,
                attempts: 0,
            };
            self.record(&batch, &outcome);
            outcomes.push((reference, outcome));
        }

        let report = batch.into_report(outcomes, started.elapsed());
        info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "restore batch finished"
        );
        self.emit_event(Event::BatchFinished {
            succeeded: report.succeeded,
            skipped: report.skipped,
            failed: report.failed,
        });

        Ok(report)
    }

    fn record(&self, batch: &BatchResult, outcome: &ItemOutcome) {
        if let Some(milestone) = batch.record(outcome) {
            self.emit_event(Event::Progress {
                completed: milestone.completed,
                total: milestone.total,
                percent: milestone.percent,
            });
        }
    }
}

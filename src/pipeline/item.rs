//! Per-reference retry controller

use super::Restorer;
use crate::feed;
use crate::retry::{Retried, RetryFailure, retry_with_backoff};
use crate::staging::StagingSlot;
use crate::types::{Event, FailureReason, FeedStatus, ItemOutcome, PackageReference};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl Restorer {
    /// Drive one reference to a terminal outcome
    ///
    /// A valid feed entry short-circuits to [`ItemOutcome::Skipped`]. An invalid entry is
    /// deleted and the package fetched again. Otherwise fetch and extract run in a bounded
    /// retry loop; every attempt gets its own staging slot, released before the next
    /// attempt starts.
    pub(crate) async fn restore_item(
        &self,
        reference: &PackageReference,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        if cancel.is_cancelled() {
            return self.finish_failed(reference, FailureReason::Cancelled, 0);
        }

        let feed_root = &self.config.feed_dir;
        let stale_entry = match feed::check_membership(reference, feed_root).await {
            Ok(FeedStatus::PresentValid) => {
                debug!(%reference, "already present in feed");
                self.emit_event(Event::ItemSkipped {
                    reference: reference.clone(),
                });
                return ItemOutcome::Skipped;
            }
            Ok(FeedStatus::Absent) => false,
            Ok(FeedStatus::PresentInvalid { reason }) => {
                warn!(%reference, %reason, "removing invalid feed entry");
                self.emit_event(Event::InvalidEntryRemoved {
                    reference: reference.clone(),
                    reason,
                });
                true
            }
            Err(e) => {
                warn!(%reference, error = %e, "feed membership check failed, replacing entry");
                self.emit_event(Event::InvalidEntryRemoved {
                    reference: reference.clone(),
                    reason: format!("entry could not be inspected: {e}"),
                });
                true
            }
        };
        let stale_entry = AtomicBool::new(stale_entry);
        let stale_entry = &stale_entry;

        let max_attempts = self.config.retry.max_attempts;
        let result = retry_with_backoff(
            &self.config.retry,
            cancel,
            |attempt| self.attempt(reference, attempt, stale_entry, cancel),
            |reason: &FailureReason, attempt| {
                if !matches!(reason, FailureReason::Cancelled) {
                    self.emit_event(Event::AttemptFailed {
                        reference: reference.clone(),
                        attempt,
                        max_attempts,
                        reason: reason.clone(),
                    });
                }
            },
        )
        .await;

        match result {
            Ok(Retried {
                value: entry,
                attempts,
            }) => {
                info!(%reference, attempts, entry = %entry.display(), "package restored");
                self.emit_event(Event::ItemRestored {
                    reference: reference.clone(),
                    attempts,
                });
                ItemOutcome::Succeeded { attempts }
            }
            Err(RetryFailure {
                error,
                attempts,
                cancelled,
            }) => {
                let reason = if cancelled {
                    FailureReason::Cancelled
                } else {
                    error
                };
                self.finish_failed(reference, reason, attempts)
            }
        }
    }

    /// One fetch + extract attempt with its own staging slot
    async fn attempt(
        &self,
        reference: &PackageReference,
        attempt: u32,
        stale_entry: &AtomicBool,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FailureReason> {
        if cancel.is_cancelled() {
            return Err(FailureReason::Cancelled);
        }

        if stale_entry.load(Ordering::SeqCst) {
            feed::remove_entry(reference, &self.config.feed_dir)
                .await
                .map_err(|e| FailureReason::Extraction {
                    detail: format!("failed to remove invalid feed entry: {e}"),
                })?;
            stale_entry.store(false, Ordering::SeqCst);
        }

        debug!(%reference, attempt, "starting attempt");
        let slot = StagingSlot::for_reference(&self.config.download_dir, reference);
        let result = self
            .fetch_and_extract(reference, slot.path(), cancel)
            .await;

        let staged = slot.path().to_path_buf();
        if let Err(e) = slot.release().await {
            warn!(%reference, path = %staged.display(), error = %e, "failed to remove staging file");
        }

        result
    }

    async fn fetch_and_extract(
        &self,
        reference: &PackageReference,
        staged: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FailureReason> {
        let bytes = self.fetcher.fetch(reference, staged, cancel).await?;
        debug!(%reference, bytes, "archive staged");

        if cancel.is_cancelled() {
            return Err(FailureReason::Cancelled);
        }

        let entry = self
            .extractor
            .extract(reference, staged, &self.config.feed_dir)
            .await?;
        Ok(entry)
    }

    fn finish_failed(
        &self,
        reference: &PackageReference,
        reason: FailureReason,
        attempts: u32,
    ) -> ItemOutcome {
        warn!(%reference, attempts, class = reason.class(), error = %reason, "package failed");
        self.emit_event(Event::ItemFailed {
            reference: reference.clone(),
            attempts,
            reason: reason.clone(),
        });
        ItemOutcome::Failed { reason, attempts }
    }
}

//! Batch-wide outcome aggregation and progress milestones

use crate::types::{ItemOutcome, PackageReference};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Progress is reported each time completion crosses a multiple of this percentage
pub const PROGRESS_STEP_PERCENT: u32 = 5;

/// A progress milestone worth reporting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Milestone {
    /// References with a terminal outcome when the milestone was crossed
    pub completed: usize,
    /// Total references in the batch
    pub total: usize,
    /// Milestone percentage
    pub percent: u32,
}

/// Thread-safe accumulator of terminal outcomes
///
/// Each reference must be recorded exactly once. The batch is successful until the first
/// failed outcome is recorded and can never become successful again.
#[derive(Debug)]
pub struct BatchResult {
    total: usize,
    processed: AtomicUsize,
    skipped: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    last_milestone: Mutex<u32>,
}

impl BatchResult {
    /// Create an accumulator for a batch of `total` references
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            last_milestone: Mutex::new(0),
        }
    }

    /// Record one terminal outcome, returning a milestone if one was crossed
    pub fn record(&self, outcome: &ItemOutcome) -> Option<Milestone> {
        match outcome {
            ItemOutcome::Skipped => self.skipped.fetch_add(1, Ordering::SeqCst),
            ItemOutcome::Succeeded { .. } => self.succeeded.fetch_add(1, Ordering::SeqCst),
            ItemOutcome::Failed { .. } => self.failed.fetch_add(1, Ordering::SeqCst),
        };
        let completed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;

        let percent = if completed >= self.total {
            100
        } else {
            let raw = (completed * 100 / self.total) as u32;
            raw - raw % PROGRESS_STEP_PERCENT
        };

        let mut last = self
            .last_milestone
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if percent > *last {
            *last = percent;
            Some(Milestone {
                completed,
                total: self.total,
                percent,
            })
        } else {
            None
        }
    }

    /// True iff no failed outcome has been recorded
    pub fn is_success(&self) -> bool {
        self.failed.load(Ordering::SeqCst) == 0
    }

    /// References recorded so far
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Freeze the counters into a report
    pub fn into_report(
        self,
        outcomes: Vec<(PackageReference, ItemOutcome)>,
        elapsed: Duration,
    ) -> BatchReport {
        BatchReport {
            total: self.total,
            skipped: self.skipped.into_inner(),
            succeeded: self.succeeded.into_inner(),
            failed: self.failed.into_inner(),
            outcomes,
            elapsed,
        }
    }
}

/// Final summary of a batch run
#[derive(Clone, Debug)]
pub struct BatchReport {
    /// Unique references in the batch
    pub total: usize,
    /// Already present in the feed
    pub skipped: usize,
    /// Restored this run
    pub succeeded: usize,
    /// Failed after exhausting attempts (or cancelled)
    pub failed: usize,
    /// Every reference with its terminal outcome, in completion order
    pub outcomes: Vec<(PackageReference, ItemOutcome)>,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl BatchReport {
    /// True iff no reference failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Outcome recorded for `reference`
    pub fn outcome(&self, reference: &PackageReference) -> Option<&ItemOutcome> {
        self.outcomes
            .iter()
            .find(|(r, _)| r == reference)
            .map(|(_, outcome)| outcome)
    }
}

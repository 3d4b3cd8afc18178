//! Console rendering of batch events
//!
//! Failures go to stderr with enough detail to diagnose without a verbose re-run:
//! reference, error class and attempt count, plus one line per signature issue.
//! Progress milestones and the final summary go to stdout. Per-package skip and success
//! lines only appear in verbose mode.

use crate::pipeline::BatchReport;
use crate::types::{Event, FailureReason, ItemOutcome};
use std::fmt::Write as _;

/// Output stream for a console line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Text to print for one event (may span several lines)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleLine {
    /// Where to print
    pub stream: Stream,
    /// What to print, without a trailing newline
    pub text: String,
}

impl ConsoleLine {
    fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stdout,
            text: text.into(),
        }
    }

    fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stderr,
            text: text.into(),
        }
    }

    /// Write the line to its stream
    pub fn print(&self) {
        match self.stream {
            Stream::Stdout => println!("{}", self.text),
            Stream::Stderr => eprintln!("{}", self.text),
        }
    }
}

/// Render an event, or `None` if it prints nothing at this verbosity
pub fn render(event: &Event, verbose: bool) -> Option<ConsoleLine> {
    match event {
        Event::BatchStarted { total, concurrency } => verbose.then(|| {
            ConsoleLine::stdout(format!(
                "Processing {total} package(s) with {concurrency} worker(s)"
            ))
        }),
        Event::ItemSkipped { reference } => verbose
            .then(|| ConsoleLine::stdout(format!("Package {reference} is already in the feed."))),
        Event::InvalidEntryRemoved { reference, reason } => Some(ConsoleLine::stderr(format!(
            "Warning: removed invalid feed entry for {reference} ({reason}); fetching it again."
        ))),
        Event::AttemptFailed {
            reference,
            attempt,
            max_attempts,
            reason,
        } => Some(ConsoleLine::stderr(describe_failure(
            &format!("Attempt {attempt}/{max_attempts} for {reference} failed"),
            reason,
        ))),
        Event::ItemRestored {
            reference,
            attempts,
        } => verbose.then(|| {
            let text = if *attempts > 1 {
                format!("Package {reference} expanded successfully after {attempts} attempts.")
            } else {
                format!("Package {reference} expanded successfully.")
            };
            ConsoleLine::stdout(text)
        }),
        Event::ItemFailed {
            reference,
            attempts,
            reason,
        } => Some(ConsoleLine::stderr(describe_failure(
            &format!("Failed to restore {reference} after {attempts} attempt(s)"),
            reason,
        ))),
        Event::Progress {
            completed,
            total,
            percent,
        } => Some(ConsoleLine::stdout(format!(
            "Progress: {percent}% ({completed}/{total})"
        ))),
        Event::BatchFinished {
            succeeded,
            skipped,
            failed,
        } => Some(ConsoleLine::stdout(format!(
            "Done: {succeeded} restored, {skipped} already present, {failed} failed."
        ))),
    }
}

/// Notice printed when a console subscriber fell behind and lost events
pub fn events_dropped(skipped: u64) -> ConsoleLine {
    ConsoleLine::stderr(format!(
        "Warning: console output fell behind, {skipped} event(s) dropped; failures are repeated below."
    ))
}

/// Terminal failure lines for every failed package in `report`
///
/// Printed after the batch when live events were dropped, so no failure goes unreported.
pub fn failures(report: &BatchReport) -> Vec<ConsoleLine> {
    report
        .outcomes
        .iter()
        .filter_map(|(reference, outcome)| match outcome {
            ItemOutcome::Failed { reason, attempts } => render(
                &Event::ItemFailed {
                    reference: reference.clone(),
                    attempts: *attempts,
                    reason: reason.clone(),
                },
                false,
            ),
            _ => None,
        })
        .collect()
}

fn describe_failure(headline: &str, reason: &FailureReason) -> String {
    let mut text = format!("{headline}: {}: {reason}", reason.class());
    if let FailureReason::Signature { issues, .. } = reason {
        for issue in issues {
            // String formatting cannot fail
            let _ = write!(text, "\n    Issue: {issue}");
        }
    }
    text
}

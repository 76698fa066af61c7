// src/crawl/report.rs
// =============================================================================
// End-of-run aggregation of every task's result.
//
// The supervisor feeds each TaskReport in here. The process exit code comes
// from `is_success()`: any failed task at all makes the run a failure.
// =============================================================================

use serde::Serialize;
use url::Url;

use crate::crawl::task::Outcome;
use crate::error::{MirrorError, Result};
use crate::local::LinkOutcome;

/// Counters for one crawl, serializable for `--json`.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CrawlReport {
    pub listed: usize,
    /// Entries handed on for fetching by listings.
    pub queued: usize,
    pub downloaded: usize,
    pub bytes: u64,
    pub redirected: usize,
    pub linked: usize,
    pub stale_links: usize,
    /// Files or links that already existed locally.
    pub skipped: usize,
    pub visited_before: usize,
    pub removed: usize,
    pub removal_failures: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<Failure>,
}

/// One failed task.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub url: String,
    pub kind: &'static str,
    pub error: String,
}

impl CrawlReport {
    pub fn record(&mut self, url: &Url, result: &Result<Outcome>) {
        match result {
            Ok(outcome) => self.record_outcome(outcome),
            Err(e) => self.record_failure(url.to_string(), e),
        }
    }

    fn record_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::VisitedBefore => self.visited_before += 1,
            Outcome::Redirected { link } => {
                self.redirected += 1;
                match link {
                    Some(LinkOutcome::Created) => self.linked += 1,
                    Some(LinkOutcome::Existing) => self.skipped += 1,
                    Some(LinkOutcome::Stale { .. }) => self.stale_links += 1,
                    None => {}
                }
            }
            Outcome::Listed {
                queued,
                removed,
                removal_failures,
            } => {
                self.listed += 1;
                self.queued += queued;
                self.removed += removed;
                self.removal_failures += removal_failures;
            }
            Outcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes += bytes;
            }
            Outcome::AlreadyPresent => self.skipped += 1,
        }
    }

    fn record_failure(&mut self, url: String, error: &MirrorError) {
        self.failed += 1;
        self.failures.push(Failure {
            url,
            kind: error.kind(),
            error: error.to_string(),
        });
    }

    /// A task that panicked; its URL is lost with the task.
    pub fn record_panic(&mut self, message: String) {
        self.failed += 1;
        self.failures.push(Failure {
            url: String::new(),
            kind: "panic",
            error: message,
        });
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

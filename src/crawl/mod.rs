// src/crawl/mod.rs
// =============================================================================
// The crawl-and-reconcile engine.
//
// Features:
// - Exactly-once handling per canonical URL, however many pages link to it
// - Remote listing vs local directory reconciliation (fetch new, drop stale)
// - Bounded number of in-flight requests
// - Explicit completion barrier and per-run failure aggregation
//
// Submodules:
// - visited: the concurrent claim set
// - reconcile: remote entries from hrefs + the set-difference itself
// - task: the per-URL state machine and the shared CrawlContext
// - queue: the supervisor that spawns tasks and waits for all of them
// - report: end-of-run counters
// =============================================================================

mod queue;
mod reconcile;
mod report;
mod task;
mod visited;

pub use queue::crawl;
pub use report::CrawlReport;
pub use task::{CrawlContext, CrawlTask};

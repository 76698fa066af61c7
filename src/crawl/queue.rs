// src/crawl/queue.rs
// =============================================================================
// The crawl supervisor: spawns tasks, collects results, knows when it's over.
//
// How it works:
// 1. Every seed URL becomes a task spawned onto a JoinSet
// 2. Each finished task hands back its result and the children it found
// 3. Children are spawned BEFORE the parent is counted as finished, so the
//    outstanding count cannot touch zero while work is still being discovered
// 4. When the JoinSet drains, the outstanding count is zero and the crawl
//    is complete
//
// Tasks run on the multi-threaded tokio runtime, so siblings really do run
// in parallel; the only thing throttling them is the request limiter in
// the shared context.
//
// Rust concepts:
// - JoinSet: a set of spawned tasks you can await in completion order
// - Arc: the shared CrawlContext is reference-counted across tasks
// =============================================================================

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, trace};

use crate::crawl::report::CrawlReport;
use crate::crawl::task::{run_task, CrawlContext, CrawlTask, TaskReport};

/// Crawls from `seeds` until no task is left, then returns the totals.
pub async fn crawl(ctx: Arc<CrawlContext>, seeds: Vec<CrawlTask>) -> CrawlReport {
    let mut running: JoinSet<TaskReport> = JoinSet::new();
    let mut outstanding: usize = 0;
    let mut report = CrawlReport::default();

    for seed in seeds {
        outstanding += 1;
        running.spawn(run_task(ctx.clone(), seed));
    }

    while let Some(joined) = running.join_next().await {
        match joined {
            Ok(finished) => {
                outstanding += finished.children.len();
                for child in finished.children {
                    running.spawn(run_task(ctx.clone(), child));
                }
                report.record(&finished.url, &finished.result);
            }
            Err(e) => {
                error!(error = %e, "crawl task panicked");
                report.record_panic(e.to_string());
            }
        }

        outstanding -= 1;
        trace!(outstanding, "task finished");
    }

    debug_assert_eq!(outstanding, 0);
    debug!(urls = ctx.visited.len(), "crawl drained");
    report
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why not let tasks spawn their own children?
//    - Then nobody would own the "is anything still running?" question
//    - Fire-and-forget spawning also loses the child's result; here every
//      result comes back to one place and ends up in the report
//
// 2. Why is there no depth limit?
//    - A mirror has to be complete. Cycles (a listing linking to an
//      ancestor) are cut by the visited set, not by depth
//
// 3. What about the call stack?
//    - Nothing recurses: a task returns before its children start, so a
//      very deep remote tree never grows the stack
// -----------------------------------------------------------------------------

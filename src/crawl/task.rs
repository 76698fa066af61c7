// src/crawl/task.rs
// =============================================================================
// One crawl task: everything that happens to a single URL.
//
// States:
//   Pending -> Claiming -> Fetching -> Classifying
//           -> Redirecting | Listing | Downloading -> Done | Failed
//
// - Claiming: the visited set decides whether we are the one task that
//   handles this URL. Losing the claim is a quiet Done, not an error.
// - Fetching: GET under one slot of the request limiter.
// - Classifying: final URL must be in-boundary, status must be 2xx, then
//   (a) final URL differs from the requested one      -> Redirecting
//   (b) directory URL (trailing slash) served as HTML -> Listing
//   (c) anything else                                  -> Downloading
//
// An HTML page without a trailing slash (README.html) is a file like any
// other: listings advertise directories with the slash.
//
// A task never spawns anything itself. URLs it wants crawled next are
// handed back in TaskReport::children and the supervisor (queue.rs) spawns
// them. That keeps the outstanding-task count in one place.
// =============================================================================

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::stream;
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::MirrorConfig;
use crate::crawl::reconcile::{reconcile, remote_entries};
use crate::crawl::visited::VisitedSet;
use crate::error::{MirrorError, Result};
use crate::local::{ensure_link, read_local, remove_local, write_atomic, LinkOutcome};
use crate::remote::{
    build_client, extract_hrefs, fetch, normalize, relative_path, same_resource, Boundary,
    Fetched,
};

/// State shared by every task of one crawl.
///
/// Passed around explicitly (behind an Arc) so two crawls in one process,
/// e.g. two tests, never see each other's visited URLs.
#[derive(Debug)]
pub struct CrawlContext {
    pub client: Client,
    pub boundary: Boundary,
    pub visited: VisitedSet,
    /// Caps in-flight requests, not in-flight tasks.
    pub limiter: Semaphore,
    /// Longest wait for response headers or for the next body chunk.
    pub idle_timeout: Duration,
    /// Skip copying response bodies; every other step still runs.
    pub dry_run: bool,
}

impl CrawlContext {
    pub fn new(
        client: Client,
        idle_timeout: Duration,
        boundary: Boundary,
        workers: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            client,
            boundary,
            visited: VisitedSet::new(),
            limiter: Semaphore::new(workers),
            idle_timeout,
            dry_run,
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Result<Self> {
        let client = build_client(config.timeout, config.bind)?;
        Ok(Self::new(
            client,
            config.timeout,
            config.boundary.clone(),
            config.workers,
            config.dry_run,
        ))
    }
}

/// A URL to crawl and the storage root it is mirrored into.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub url: Url,
    pub root: PathBuf,
}

/// How a task that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Another task already claimed this URL.
    VisitedBefore,
    /// `link` is None when both URLs map to the same local path.
    Redirected { link: Option<LinkOutcome> },
    Listed {
        queued: usize,
        removed: usize,
        removal_failures: usize,
    },
    Downloaded { bytes: u64 },
    /// The file already exists locally; nothing was written.
    AlreadyPresent,
}

/// What a finished task hands back to the supervisor.
#[derive(Debug)]
pub struct TaskReport {
    pub url: Url,
    pub result: Result<Outcome>,
    /// Tasks to spawn next. May be non-empty even when `result` is an error.
    pub children: Vec<CrawlTask>,
}

/// Runs one task to completion. Never panics on I/O or network errors.
pub async fn run_task(ctx: Arc<CrawlContext>, task: CrawlTask) -> TaskReport {
    let mut children = Vec::new();
    let result = process(&ctx, &task, &mut children).await;

    match &result {
        Err(e) if e.is_fatal() => error!(url = %task.url, error = %e, "task failed"),
        Err(e) => warn!(url = %task.url, error = %e, "task failed"),
        Ok(_) => {}
    }

    TaskReport {
        url: task.url,
        result,
        children,
    }
}

async fn process(
    ctx: &CrawlContext,
    task: &CrawlTask,
    children: &mut Vec<CrawlTask>,
) -> Result<Outcome> {
    debug!(url = %task.url, "handling");

    if !ctx.visited.claim(&task.url) {
        debug!(url = %task.url, "visited before");
        return Ok(Outcome::VisitedBefore);
    }

    let fetched = fetch(&ctx.client, &ctx.limiter, &task.url, ctx.idle_timeout).await?;

    ctx.boundary.validate(&fetched.final_url)?;
    info!(url = %fetched.final_url, status = fetched.status.as_u16(), "status");
    if !fetched.status.is_success() {
        return Err(MirrorError::HttpStatus {
            url: fetched.final_url.to_string(),
            status: fetched.status.as_u16(),
        });
    }

    if !same_resource(&task.url, &fetched.final_url) {
        let final_url = fetched.final_url.clone();
        drop(fetched);
        redirect(task, final_url, children).await
    } else if is_directory(&task.url) && fetched.is_html() {
        list(task, fetched, children).await
    } else {
        download(ctx, task, fetched).await
    }
}

fn is_directory(url: &Url) -> bool {
    url.path().ends_with('/')
}

async fn redirect(
    task: &CrawlTask,
    final_url: Url,
    children: &mut Vec<CrawlTask>,
) -> Result<Outcome> {
    let is_dir = final_url.path().ends_with('/');
    let final_url = normalize(&final_url, is_dir);

    let from = task.root.join(relative_path(&task.url));
    let to = task.root.join(relative_path(&final_url));

    // the target gets crawled whatever happens to the link; dedup ends the chain
    children.push(CrawlTask {
        url: final_url.clone(),
        root: task.root.clone(),
    });

    if from == to {
        debug!(url = %task.url, final_url = %final_url, "redirect maps to same path");
        return Ok(Outcome::Redirected { link: None });
    }

    let link = ensure_link(&from, &to).await?;
    match &link {
        LinkOutcome::Created => {
            info!(link = %from.display(), target = %to.display(), "symlink created")
        }
        LinkOutcome::Existing => debug!(link = %from.display(), "already exists"),
        LinkOutcome::Stale { current } => warn!(
            link = %from.display(),
            current = %current.display(),
            target = %to.display(),
            "existing symlink points elsewhere, left untouched"
        ),
    }

    Ok(Outcome::Redirected { link: Some(link) })
}

async fn list(
    task: &CrawlTask,
    fetched: Fetched,
    children: &mut Vec<CrawlTask>,
) -> Result<Outcome> {
    let dir_url = fetched.final_url.clone();
    let rel_dir = relative_path(&dir_url);
    let dir = task.root.join(&rel_dir);

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| MirrorError::fs("create directory", &dir, e))?;

    let body = fetched.text().await?;
    let hrefs = extract_hrefs(&body);
    let remote = remote_entries(&dir_url, &hrefs);
    let local = read_local(&task.root, &rel_dir).await?;

    let decision = reconcile(&remote, &local);
    if decision.is_noop() {
        debug!(url = %dir_url, "directory in sync");
    }
    debug!(
        url = %dir_url,
        remote = remote.len(),
        local = local.len(),
        fetch = decision.to_fetch.len(),
        remove = decision.to_remove.len(),
        "reconciled"
    );

    // removals first: a remove-then-fetch pair must not race its own download
    let mut removed = 0;
    let mut removal_failures = 0;
    for entry in &decision.to_remove {
        match remove_local(&task.root, entry).await {
            Ok(()) => {
                removed += 1;
                info!(path = %task.root.join(&entry.rel_path).display(), "removed stale entry");
            }
            Err(e) => {
                removal_failures += 1;
                warn!(error = %e, "failed to remove stale entry");
            }
        }
    }

    let queued = decision.to_fetch.len();
    for entry in decision.to_fetch {
        info!(url = %entry.url, "queued");
        children.push(CrawlTask {
            url: entry.url,
            root: task.root.clone(),
        });
    }

    Ok(Outcome::Listed {
        queued,
        removed,
        removal_failures,
    })
}

async fn download(ctx: &CrawlContext, task: &CrawlTask, fetched: Fetched) -> Result<Outcome> {
    let rel = relative_path(&fetched.final_url);
    let path = task.root.join(&rel);

    let target = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !rel.as_os_str().is_empty() => Some((parent, name)),
        _ => None,
    };
    let Some((parent, name)) = target else {
        return Err(MirrorError::fs(
            "download into",
            &path,
            io::Error::new(io::ErrorKind::InvalidInput, "URL maps to the storage root"),
        ));
    };
    let name = name.to_string_lossy().into_owned();

    match tokio::fs::symlink_metadata(&path).await {
        Ok(_) => {
            debug!(path = %path.display(), "exists, skipping");
            return Ok(Outcome::AlreadyPresent);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(MirrorError::fs("inspect", &path, e)),
    }

    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| MirrorError::fs("create directory", parent, e))?;

    info!(url = %fetched.final_url, path = %path.display(), "downloading");
    let bytes = if ctx.dry_run {
        drop(fetched);
        info!(path = %path.display(), "dry run, body not copied");
        write_atomic(parent, &name, stream::empty::<Result<bytes::Bytes>>()).await?
    } else {
        write_atomic(parent, &name, fetched.into_stream()).await?
    };

    info!(path = %path.display(), bytes, "downloaded");
    Ok(Outcome::Downloaded { bytes })
}

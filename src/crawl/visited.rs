// src/crawl/visited.rs
// =============================================================================
// The set of URLs some task has already claimed.
//
// claim() is THE gate against duplicate work. Many listing pages can
// discover the same URL at the same time (mirrors love "latest" links), and
// exactly one task may go on to fetch it. DashSet::insert is atomic per
// shard, so of any number of racing claims for one key exactly one sees
// `true`.
//
// Keys are canonical URLs, so "/a.txt#x" and "/./a.txt" are the same claim.
// =============================================================================

use dashmap::DashSet;
use url::Url;

use crate::remote::canonical_key;

/// Concurrent set of canonical URLs being or having been processed.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: DashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first claim of `url`'s canonical form only.
    pub fn claim(&self, url: &Url) -> bool {
        self.seen.insert(canonical_key(url))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

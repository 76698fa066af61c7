// src/crawl/reconcile.rs
// =============================================================================
// Remote listing vs local directory: what to fetch, what to delete.
//
// How it works:
// 1. remote_entries() turns the hrefs of a listing page into RemoteEntry
//    values, keeping only direct children of the directory
// 2. reconcile() compares them with the LocalEntry values of the matching
//    local directory, keyed by (path relative to the storage root, is_dir)
//
// A name that is a file on one side and a directory on the other is
// remove-then-fetch: the local entry is deleted and the remote one fetched.
// Local symlinks are the exception. They are how redirects are mirrored,
// and a listing entry "latest" that redirects to "v2/" is a file remotely
// but a link to a directory locally. A symlink therefore matches a remote
// entry of the same name whatever its type.
// Entries present on both sides are trusted as they are; there is no
// content comparison.
//
// Rust concepts:
// - HashSet<(&Path, bool)>: borrowed keys, no cloning just to compare
// - Iterators + filter/cloned: build the two output lists in one pass each
// =============================================================================

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use url::Url;

use crate::local::LocalEntry;
use crate::remote::{normalize, relative_path};

/// One child advertised by a remote listing page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteEntry {
    /// Path relative to the storage root.
    pub rel_path: PathBuf,
    pub is_dir: bool,
    /// Absolute canonical URL of the child.
    pub url: Url,
}

/// Result of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDecision {
    /// Remote entries with no local counterpart of the same type.
    pub to_fetch: Vec<RemoteEntry>,
    /// Local entries with no remote counterpart of the same type.
    pub to_remove: Vec<LocalEntry>,
}

impl SyncDecision {
    pub fn is_noop(&self) -> bool {
        self.to_fetch.is_empty() && self.to_remove.is_empty()
    }
}

/// Compares a remote listing with the local directory.
pub fn reconcile(remote: &[RemoteEntry], local: &[LocalEntry]) -> SyncDecision {
    let local_keys: HashSet<(&Path, bool)> = local
        .iter()
        .map(|e| (e.rel_path.as_path(), e.is_dir))
        .collect();
    let local_links: HashSet<&Path> = local
        .iter()
        .filter(|e| e.is_link)
        .map(|e| e.rel_path.as_path())
        .collect();
    let remote_keys: HashSet<(&Path, bool)> = remote
        .iter()
        .map(|e| (e.rel_path.as_path(), e.is_dir))
        .collect();
    let remote_names: HashSet<&Path> = remote.iter().map(|e| e.rel_path.as_path()).collect();

    let to_fetch = remote
        .iter()
        .filter(|e| {
            let path = e.rel_path.as_path();
            !local_keys.contains(&(path, e.is_dir)) && !local_links.contains(path)
        })
        .cloned()
        .collect();
    let to_remove = local
        .iter()
        .filter(|e| {
            let path = e.rel_path.as_path();
            let matched = if e.is_link {
                remote_names.contains(path)
            } else {
                remote_keys.contains(&(path, e.is_dir))
            };
            !matched
        })
        .cloned()
        .collect();

    SyncDecision {
        to_fetch,
        to_remove,
    }
}

/// Builds the remote entries of the listing at `dir_url` from its hrefs.
///
/// Hrefs resolve against `dir_url` exactly as given. Keeps only direct
/// children: same origin, exactly one more path segment, no query. That
/// drops "../", "?C=N;O=D" sort links, self links and links to other sites.
/// The first href wins when a name repeats. A URL without a trailing slash
/// is not a directory and has no children.
pub fn remote_entries(dir_url: &Url, hrefs: &[String]) -> Vec<RemoteEntry> {
    let mut dir = dir_url.clone();
    dir.set_fragment(None);
    if !dir.path().ends_with('/') {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for href in hrefs {
        let Ok(mut child) = dir.join(href) else {
            continue;
        };
        child.set_fragment(None);

        if child.query().is_some() || !same_origin(&dir, &child) {
            continue;
        }

        let Some(rest) = child.path().strip_prefix(dir.path()) else {
            continue;
        };
        let (segment, is_dir) = match rest.strip_suffix('/') {
            Some(segment) => (segment, true),
            None => (rest, false),
        };
        if segment.is_empty() || segment.contains('/') {
            continue;
        }

        let child = normalize(&child, is_dir);
        let rel_path = relative_path(&child);
        if seen.insert(rel_path.clone()) {
            entries.push(RemoteEntry {
                rel_path,
                is_dir,
                url: child,
            });
        }
    }

    entries
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    const DIR: &str = "https://example.com/pub/";

    fn hrefs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn listed(list: &[&str]) -> Vec<RemoteEntry> {
        remote_entries(&Url::parse(DIR).unwrap(), &hrefs(list))
    }

    fn on_disk(name: &str, is_dir: bool) -> LocalEntry {
        LocalEntry {
            rel_path: Path::new("pub").join(name),
            is_dir,
            is_link: false,
        }
    }

    fn link_on_disk(name: &str, to_dir: bool) -> LocalEntry {
        LocalEntry {
            is_link: true,
            ..on_disk(name, to_dir)
        }
    }

    fn names(entries: &[RemoteEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.rel_path.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_remote_entries_keep_only_direct_children() {
        let entries = listed(&[
            "?C=N;O=D",
            "../",
            "/",
            "./",
            "a.txt",
            "sub/",
            "sub/deeper.txt",
            "https://elsewhere.org/pub/x",
            "/pub/b.txt#frag",
            "a.txt",
        ]);
        assert_eq!(names(&entries), vec!["pub/a.txt", "pub/sub", "pub/b.txt"]);
        assert!(entries[1].is_dir);
        assert_eq!(entries[1].url.as_str(), "https://example.com/pub/sub/");
        assert_eq!(entries[2].url.as_str(), "https://example.com/pub/b.txt");
    }

    #[test]
    fn test_remote_entries_decode_names() {
        let entries = listed(&["my%20file.tar.gz"]);
        assert_eq!(entries[0].rel_path, PathBuf::from("pub/my file.tar.gz"));
    }

    #[test]
    fn test_html_file_has_no_children() {
        // resolving "a.txt" against README.html gives /pub/a.txt, a sibling
        let entries = remote_entries(
            &Url::parse("https://example.com/pub/README.html").unwrap(),
            &hrefs(&["a.txt", "sub/"]),
        );
        assert!(entries.is_empty());
    }

    #[test]
    fn test_empty_local_fetches_everything() {
        let remote = listed(&["a.txt", "sub/"]);
        let decision = reconcile(&remote, &[]);
        assert_eq!(names(&decision.to_fetch), vec!["pub/a.txt", "pub/sub"]);
        assert!(decision.to_remove.is_empty());
    }

    #[test]
    fn test_stale_local_file_is_removed() {
        let remote = listed(&["a.txt"]);
        let local = vec![on_disk("a.txt", false), on_disk("old.txt", false)];
        let decision = reconcile(&remote, &local);
        assert!(decision.to_fetch.is_empty());
        assert_eq!(decision.to_remove, vec![on_disk("old.txt", false)]);
    }

    #[test]
    fn test_type_mismatch_is_remove_then_fetch() {
        let remote = listed(&["x/"]);
        let local = vec![on_disk("x", false)];
        let decision = reconcile(&remote, &local);
        assert_eq!(names(&decision.to_fetch), vec!["pub/x"]);
        assert_eq!(decision.to_remove, vec![on_disk("x", false)]);
    }

    #[test]
    fn test_in_sync_is_noop() {
        let remote = listed(&["a.txt", "sub/"]);
        let local = vec![on_disk("a.txt", false), on_disk("sub", true)];
        assert!(reconcile(&remote, &local).is_noop());
    }

    #[test]
    fn test_redirect_link_matches_remote_file_entry() {
        // "latest" is listed without a slash but was mirrored as a link to v2/
        let remote = listed(&["latest", "v2/"]);
        let local = vec![link_on_disk("latest", true), on_disk("v2", true)];
        assert!(reconcile(&remote, &local).is_noop());
    }

    #[test]
    fn test_unlisted_link_is_removed() {
        let remote = listed(&["v2/"]);
        let local = vec![link_on_disk("latest", true), on_disk("v2", true)];
        let decision = reconcile(&remote, &local);
        assert!(decision.to_fetch.is_empty());
        assert_eq!(decision.to_remove, vec![link_on_disk("latest", true)]);
    }

    // name index -> is_dir, so each side has unique paths like a real directory
    fn side() -> impl Strategy<Value = HashMap<u8, bool>> {
        prop::collection::hash_map(0u8..12, any::<bool>(), 0..12)
    }

    // name index -> (is_dir, is_link)
    fn local_side() -> impl Strategy<Value = HashMap<u8, (bool, bool)>> {
        prop::collection::hash_map(0u8..12, (any::<bool>(), any::<bool>()), 0..12)
    }

    fn build(
        remote_side: &HashMap<u8, bool>,
        local_side: &HashMap<u8, (bool, bool)>,
    ) -> (Vec<RemoteEntry>, Vec<LocalEntry>) {
        let base = Url::parse(DIR).unwrap();
        let remote = remote_side
            .iter()
            .map(|(n, d)| {
                let name = format!("n{}{}", n, if *d { "/" } else { "" });
                let url = normalize(&base.join(&name).unwrap(), *d);
                RemoteEntry {
                    rel_path: relative_path(&url),
                    is_dir: *d,
                    url,
                }
            })
            .collect();
        let local = local_side
            .iter()
            .map(|(n, (d, link))| LocalEntry {
                is_link: *link,
                ..on_disk(&format!("n{}", n), *d)
            })
            .collect();
        (remote, local)
    }

    proptest! {
        #[test]
        fn prop_outputs_partition_inputs(r in side(), l in local_side()) {
            let (remote, local) = build(&r, &l);
            let decision = reconcile(&remote, &local);

            for entry in &remote {
                let present = local.iter().any(|x| {
                    x.rel_path == entry.rel_path && (x.is_link || x.is_dir == entry.is_dir)
                });
                prop_assert_eq!(decision.to_fetch.contains(entry), !present);
            }
            for entry in &local {
                let listed = remote.iter().any(|x| {
                    x.rel_path == entry.rel_path && (entry.is_link || x.is_dir == entry.is_dir)
                });
                prop_assert_eq!(decision.to_remove.contains(entry), !listed);
            }
            for f in &decision.to_fetch {
                let overlap = decision.to_remove.iter().any(|x| x.rel_path == f.rel_path && x.is_dir == f.is_dir);
                prop_assert!(!overlap);
            }
        }

        #[test]
        fn prop_applying_decision_converges(r in side(), l in local_side()) {
            let (remote, local) = build(&r, &l);
            let decision = reconcile(&remote, &local);

            let mut after: Vec<LocalEntry> = local
                .into_iter()
                .filter(|e| !decision.to_remove.contains(e))
                .collect();
            after.extend(decision.to_fetch.iter().map(|e| LocalEntry {
                rel_path: e.rel_path.clone(),
                is_dir: e.is_dir,
                is_link: false,
            }));

            prop_assert!(reconcile(&remote, &after).is_noop());
        }
    }
}

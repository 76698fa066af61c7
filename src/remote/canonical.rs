// src/remote/canonical.rs
// =============================================================================
// URL canonicalization and URL -> local path mapping.
//
// Two URLs naming the same remote resource must produce the same key, since
// the key is what the visited set deduplicates on. We:
// - drop the fragment (#section never changes what the server returns)
// - let the url crate collapse "." and ".." segments and lowercase the host
// - for directory-classified URLs, force exactly one trailing slash
//
// The local path of a URL is its path segments, percent-decoded, one URL
// segment per path component. Query strings do not take part in the path.
//
// Rust concepts:
// - PathBuf: an owned, growable filesystem path
// - Cow<str>: urlencoding::decode borrows when nothing needed decoding
// =============================================================================

use std::path::PathBuf;

use url::Url;

/// Canonical form of `url`. `is_dir` forces a single trailing slash.
pub fn normalize(url: &Url, is_dir: bool) -> Url {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    // Re-parsing runs the WHATWG path normalization again, which also
    // collapses percent-encoded dot segments (%2e%2e).
    if let Ok(reparsed) = Url::parse(canonical.as_str()) {
        canonical = reparsed;
    }

    if is_dir {
        let trimmed = canonical.path().trim_end_matches('/').to_string();
        canonical.set_path(&format!("{}/", trimmed));
    }

    canonical
}

/// Dedup key for a URL: its canonical form, with directory-ness taken from
/// the URL itself (trailing slash).
pub fn canonical_key(url: &Url) -> String {
    let is_dir = url.path().ends_with('/');
    normalize(url, is_dir).to_string()
}

/// True when `a` and `b` denote the same resource after normalization.
pub fn same_resource(a: &Url, b: &Url) -> bool {
    canonical_key(a) == canonical_key(b)
}

/// Maps a URL to a path relative to the storage root.
///
/// `http://host/pub/linux/a%20b.txt` becomes `pub/linux/a b.txt`. The host
/// root maps to the empty path.
pub fn relative_path(url: &Url) -> PathBuf {
    let mut path = PathBuf::new();
    let Some(segments) = url.path_segments() else {
        return path;
    };

    for segment in segments.filter(|s| !s.is_empty()) {
        path.push(decode_segment(segment));
    }
    path
}

// Percent-decodes one segment without letting it turn into more than one
// path component: '/' and NUL stay encoded, and dot segments that survived
// parsing are kept literally encoded so they cannot climb out of the root.
fn decode_segment(segment: &str) -> String {
    let decoded = match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        // not UTF-8 after decoding: keep the encoded form
        Err(_) => return segment.to_string(),
    };

    if decoded == "." || decoded == ".." {
        return segment.replace('.', "%2E");
    }

    decoded.replace('/', "%2F").replace('\0', "%00")
}

// src/remote/boundary.rs
// =============================================================================
// The mirror boundary: which URLs belong to the tree we are copying.
//
// A URL is in-boundary iff
// 1. its host equals the boundary host (the port is ignored, so
//    http://host:8080/pub/ and https://host/pub/ are the same tree)
// 2. its path starts with the boundary path prefix
//
// The check runs on the FINAL URL of every fetch, after redirects, because
// a redirect may legitimately point somewhere else (a CDN, another path).
// Such a branch is abandoned with OutOfBoundary; it is never fatal.
// =============================================================================

use url::Url;

use crate::error::{MirrorError, Result};

/// Host + path prefix defining the mirrored tree. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    host: String,
    prefix: String,
}

impl Boundary {
    /// Derives the boundary from a root URL: its host and its full path.
    pub fn from_url(root: &Url) -> Result<Self> {
        let host = root
            .host_str()
            .ok_or_else(|| MirrorError::Config(format!("URL has no host: {}", root)))?;

        Ok(Self {
            host: host.to_ascii_lowercase(),
            prefix: root.path().to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `true` if `url` lies inside the boundary.
    pub fn contains(&self, url: &Url) -> bool {
        let host_ok = url
            .host_str()
            .map(|h| h.eq_ignore_ascii_case(&self.host))
            .unwrap_or(false);
        if !host_ok {
            return false;
        }

        let path = url.path();
        // "/pub" is the directory "/pub/" requested without its slash
        path.starts_with(&self.prefix)
            || (self.prefix.ends_with('/') && path == self.prefix.trim_end_matches('/'))
    }

    /// Typed form of [`Boundary::contains`].
    pub fn validate(&self, url: &Url) -> Result<()> {
        if self.contains(url) {
            Ok(())
        } else {
            Err(MirrorError::OutOfBoundary {
                url: url.to_string(),
                host: self.host.clone(),
                prefix: self.prefix.clone(),
            })
        }
    }
}

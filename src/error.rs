// src/error.rs
// =============================================================================
// Error types for the mirror engine.
//
// Failure classes:
// - Network: the fetch itself failed, the server answered non-2xx, or the
//   body stopped arriving mid-transfer
// - OutOfBoundary: the final URL (after redirects) left the mirrored tree
// - Filesystem: mkdir / remove / rename / symlink / write failed
// - Parse / Config: bad seed URL or bad flag, only ever raised at startup
//
// Everything except Parse/Config is recovered by the task that hit it: the
// task logs, reports itself as failed, and its siblings carry on.
//
// Rust concepts:
// - thiserror: derives Display and std::error::Error from attributes
// - #[source]: chains the underlying error so `{:#}` prints the full cause
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while mirroring a remote tree.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The request could not be completed (DNS, connect, TLS, timeout...).
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The connection broke or stalled while headers or body were in transit.
    #[error("transfer of {url} failed: {source}")]
    Transfer {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The server answered, but not with a 2xx status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// The final URL is not under the configured host + path prefix.
    #[error("{url} is outside the mirror boundary {host}{prefix}")]
    OutOfBoundary {
        url: String,
        host: String,
        prefix: String,
    },

    /// A local filesystem operation failed.
    #[error("failed to {op} {path}: {source}")]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A seed or boundary URL could not be parsed.
    #[error("invalid URL '{input}': {source}")]
    Parse {
        input: String,
        #[source]
        source: url::ParseError,
    },

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MirrorError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn transfer(url: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transfer {
            url: url.into(),
            source,
        }
    }

    pub fn fs(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn parse(input: impl Into<String>, source: url::ParseError) -> Self {
        Self::Parse {
            input: input.into(),
            source,
        }
    }

    /// Short machine-friendly name of the failure class, used in the report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } | Self::Transfer { .. } | Self::HttpStatus { .. } => "network",
            Self::OutOfBoundary { .. } => "out_of_boundary",
            Self::Filesystem { .. } => "filesystem",
            Self::Parse { .. } => "parse",
            Self::Config(_) => "config",
        }
    }

    /// Startup errors abort the process; everything else only fails one task.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;

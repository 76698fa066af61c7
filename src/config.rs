// src/config.rs
// =============================================================================
// Validated run configuration, built once from the command line.
//
// Everything that can be wrong with the input is caught here, before a
// single request goes out:
// - seed and boundary URLs must parse and be http(s)
// - the worker count must be positive and fit the request limiter
//
// Seeds name directory listings, so each gets exactly one trailing slash.
// =============================================================================

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Semaphore;
use url::Url;

use crate::cli::Cli;
use crate::error::{MirrorError, Result};
use crate::remote::{normalize, Boundary};

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub seeds: Vec<Url>,
    pub boundary: Boundary,
    pub storage_root: PathBuf,
    pub workers: usize,
    pub dry_run: bool,
    pub bind: Option<IpAddr>,
    pub timeout: Duration,
}

impl MirrorConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.workers == 0 {
            return Err(MirrorError::Config("--workers must be at least 1".to_string()));
        }
        if cli.workers > Semaphore::MAX_PERMITS {
            return Err(MirrorError::Config(format!(
                "--workers must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }

        let seeds = cli
            .roots
            .iter()
            .map(|root| parse_http_url(root).map(|url| normalize(&url, true)))
            .collect::<Result<Vec<_>>>()?;

        let boundary_url = match &cli.boundary {
            Some(raw) => parse_http_url(raw)?,
            None => seeds
                .first()
                .cloned()
                .ok_or_else(|| MirrorError::Config("at least one root URL is required".into()))?,
        };
        let boundary = Boundary::from_url(&boundary_url)?;

        Ok(Self {
            seeds,
            boundary,
            storage_root: cli.output.clone(),
            workers: cli.workers,
            dry_run: cli.dry_run,
            bind: cli.bind,
            timeout: Duration::from_secs(cli.timeout),
        })
    }
}

fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| MirrorError::parse(raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(MirrorError::Config(format!(
            "unsupported scheme '{}' in {}",
            other, raw
        ))),
    }
}

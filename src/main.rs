// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing) according to -v / -q / RUST_LOG
// 3. Validate the arguments into a MirrorConfig
// 4. Run the crawl until every task has finished
// 5. Print the report and exit with the proper code
//    (0 = mirror complete, 1 = some tasks failed, 2 = error before crawling)
//
// Rust concepts used:
// - async/await: the crawl issues many requests concurrently
// - Arc: one CrawlContext shared by every spawned task
// - Result<T, E> and `?`: configuration errors bubble up to exit code 2
// =============================================================================

mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - validated run settings
mod crawl; // src/crawl/ - the crawl-and-reconcile engine
mod error; // src/error.rs - error taxonomy
mod local; // src/local/ - everything that touches the mirror on disk
mod remote; // src/remote/ - HTTP, URLs and listing parsing

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};

use cli::Cli;
use config::MirrorConfig;
use crawl::{crawl, CrawlContext, CrawlReport, CrawlTask};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = every task succeeded
//   Ok(1) = the crawl finished but some tasks failed
//   Err   = nothing was crawled (bad arguments, client setup failed)
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(&cli);
    debug!(?cli, "CLI arguments parsed");

    let config = MirrorConfig::from_cli(&cli)?;
    info!(
        roots = config.seeds.len(),
        host = config.boundary.host(),
        prefix = config.boundary.prefix(),
        output = %config.storage_root.display(),
        workers = config.workers,
        dry_run = config.dry_run,
        "starting mirror"
    );

    let ctx = Arc::new(CrawlContext::from_config(&config)?);
    let seeds = config
        .seeds
        .iter()
        .map(|url| CrawlTask {
            url: url.clone(),
            root: config.storage_root.clone(),
        })
        .collect();

    let report = crawl(ctx, seeds).await;
    print_results(&report, cli.json)?;

    Ok(if report.is_success() { 0 } else { 1 })
}

// RUST_LOG wins; otherwise -q means errors only and each -v adds a level.
fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // logs go to stderr so `--json` output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_results(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for failure in &report.failures {
        warn!(url = %failure.url, kind = failure.kind, "{}", failure.error);
    }
    info!(
        listed = report.listed,
        downloaded = report.downloaded,
        bytes = report.bytes,
        linked = report.linked,
        skipped = report.skipped,
        removed = report.removed,
        failed = report.failed,
        "mirror finished"
    );
    Ok(())
}

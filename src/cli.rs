// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using a
// plain struct and attributes. Parsing, --help and --version come for free.
//
// The CLI only collects raw values; turning them into a validated
// MirrorConfig happens in config.rs.
// =============================================================================

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "treemirror",
    version,
    about = "Mirror HTTP directory listings onto local storage",
    long_about = "treemirror crawls browsable HTTP directory listings and keeps a local copy in sync: \
                  new files are downloaded, files gone from the server are deleted locally, and \
                  redirects become symlinks instead of duplicate downloads."
)]
pub struct Cli {
    /// Root URLs of the directory listings to mirror
    ///
    /// Example: treemirror https://download.example.com/pub/linux/
    #[arg(required = true, value_name = "URL")]
    pub roots: Vec<String>,

    /// Local directory the tree is mirrored into
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Maximum number of requests in flight at once
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,

    /// Walk everything but publish empty files instead of copying bodies
    #[arg(long)]
    pub dry_run: bool,

    /// Only mirror URLs under this URL (default: the first root)
    #[arg(long, value_name = "URL")]
    pub boundary: Option<String>,

    /// Local IP address outgoing connections are made from
    #[arg(long, value_name = "IP")]
    pub bind: Option<IpAddr>,

    /// Seconds to wait for a connection, the response headers or the next
    /// body chunk; a transfer that keeps making progress never times out
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Print the end-of-run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

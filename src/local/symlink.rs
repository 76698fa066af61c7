// src/local/symlink.rs
// =============================================================================
// Redirects become symlinks.
//
// When http://host/pub/latest redirects to http://host/pub/v2, we do not
// download v2 twice. Instead pub/latest is created as a RELATIVE symlink to
// v2, so the mirrored tree can be moved around as a whole.
//
// Existing entries are never touched. If the remote redirect target changes,
// the old link stays; we only detect it and report it as stale.
// =============================================================================

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{MirrorError, Result};

/// What `ensure_link` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    /// Something already lives at the link path.
    Existing,
    /// A symlink exists but points somewhere else than the redirect now does.
    Stale { current: PathBuf },
}

/// Makes `from` a symlink to `to`, unless `from` already exists.
pub async fn ensure_link(from: &Path, to: &Path) -> Result<LinkOutcome> {
    let target = relative_target(from, to);

    match tokio::fs::symlink_metadata(from).await {
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = tokio::fs::read_link(from)
                .await
                .map_err(|e| MirrorError::fs("read link", from, e))?;
            return Ok(if current == target {
                LinkOutcome::Existing
            } else {
                LinkOutcome::Stale { current }
            });
        }
        Ok(_) => return Ok(LinkOutcome::Existing),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(MirrorError::fs("inspect", from, e)),
    }

    if let Some(parent) = from.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MirrorError::fs("create directory", parent, e))?;
    }

    match create_symlink(&target, from).await {
        Ok(()) => Ok(LinkOutcome::Created),
        // another task got there between our check and our create
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(LinkOutcome::Existing),
        Err(e) => Err(MirrorError::fs("create symlink", from, e)),
    }
}

#[cfg(unix)]
async fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink(target, link).await
}

#[cfg(not(unix))]
async fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are only created on unix",
    ))
}

/// Path of `to` as seen from the directory containing `from`.
///
/// Purely lexical: both paths must be spelled from the same root.
pub fn relative_target(from: &Path, to: &Path) -> PathBuf {
    let base: Vec<Component> = from
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();
    let dest: Vec<Component> = to.components().collect();

    let common = base
        .iter()
        .zip(dest.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for part in &dest[common..] {
        rel.push(part.as_os_str());
    }

    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

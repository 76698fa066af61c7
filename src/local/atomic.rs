// src/local/atomic.rs
// =============================================================================
// Crash-safe file publishing.
//
// How it works:
// 1. Create a uniquely named temp file IN THE TARGET DIRECTORY (same
//    filesystem, so the final rename is atomic)
// 2. Stream the body into it, then fsync
// 3. Rename it onto the final name
//
// Any failure before step 3 drops the temp path, which deletes the file.
// A reader of the directory therefore sees either nothing, the previous
// file, or the complete new file under the final name. Never a prefix.
//
// Concurrent writers to the same final path are fine too: each has its own
// temp file and the last rename wins.
// =============================================================================

use std::path::Path;
use std::pin::pin;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::trace;

use crate::error::{MirrorError, Result};

/// Suffix of every in-flight temp file. Listings skip names carrying it.
pub const TEMP_SUFFIX: &str = ".treemirror-part";

// keeps prefix + random part + suffix well under NAME_MAX
const MAX_PREFIX_BYTES: usize = 96;

/// Writes `source` to `dir/final_name` atomically, returning the byte count.
///
/// An error yielded by `source` is returned unchanged; only local I/O
/// failures become `Filesystem`.
pub async fn write_atomic<S>(dir: &Path, final_name: &str, source: S) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>>,
{
    let final_path = dir.join(final_name);

    let named = tempfile::Builder::new()
        .prefix(&temp_prefix(final_name))
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| MirrorError::fs("create temp file in", dir, e))?;

    // temp_path deletes the file when dropped, which covers every early return
    let (file, temp_path) = named.into_parts();
    let mut out = tokio::fs::File::from_std(file);
    trace!(temp = %temp_path.display(), "writing temp file");

    let mut source = pin!(source);
    let mut written: u64 = 0;
    while let Some(chunk) = source.next().await {
        let chunk = chunk?;
        out.write_all(&chunk)
            .await
            .map_err(|e| MirrorError::fs("write", &*temp_path, e))?;
        written += chunk.len() as u64;
    }

    out.flush()
        .await
        .map_err(|e| MirrorError::fs("flush", &*temp_path, e))?;
    out.sync_all()
        .await
        .map_err(|e| MirrorError::fs("sync", &*temp_path, e))?;
    drop(out);

    temp_path
        .persist(&final_path)
        .map_err(|e| MirrorError::fs("rename into place", &final_path, e.error))?;

    Ok(written)
}

fn temp_prefix(final_name: &str) -> String {
    let mut end = final_name.len().min(MAX_PREFIX_BYTES);
    while !final_name.is_char_boundary(end) {
        end -= 1;
    }
    format!(".{}.", &final_name[..end])
}

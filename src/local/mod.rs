// src/local/mod.rs
// =============================================================================
// Everything that touches the local mirror tree.
//
// Submodules:
// - atomic: temp-file + rename publishing of downloads
// - symlink: redirects mapped onto relative symlinks
// - listing: listing and pruning one local directory
// =============================================================================

mod atomic;
mod listing;
mod symlink;

pub use atomic::write_atomic;
pub use listing::{read_local, remove_local, LocalEntry};
pub use symlink::{ensure_link, LinkOutcome};

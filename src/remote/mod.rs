// src/remote/mod.rs
// =============================================================================
// Everything about the remote side of the mirror.
//
// Submodules:
// - boundary: which URLs are part of the mirrored tree
// - canonical: URL normalization and URL -> local path mapping
// - http: the reqwest transport, run under the request limiter
// - html: href extraction from listing pages
// =============================================================================

mod boundary;
mod canonical;
mod html;
mod http;

pub use boundary::Boundary;
pub use canonical::{canonical_key, normalize, relative_path, same_resource};
pub use html::extract_hrefs;
pub use http::{build_client, fetch, Fetched};

// src/remote/html.rs
// =============================================================================
// Pulls hyperlinks out of a directory listing page.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (it's built on html5ever, so broken markup from
//   old autoindex modules still parses)
// - Supports CSS selectors for finding elements
//
// This is deliberately dumb: it returns the raw href values in document
// order. Duplicates, "../", "?C=N;O=D" sort links and absolute links to
// other sites all come through; deciding which of them are children of the
// directory is the reconciler's job.
// =============================================================================

use scraper::{Html, Selector};

/// Returns every `<a href>` value of `html`, in document order.
pub fn extract_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    // Selector::parse only fails on invalid CSS; "a[href]" is a constant
    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why not resolve URLs here?
//    - Resolution needs the page's FINAL URL (after redirects), which only
//      the crawl task knows
//    - Keeping this a pure bytes -> strings function makes it trivial to test
//
// 2. What does .value() do?
//    - element is an ElementRef (reference into the parsed tree)
//    - .value() gets the underlying Element
//    - .attr("href") gets the attribute value, if present
// -----------------------------------------------------------------------------

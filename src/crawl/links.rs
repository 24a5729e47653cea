// src/crawl/links.rs
// =============================================================================
// Turns a raw reference found in a page into a URL worth queueing.
//
// Steps:
// 1. Skip in-page anchors and schemes we never fetch (mailto:, tel:, ...)
// 2. Resolve it against the page URL, the way a browser would
// 3. Keep only http and https
// 4. Drop the #fragment, so /a and /a#top are the same page
// 5. Reject anything longer than the configured maximum
//
// The result is the normalized form: it is what gets hashed into the
// VisitedSet, so two spellings of the same URL dedup to one entry.
// =============================================================================

use url::Url;

// Schemes that can never lead to an HTML page we could fetch
const SKIPPED_PREFIXES: [&str; 4] = ["mailto:", "tel:", "javascript:", "data:"];

// Resolves a link (possibly relative) to an absolute, normalized URL
pub fn resolve_reference(base: &Url, reference: &str, max_len: usize) -> Option<Url> {
    if reference.starts_with('#') {
        return None;
    }
    let skipped = SKIPPED_PREFIXES.iter().any(|prefix| {
        reference
            .get(..prefix.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
    });
    if skipped {
        return None;
    }

    let mut url = base.join(reference).ok()?;
    if !is_crawlable(&url) {
        return None;
    }
    url.set_fragment(None);

    (url.as_str().len() <= max_len).then_some(url)
}

/// Only http and https URLs with a host are crawled.
pub fn is_crawlable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

// Parses a seed from the command line, adding http:// when the scheme is
// missing
pub fn parse_seed(seed: &str) -> Result<Url, url::ParseError> {
    match Url::parse(seed) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{}", seed)),
        Err(e) => Err(e),
    }
}

// src/parse/mod.rs
// =============================================================================
// The two incremental parsers a page goes through.
//
// - http: status line and headers, as a view over the bytes read so far
// - html: URL-bearing attribute values, fed one network read at a time
//
// Neither parser does any I/O or owns the page; the crawl worker reads from
// the socket and hands them bytes.
// =============================================================================

mod html;
mod http;

pub use html::{HtmlReferenceExtractor, HtmlState};
pub use http::{HeaderError, ResponseParser, DEFAULT_MAX_HEADER_BYTES};

// src/parse/http.rs
// =============================================================================
// Parses the status line and header section of an HTTP/1.x response.
//
// The input is whatever has been read from the socket so far. The parser
// never copies: an HttpDocument is a view that borrows the caller's buffer,
// and every header value it knows about is a span into that buffer.
//
// Results:
// - Ok(document): the header section is complete; body() starts right after
//   the blank line.
// - Err(Incomplete): no blank line yet, read more and call again.
// - Err(Invalid(_)): the server sent something that is not a response.
//
// The input is server-controlled, so every index is bounds-checked and the
// header section is capped at `max_header_bytes`.
// =============================================================================

use thiserror::Error;

pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("response header is incomplete")]
    Incomplete,

    #[error("invalid response header: {0}")]
    Invalid(InvalidHeader),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidHeader {
    #[error("status line does not start with HTTP/")]
    Protocol,

    #[error("malformed protocol version")]
    Version,

    #[error("malformed status code")]
    Status,

    #[error("Content-Length does not fit in 64 bits")]
    ContentLength,

    #[error("header section exceeds {0} bytes")]
    TooLarge(usize),
}

impl From<InvalidHeader> for HeaderError {
    fn from(reason: InvalidHeader) -> Self {
        HeaderError::Invalid(reason)
    }
}

// A byte range inside the parsed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDocument<'a> {
    buffer: &'a [u8],
    pub major: u8,
    pub minor: u8,
    pub code: u16,
    location: Option<Span>,
    content_type: Option<Span>,
    content_encoding: Option<Span>,
    pub content_length: Option<u64>,
    body_start: usize,
}

impl<'a> HttpDocument<'a> {
    fn span(&self, span: Option<Span>) -> Option<&'a [u8]> {
        span.map(|Span { start, end }| &self.buffer[start..end])
    }

    pub fn location(&self) -> Option<&'a [u8]> {
        self.span(self.location)
    }

    pub fn content_type(&self) -> Option<&'a [u8]> {
        self.span(self.content_type)
    }

    pub fn content_encoding(&self) -> Option<&'a [u8]> {
        self.span(self.content_encoding)
    }

    /// The part of the body that is already in the buffer.
    pub fn body(&self) -> &'a [u8] {
        &self.buffer[self.body_start..]
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// True when the media type is HTML, or when none was sent.
    pub fn is_html(&self) -> bool {
        let Some(value) = self.content_type() else {
            return true;
        };
        let media_type = value.split(|&b| b == b';').next().unwrap_or(value);
        let media_type = trim(media_type);
        media_type.eq_ignore_ascii_case(b"text/html")
            || media_type.eq_ignore_ascii_case(b"application/xhtml+xml")
    }

    /// True when the body is sent as-is.
    pub fn is_identity_encoded(&self) -> bool {
        self.content_encoding()
            .map_or(true, |value| value.is_empty() || value.eq_ignore_ascii_case(b"identity"))
    }
}

/// Parses responses with a cap on the header section size.
#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    max_header_bytes: usize,
}

impl ResponseParser {
    pub fn new(max_header_bytes: usize) -> Self {
        Self { max_header_bytes }
    }

    pub fn parse<'a>(&self, buffer: &'a [u8]) -> Result<HttpDocument<'a>, HeaderError> {
        match parse_response(buffer) {
            Ok(document) if document.body_start > self.max_header_bytes => {
                Err(InvalidHeader::TooLarge(self.max_header_bytes).into())
            }
            Err(HeaderError::Incomplete) if buffer.len() > self.max_header_bytes => {
                Err(InvalidHeader::TooLarge(self.max_header_bytes).into())
            }
            other => other,
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEADER_BYTES)
    }
}

/// Parses a response header with no size cap.
pub fn parse_response(buffer: &[u8]) -> Result<HttpDocument<'_>, HeaderError> {
    let mut lines = Lines {
        buffer,
        position: 0,
    };

    // Some servers send stray empty lines before the status line
    let status_line = loop {
        let line = lines.next_line().ok_or(HeaderError::Incomplete)?;
        if !line.is_empty() {
            break line;
        }
    };
    let (major, minor, code) = parse_status_line(&buffer[status_line.start..status_line.end])?;

    let mut document = HttpDocument {
        buffer,
        major,
        minor,
        code,
        location: None,
        content_type: None,
        content_encoding: None,
        content_length: None,
        body_start: 0,
    };

    loop {
        let line = lines.next_line().ok_or(HeaderError::Incomplete)?;
        if line.is_empty() {
            document.body_start = lines.position;
            return Ok(document);
        }
        read_header_field(&mut document, line)?;
    }
}

impl Span {
    fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// Splits a buffer into lines ending in LF, with an optional CR before it
struct Lines<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl Lines<'_> {
    // The next complete line without its terminator, or None if the buffer
    // ends before one
    fn next_line(&mut self) -> Option<Span> {
        let rest = &self.buffer[self.position..];
        let newline = rest.iter().position(|&b| b == b'\n')?;

        let start = self.position;
        let mut end = start + newline;
        if end > start && self.buffer[end - 1] == b'\r' {
            end -= 1;
        }
        self.position = start + newline + 1;
        Some(Span { start, end })
    }
}

// "HTTP/" digit "." digit " " digit digit digit [" " reason]
fn parse_status_line(line: &[u8]) -> Result<(u8, u8, u16), InvalidHeader> {
    let rest = line.strip_prefix(b"HTTP/").ok_or(InvalidHeader::Protocol)?;

    let (major, minor) = match rest {
        [major, b'.', minor, b' ', ..] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            (major - b'0', minor - b'0')
        }
        _ => return Err(InvalidHeader::Version),
    };

    let code = match &rest[4..] {
        [a, b, c] | [a, b, c, b' ', ..]
            if a.is_ascii_digit() && b.is_ascii_digit() && c.is_ascii_digit() =>
        {
            u16::from(a - b'0') * 100 + u16::from(b - b'0') * 10 + u16::from(c - b'0')
        }
        _ => return Err(InvalidHeader::Status),
    };

    Ok((major, minor, code))
}

fn read_header_field(document: &mut HttpDocument<'_>, line: Span) -> Result<(), InvalidHeader> {
    let bytes = &document.buffer[line.start..line.end];

    // Lines without a colon carry nothing we use
    let Some(colon) = bytes.iter().position(|&b| b == b':') else {
        return Ok(());
    };
    let name = &bytes[..colon];
    let value = trim_span(
        document.buffer,
        Span {
            start: line.start + colon + 1,
            end: line.end,
        },
    );

    if name.eq_ignore_ascii_case(b"location") {
        document.location = Some(value);
    } else if name.eq_ignore_ascii_case(b"content-type") {
        document.content_type = Some(value);
    } else if name.eq_ignore_ascii_case(b"content-encoding") {
        document.content_encoding = Some(value);
    } else if name.eq_ignore_ascii_case(b"content-length") {
        document.content_length = parse_content_length(&document.buffer[value.start..value.end])?;
    }
    Ok(())
}

// Accumulates every decimal digit and skips everything else. A value with
// no digits at all means the length is unknown.
fn parse_content_length(value: &[u8]) -> Result<Option<u64>, InvalidHeader> {
    let mut length: Option<u64> = None;
    for &byte in value.iter().filter(|b| b.is_ascii_digit()) {
        let digit = u64::from(byte - b'0');
        let next = length
            .unwrap_or(0)
            .checked_mul(10)
            .and_then(|n| n.checked_add(digit))
            .ok_or(InvalidHeader::ContentLength)?;
        length = Some(next);
    }
    Ok(length)
}

fn trim_span(buffer: &[u8], mut span: Span) -> Span {
    while !span.is_empty() && matches!(buffer[span.start], b' ' | b'\t') {
        span.start += 1;
    }
    while !span.is_empty() && matches!(buffer[span.end - 1], b' ' | b'\t') {
        span.end -= 1;
    }
    span
}

fn trim(bytes: &[u8]) -> &[u8] {
    let span = trim_span(
        bytes,
        Span {
            start: 0,
            end: bytes.len(),
        },
    );
    &bytes[span.start..span.end]
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why does HttpDocument<'a> have a lifetime?
//    - It does not copy the header values, it points into the caller's buffer
//    - 'a ties the document to that buffer: the buffer cannot be changed or
//      dropped while a document still borrows it
//
// 2. What is the difference between Incomplete and Invalid?
//    - Incomplete: the blank line ending the header has not arrived yet,
//      read more bytes and try again
//    - Invalid: the bytes can never become a valid header
//
// 3. Why return Option<&[u8]> instead of Option<String>?
//    - Header values are not guaranteed to be UTF-8
//    - The caller decides if and how to turn them into text
//
// 4. What does #[derive(Clone, Copy)] on the errors give us?
//    - The errors are small plain values, so they can be copied around
//      freely instead of moved
// -----------------------------------------------------------------------------

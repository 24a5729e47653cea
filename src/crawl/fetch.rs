// src/crawl/fetch.rs
// =============================================================================
// Getting the raw bytes of a page.
//
// The worker only needs "give me a byte stream for this URL", so that is
// what the Fetch trait is. Tests plug in canned responses; the real crawl
// uses TcpFetcher, which:
// 1. Resolves the host and connects with a timeout (tries every address)
// 2. Sends a plain HTTP/1.0 GET with Connection: close
// 3. Hands back the socket; the response is parsed by the caller
//
// HTTP/1.0 keeps servers from answering with chunked transfer encoding, and
// Connection: close means end-of-stream is end-of-response.
//
// https is refused: there is no TLS here.
// =============================================================================

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use thiserror::Error;
use url::{Position, Url};

const USER_AGENT: &str = concat!("spillcrawl/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("could not resolve host: {0}")]
    Resolve(#[source] io::Error),

    #[error("connecting to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub trait Fetch: Send + Sync {
    /// Opens a stream that yields the raw HTTP response for `url`.
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>, FetchError>;
}

pub struct TcpFetcher {
    timeout: Duration,
}

impl TcpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn connect(&self, url: &Url) -> Result<TcpStream, FetchError> {
        let addrs = url
            .socket_addrs(|| Some(80))
            .map_err(FetchError::Resolve)?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(source) => last_error = Some(FetchError::Connect { addr, source }),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FetchError::Resolve(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses found",
            ))
        }))
    }
}

impl Fetch for TcpFetcher {
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>, FetchError> {
        if url.scheme() != "http" {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(FetchError::MissingHost);
        }

        let mut stream = self.connect(url)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(build_request(url).as_bytes())?;

        tracing::trace!(url = %url, "request sent");
        Ok(Box::new(stream))
    }
}

// The request line and headers for a GET of `url`
fn build_request(url: &Url) -> String {
    let target = &url[Position::BeforePath..Position::AfterQuery];
    let target = if target.is_empty() { "/" } else { target };
    // Host plus an explicit port, if the URL has one
    let host = &url[Position::BeforeHost..Position::AfterPort];

    format!(
        "GET {} HTTP/1.0\r\n\
         Host: {}\r\n\
         User-Agent: {}\r\n\
         Accept: text/html, application/xhtml+xml\r\n\
         Connection: close\r\n\
         \r\n",
        target, host, USER_AGENT
    )
}

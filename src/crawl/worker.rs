// src/crawl/worker.rs
// =============================================================================
// One crawl worker's loop, and the state all workers share.
//
// Each worker repeatedly:
// 1. Takes a URL from the registry (round-robin over domains)
// 2. Opens it through the Fetch collaborator
// 3. Reads until the response header parses
// 4. Streams the body through the HTML extractor, read by read
// 5. Resolves every reference, dedups it against its domain and queues it
// 6. Pushes one record for the page to the output channel
//
// Stopping:
// - shutdown() sets the flag and closes the channel (Ctrl-C, deadline,
//   fatal frontier error). Records pushed after that are dropped.
// - stop() only sets the flag (page budget), so pages in flight still get
//   their records out.
// - Otherwise a worker exits once every frontier is empty and no worker is
//   in the middle of a page, since nobody can produce more URLs.
//
// A worker never holds a domain lock while pushing to the channel.
// =============================================================================

use super::fetch::Fetch;
use super::links::resolve_reference;
use crate::config::CrawlConfig;
use crate::domain::{DomainRegistry, Offer};
use crate::frontier::{DiskSpillStore, FrontierError};
use crate::output::{BoundedChannel, OutputFormat, OutputRecord, PageReport, PageStatus};
use crate::parse::{HeaderError, HtmlReferenceExtractor, HtmlState, ResponseParser};
use serde::Serialize;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

// How long an idle worker waits before looking for work again
const IDLE_POLL: Duration = Duration::from_millis(20);

// Bytes asked from the stream per read
const READ_CHUNK: usize = 8 * 1024;

/// Counters for the whole run.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pages: AtomicUsize,
    fetch_failures: AtomicUsize,
    invalid_headers: AtomicUsize,
    spill_failures: AtomicUsize,
    links_found: AtomicUsize,
    links_queued: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub pages: usize,
    pub fetch_failures: usize,
    pub invalid_headers: usize,
    pub spill_failures: usize,
    pub links_found: usize,
    pub links_queued: usize,
    /// Distinct URLs ever queued, across all domains.
    pub urls_seen: usize,
    /// Spill slots holding data right now, out of `spill_slots`.
    pub spill_slots_used: usize,
    pub spill_slots: usize,
}

impl CrawlStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages: self.pages.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            invalid_headers: self.invalid_headers.load(Ordering::Relaxed),
            spill_failures: self.spill_failures.load(Ordering::Relaxed),
            links_found: self.links_found.load(Ordering::Relaxed),
            links_queued: self.links_queued.load(Ordering::Relaxed),
            ..StatsSnapshot::default()
        }
    }
}

// What the header of a response told us, copied out of the read buffer
struct ResponseHead {
    code: u16,
    status: PageStatus,
    content_type: Option<String>,
    location: Option<String>,
    content_length: Option<u64>,
    scan_body: bool,
    // Body bytes that arrived together with the header
    body: Vec<u8>,
}

pub struct Crawl {
    registry: DomainRegistry,
    spill: Arc<DiskSpillStore>,
    output: Arc<BoundedChannel<OutputRecord>>,
    parser: ResponseParser,
    max_url_len: usize,
    max_pages: Option<usize>,
    format: OutputFormat,
    stopping: AtomicBool,
    // Workers currently holding a URL
    in_flight: AtomicUsize,
    // Pages claimed against the page budget
    claimed: AtomicUsize,
    stats: CrawlStats,
}

impl Crawl {
    /// Sets up the shared crawl state. The spill file is created here.
    pub fn new(config: &CrawlConfig, output: Arc<BoundedChannel<OutputRecord>>) -> io::Result<Self> {
        let chunk_size = config.frontier.chunk_size;
        let store = match &config.spill_dir {
            Some(dir) => DiskSpillStore::in_dir(dir, chunk_size)?,
            None => DiskSpillStore::temporary(chunk_size)?,
        };
        let spill = Arc::new(store);

        Ok(Self {
            registry: DomainRegistry::new(
                config.frontier,
                Some(Arc::clone(&spill)),
                config.allowed_domains.clone(),
            ),
            spill,
            output,
            parser: ResponseParser::new(config.max_header_bytes),
            max_url_len: config.max_url_len,
            max_pages: config.max_pages,
            format: config.format,
            stopping: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            claimed: AtomicUsize::new(0),
            stats: CrawlStats::default(),
        })
    }

    pub fn output(&self) -> &Arc<BoundedChannel<OutputRecord>> {
        &self.output
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            urls_seen: self.registry.visited(),
            spill_slots_used: self.spill.occupied(),
            spill_slots: self.spill.capacity(),
            ..self.stats.snapshot()
        }
    }

    /// Queues the starting URLs. Returns how many were new.
    pub fn seed(&self, seeds: &[Url]) -> Result<usize, FrontierError> {
        let mut queued = 0;
        for seed in seeds {
            match self.registry.offer(seed) {
                Ok(Offer::Queued) => queued += 1,
                Ok(Offer::Rejected) => warn!(url = %seed, "seed is not an allowed domain"),
                Ok(Offer::AlreadyVisited) => {}
                Err(e) => self.record_frontier_error(e)?,
            }
        }
        Ok(queued)
    }

    /// Stops the workers and closes the output channel.
    pub fn shutdown(&self) {
        self.stop();
        self.output.close();
    }

    /// Stops the workers after their current page.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.stopping.load(Ordering::SeqCst) || self.output.is_closed()
    }

    /// Runs one worker until the crawl is done or stopped.
    ///
    /// Only a fatal frontier error is returned; the crawl has already been
    /// shut down when that happens.
    pub fn run_worker(&self, fetcher: &dyn Fetch) -> Result<(), FrontierError> {
        // One extractor per worker, reset for every page
        let mut extractor = HtmlReferenceExtractor::new(self.max_url_len);
        loop {
            if self.is_shutting_down() {
                return Ok(());
            }

            // Count ourselves busy before looking, so an idle peer cannot see
            // empty frontiers and nobody in flight while we hold a URL
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let url = match self.registry.next_url() {
                Ok(Some(url)) => url,
                Ok(None) => {
                    let busy = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
                    if busy == 0 && self.registry.pending() == 0 {
                        debug!("frontier exhausted, worker exiting");
                        return Ok(());
                    }
                    thread::sleep(IDLE_POLL);
                    continue;
                }
                Err(e) => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    self.record_frontier_error(e)?;
                    continue;
                }
            };

            // Page budget spent: this URL is dropped and the crawl winds down
            if !self.claim_page() {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                debug!("page budget spent");
                self.stop();
                return Ok(());
            }

            let result = self.process_page(fetcher, &url, &mut extractor);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result?;
        }
    }

    fn claim_page(&self) -> bool {
        match self.max_pages {
            Some(max) => self.claimed.fetch_add(1, Ordering::SeqCst) < max,
            None => true,
        }
    }

    /// Fetches one page, queues what it links to and reports it.
    pub fn process_page(
        &self,
        fetcher: &dyn Fetch,
        url: &str,
        extractor: &mut HtmlReferenceExtractor,
    ) -> Result<(), FrontierError> {
        let report = match Url::parse(url) {
            Ok(page) => match fetcher.open(&page) {
                Ok(mut stream) => self.read_page(&page, &mut *stream, extractor)?,
                Err(e) => {
                    warn!(url, error = %e, "fetch failed");
                    self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                    PageReport::new(url, PageStatus::FetchError).with_message(e.to_string())
                }
            },
            Err(e) => PageReport::new(url, PageStatus::FetchError).with_message(e.to_string()),
        };

        self.stats.pages.fetch_add(1, Ordering::Relaxed);
        self.stats.links_found.fetch_add(report.links, Ordering::Relaxed);
        self.stats.links_queued.fetch_add(report.queued, Ordering::Relaxed);
        debug!(
            url,
            status = ?report.status,
            links = report.links,
            queued = report.queued,
            backlog = self.output.len(),
            "page done"
        );

        // Dropped silently if the channel was closed meanwhile
        self.output.push(report.to_record(self.format));
        Ok(())
    }

    fn read_page(
        &self,
        page: &Url,
        stream: &mut dyn Read,
        extractor: &mut HtmlReferenceExtractor,
    ) -> Result<PageReport, FrontierError> {
        let url = page.as_str();
        // Everything read so far, until the header is complete
        let mut buffer = Vec::with_capacity(READ_CHUNK);
        // Scratch space for a single read
        let mut chunk = vec![0u8; READ_CHUNK];

        // Keep reading until the header parses or turns out to be bad
        let head = loop {
            match self.parser.parse(&buffer) {
                Ok(document) => {
                    let status = if document.is_success() {
                        PageStatus::Ok
                    } else if document.is_redirect() {
                        PageStatus::Redirect
                    } else {
                        PageStatus::HttpError
                    };
                    break ResponseHead {
                        code: document.code,
                        status,
                        content_type: document.content_type().map(lossy),
                        location: document.location().map(lossy),
                        content_length: document.content_length,
                        scan_body: document.is_success()
                            && document.is_html()
                            && document.is_identity_encoded(),
                        body: document.body().to_vec(),
                    };
                }
                Err(HeaderError::Incomplete) => {}
                Err(HeaderError::Invalid(reason)) => {
                    warn!(url, %reason, "invalid response header");
                    self.stats.invalid_headers.fetch_add(1, Ordering::Relaxed);
                    return Ok(PageReport::new(url, PageStatus::InvalidHeader)
                        .with_message(reason.to_string()));
                }
            }

            // Header not complete yet: read more
            match read_some(stream, &mut chunk) {
                Ok(0) => {
                    self.stats.invalid_headers.fetch_add(1, Ordering::Relaxed);
                    return Ok(PageReport::new(url, PageStatus::InvalidHeader)
                        .with_message("connection closed inside the response header"));
                }
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!(url, error = %e, "read failed");
                    self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                    return Ok(PageReport::new(url, PageStatus::FetchError)
                        .with_message(e.to_string()));
                }
            }
        };

        // The header is parsed; only the body bytes are needed from here on
        drop(buffer);

        let mut report = PageReport::new(url, head.status);
        report.code = Some(head.code);
        report.content_type = head.content_type.clone();

        // Follow redirects by queueing the target like any other link
        if head.status == PageStatus::Redirect {
            if let Some(location) = &head.location {
                if let Some(target) = resolve_reference(page, location, self.max_url_len) {
                    report.redirect = Some(target.to_string());
                    if self.enqueue(&target)? {
                        report.queued += 1;
                    }
                }
            }
        }

        // Only successful, plain HTML bodies are worth scanning
        if head.scan_body {
            extractor.reset();
            self.scan_body(page, &head, extractor, stream, &mut chunk, &mut report)?;
        }
        Ok(report)
    }

    // Feeds the body to the extractor: first what came with the header,
    // then the rest of the stream, stopping at Content-Length if given
    fn scan_body(
        &self,
        page: &Url,
        head: &ResponseHead,
        extractor: &mut HtmlReferenceExtractor,
        stream: &mut dyn Read,
        chunk: &mut [u8],
        report: &mut PageReport,
    ) -> Result<(), FrontierError> {
        let mut remaining = head.content_length.unwrap_or(u64::MAX);

        let mut piece = head.body.as_slice();
        loop {
            // Never feed past Content-Length
            let take = piece.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            for reference in extractor.feed(&piece[..take]) {
                report.links += 1;
                if let Some(target) = resolve_reference(page, &reference, self.max_url_len) {
                    if self.enqueue(&target)? {
                        report.queued += 1;
                    }
                }
            }
            remaining -= take as u64;
            if remaining == 0 {
                break;
            }

            match read_some(stream, chunk) {
                Ok(0) => break,
                Ok(n) => piece = &chunk[..n],
                Err(e) => {
                    warn!(url = page.as_str(), error = %e, "body read failed");
                    report.message = Some(format!("body truncated: {}", e));
                    break;
                }
            }
        }

        // Unterminated markup is only worth a debug line
        if extractor.state() != HtmlState::Text {
            debug!(url = page.as_str(), state = ?extractor.state(), "body ended inside markup");
        }
        Ok(())
    }

    // Offers a discovered URL to its domain; true if it was queued
    fn enqueue(&self, target: &Url) -> Result<bool, FrontierError> {
        match self.registry.offer(target) {
            Ok(offer) => Ok(offer == Offer::Queued),
            Err(e) => {
                // A failed spill write still left the URL queued in memory
                let queued = matches!(e, FrontierError::SpillWrite(_));
                self.record_frontier_error(e)?;
                Ok(queued)
            }
        }
    }

    // Logs a frontier error. Fatal ones shut the crawl down and come back
    // as Err; the rest are counted and swallowed.
    fn record_frontier_error(&self, e: FrontierError) -> Result<(), FrontierError> {
        if e.is_fatal() {
            error!(error = %e, "frontier failure, shutting down");
            self.shutdown();
            return Err(e);
        }
        warn!(error = %e, "frontier spill failure");
        self.stats.spill_failures.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// One read, retried when interrupted by a signal
fn read_some(stream: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why &dyn Fetch instead of a concrete fetcher?
//    - The worker only needs "something that opens a URL"
//    - Tests pass a CannedFetcher, the binary passes a TcpFetcher
//
// 2. What are the atomics for?
//    - Several worker threads update the same counters
//    - AtomicUsize::fetch_add changes a number without a lock
//    - Ordering::Relaxed is enough for statistics; the in-flight count uses
//      SeqCst because termination depends on it
//
// 3. Why does the header loop copy values into ResponseHead?
//    - HttpDocument borrows the read buffer
//    - Copying the few values we need ends that borrow, so the buffer can
//      be dropped and the stream read again
//
// 4. What is the difference between stop() and shutdown()?
//    - stop(): workers finish their current page and exit
//    - shutdown(): also closes the output channel, so pending records are
//      dropped
// -----------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crawl::fetch::FetchError;
    use crate::frontier::FrontierSettings;
    use std::collections::HashMap;
    use std::io::Cursor;

    // Serves canned responses, optionally a few bytes per read
    pub(crate) struct CannedFetcher {
        pages: HashMap<String, Vec<u8>>,
        trickle: Option<usize>,
    }

    impl CannedFetcher {
        pub(crate) fn new() -> Self {
            Self {
                pages: HashMap::new(),
                trickle: None,
            }
        }

        pub(crate) fn page(mut self, url: &str, response: impl Into<Vec<u8>>) -> Self {
            self.pages.insert(url.to_string(), response.into());
            self
        }

        pub(crate) fn html(self, url: &str, body: &str) -> Self {
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            self.page(url, response)
        }

        fn trickle(mut self, bytes_per_read: usize) -> Self {
            self.trickle = Some(bytes_per_read);
            self
        }
    }

    struct Trickle {
        inner: Cursor<Vec<u8>>,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let limit = buf.len().min(self.step);
            self.inner.read(&mut buf[..limit])
        }
    }

    impl Fetch for CannedFetcher {
        fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>, FetchError> {
            let response = self.pages.get(url.as_str()).cloned().ok_or_else(|| {
                FetchError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "no such page"))
            })?;
            let inner = Cursor::new(response);
            Ok(match self.trickle {
                Some(step) => Box::new(Trickle { inner, step }),
                None => Box::new(inner),
            })
        }
    }

    fn crawl_with(config: CrawlConfig) -> Crawl {
        let output = Arc::new(BoundedChannel::new(config.output_capacity));
        Crawl::new(&config, output).unwrap()
    }

    fn json_config() -> CrawlConfig {
        CrawlConfig {
            format: OutputFormat::Json,
            output_capacity: 256,
            ..CrawlConfig::default()
        }
    }

    fn records(crawl: &Crawl) -> Vec<serde_json::Value> {
        crawl.output().close();
        std::iter::from_fn(|| crawl.output().pop())
            .map(|record| serde_json::from_slice(record.as_bytes()).unwrap())
            .collect()
    }

    fn seed(crawl: &Crawl, url: &str) {
        crawl.seed(&[Url::parse(url).unwrap()]).unwrap();
    }

    #[test]
    fn test_single_worker_crawls_site() {
        let fetcher = CannedFetcher::new()
            .html("http://site.test/", r#"<a href="/a">a</a> <a href="/b#top">b</a> <a href="/a">again</a>"#)
            .html("http://site.test/a", r#"<a href="/">home</a><img src="/b">"#)
            .html("http://site.test/b", "<p>leaf</p>");

        let crawl = crawl_with(json_config());
        seed(&crawl, "http://site.test/");
        crawl.run_worker(&fetcher).unwrap();

        let records = records(&crawl);
        let urls: Vec<_> = records.iter().map(|r| r["url"].as_str().unwrap()).collect();
        assert_eq!(urls, vec!["http://site.test/", "http://site.test/a", "http://site.test/b"]);

        assert_eq!(records[0]["links"], 3);
        assert_eq!(records[0]["queued"], 2);
        assert_eq!(records[1]["queued"], 0);

        let stats = crawl.stats();
        assert_eq!(stats.pages, 3);
        assert_eq!(stats.links_found, 5);
        assert_eq!(stats.links_queued, 2);
        assert_eq!(stats.urls_seen, 3);
        assert_eq!(stats.spill_slots_used, 0);
    }

    #[test]
    fn test_unterminated_markup_does_not_leak_into_next_page() {
        let fetcher = CannedFetcher::new()
            .html("http://site.test/", r#"<a href="/next"><!-- never closed"#)
            .html("http://site.test/next", r#"<a href="/last">"#)
            .html("http://site.test/last", "");

        let crawl = crawl_with(json_config());
        seed(&crawl, "http://site.test/");
        crawl.run_worker(&fetcher).unwrap();

        let records = records(&crawl);
        let urls: Vec<_> = records.iter().map(|r| r["url"].as_str().unwrap()).collect();
        assert_eq!(urls, vec!["http://site.test/", "http://site.test/next", "http://site.test/last"]);
        assert_eq!(records[1]["links"], 1);
    }

    #[test]
    fn test_small_frontier_spills_and_drains() {
        let body: String = (0..60).map(|i| format!("<a href=\"/page/{}\">", i)).collect();
        let mut fetcher = CannedFetcher::new().html("http://site.test/", &body);
        for i in 0..60 {
            fetcher = fetcher.html(&format!("http://site.test/page/{}", i), "");
        }

        let crawl = crawl_with(CrawlConfig {
            frontier: FrontierSettings {
                chunk_size: 64,
                resident_chunks: 1,
            },
            ..json_config()
        });
        seed(&crawl, "http://site.test/");
        crawl.run_worker(&fetcher).unwrap();

        let records = records(&crawl);
        assert_eq!(records.len(), 61);
        assert_eq!(records[1]["url"], "http://site.test/page/0");
        assert_eq!(records[60]["url"], "http://site.test/page/59");

        let stats = crawl.stats();
        assert_eq!(stats.urls_seen, 61);
        assert!(stats.spill_slots > 0);
        assert_eq!(stats.spill_slots_used, 0);
        assert_eq!(stats.spill_failures, 0);
    }

    #[test]
    fn test_header_split_across_reads() {
        let fetcher = CannedFetcher::new()
            .html("http://site.test/", r#"<a href="http://other.test/x">x</a>"#)
            .html("http://other.test/x", "done")
            .trickle(3);

        let crawl = crawl_with(json_config());
        seed(&crawl, "http://site.test/");
        crawl.run_worker(&fetcher).unwrap();

        let records = records(&crawl);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["status"], "ok");
        assert_eq!(records[1]["url"], "http://other.test/x");
        assert_eq!(crawl.registry().domain_count(), 2);
    }

    #[test]
    fn test_body_stops_at_content_length() {
        let response = "HTTP/1.1 200 OK\r\nContent-Length: 16\r\n\r\n<a href=\"/in\">x<a href=\"/beyond\">";
        let fetcher = CannedFetcher::new()
            .page("http://site.test/", response)
            .html("http://site.test/in", "");

        let crawl = crawl_with(json_config());
        seed(&crawl, "http://site.test/");
        crawl.run_worker(&fetcher).unwrap();

        let records = records(&crawl);
        assert_eq!(records[0]["links"], 1);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_redirect_is_followed() {
        let fetcher = CannedFetcher::new()
            .page(
                "http://site.test/old",
                "HTTP/1.1 301 Moved Permanently\r\nLocation: /new\r\n\r\n",
            )
            .html("http://site.test/new", "");

        let crawl = crawl_with(json_config());
        seed(&crawl, "http://site.test/old");
        crawl.run_worker(&fetcher).unwrap();

        let records = records(&crawl);
        assert_eq!(records[0]["status"], "redirect");
        assert_eq!(records[0]["redirect"], "http://site.test/new");
        assert_eq!(records[1]["url"], "http://site.test/new");
    }

    #[test]
    fn test_failures_are_reported_and_crawl_continues() {
        let fetcher = CannedFetcher::new()
            .html(
                "http://site.test/",
                r#"<a href="/broken"><a href="/missing"><a href="/gone"><a href="/image">"#,
            )
            .page("http://site.test/broken", "SMTP ready\r\n\r\n")
            .page("http://site.test/gone", "HTTP/1.1 404 Not Found\r\n\r\n<a href=\"/never\">")
            .page(
                "http://site.test/image",
                "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\n\r\n<a href=\"/never\">",
            );

        let crawl = crawl_with(json_config());
        seed(&crawl, "http://site.test/");
        crawl.run_worker(&fetcher).unwrap();

        let records = records(&crawl);
        let status: Vec<_> = records.iter().map(|r| r["status"].as_str().unwrap()).collect();
        assert_eq!(
            status,
            vec!["ok", "invalid_header", "fetch_error", "http_error", "ok"]
        );
        assert_eq!(records[3]["code"], 404);
        assert_eq!(records[4]["links"], 0);

        let stats = crawl.stats();
        assert_eq!(stats.invalid_headers, 1);
        assert_eq!(stats.fetch_failures, 1);
    }

    #[test]
    fn test_page_budget() {
        let body: String = (0..20).map(|i| format!("<a href=\"/{}\">", i)).collect();
        let mut fetcher = CannedFetcher::new().html("http://site.test/", &body);
        for i in 0..20 {
            fetcher = fetcher.html(&format!("http://site.test/{}", i), "");
        }

        let crawl = crawl_with(CrawlConfig {
            max_pages: Some(5),
            ..json_config()
        });
        seed(&crawl, "http://site.test/");
        crawl.run_worker(&fetcher).unwrap();

        assert_eq!(records(&crawl).len(), 5);
        assert!(crawl.is_shutting_down());
        assert!(crawl.registry().pending() > 0);
    }

    #[test]
    fn test_allowlist_limits_domains() {
        let fetcher = CannedFetcher::new()
            .html("http://site.test/", r#"<a href="http://elsewhere.test/">"#);

        let crawl = crawl_with(CrawlConfig {
            allowed_domains: vec!["site.test".to_string()],
            ..json_config()
        });
        seed(&crawl, "http://site.test/");
        crawl.run_worker(&fetcher).unwrap();

        let records = records(&crawl);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["links"], 1);
        assert_eq!(records[0]["queued"], 0);
    }

    #[test]
    fn test_shutdown_stops_workers() {
        let fetcher = CannedFetcher::new().html("http://site.test/", "");
        let crawl = crawl_with(json_config());
        seed(&crawl, "http://site.test/");

        crawl.shutdown();
        crawl.run_worker(&fetcher).unwrap();
        assert_eq!(crawl.stats().pages, 0);
        assert_eq!(crawl.registry().pending(), 1);
    }

    #[test]
    fn test_many_workers_visit_each_page_once() {
        let mut fetcher = CannedFetcher::new();
        for i in 0..50 {
            // Every page links to the next two and back to the start
            let body = format!(
                r#"<a href="/{}"><a href="/{}"><a href="/0">"#,
                (i + 1) % 50,
                (i + 2) % 50
            );
            fetcher = fetcher.html(&format!("http://site.test/{}", i), &body);
        }

        let crawl = crawl_with(CrawlConfig {
            output_capacity: 4,
            ..json_config()
        });
        seed(&crawl, "http://site.test/0");

        let drained = thread::scope(|scope| {
            let drain = scope.spawn(|| {
                std::iter::from_fn(|| crawl.output().pop()).count()
            });
            let workers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| crawl.run_worker(&fetcher)))
                .collect();
            for worker in workers {
                worker.join().unwrap().unwrap();
            }
            crawl.output().close();
            drain.join().unwrap()
        });

        assert_eq!(drained, 50);
        assert_eq!(crawl.stats().pages, 50);
        assert_eq!(crawl.registry().pending(), 0);
    }
}

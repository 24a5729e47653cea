// src/crawl/mod.rs
// =============================================================================
// This module runs the crawl.
//
// Features:
// - N blocking workers sharing one domain registry (per-host dedup + queue)
// - One drain task writing page records to the output sink
// - Stops on empty frontiers, page budget, shutdown or a fatal error
//
// Submodules:
// - fetch: the Fetch trait and the plain-TCP HTTP fetcher
// - links: reference -> normalized URL
// - worker: the per-worker loop and the shared Crawl state
//
// Rust concepts:
// - spawn_blocking: the workers do blocking socket I/O, so they run on
//   tokio's blocking pool instead of the async executor
// - Arc: every task holds a shared handle to the same Crawl
// =============================================================================

mod fetch;
mod links;
mod worker;

pub use fetch::{Fetch, TcpFetcher};
pub use links::{is_crawlable, parse_seed};
pub use worker::{Crawl, StatsSnapshot};

use crate::frontier::FrontierError;
use crate::output;
use anyhow::{Context, Result};
use futures::future::join_all;
use std::io::Write;
use std::sync::Arc;

/// How a run ended.
#[derive(Debug)]
pub struct RunSummary {
    /// Records written to the sink.
    pub written: usize,
    pub stats: StatsSnapshot,
    /// The first fatal frontier error, if the run was cut short by one.
    pub fatal: Option<FrontierError>,
}

// Runs `workers` workers and the drain until the crawl is over.
//
// The caller seeds the crawl first and may call crawl.shutdown() from
// elsewhere (signal handler, deadline) to end it early.
pub async fn run<W>(
    crawl: Arc<Crawl>,
    fetcher: Arc<dyn Fetch>,
    workers: usize,
    sink: W,
) -> Result<RunSummary>
where
    W: Write + Send + 'static,
{
    let channel = Arc::clone(crawl.output());
    let drain = tokio::task::spawn_blocking(move || output::drain(&channel, sink));

    let handles = (0..workers).map(|id| {
        let crawl = Arc::clone(&crawl);
        let fetcher = Arc::clone(&fetcher);
        let span = tracing::debug_span!("worker", id);
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            crawl.run_worker(fetcher.as_ref())
        })
    });
    let results = join_all(handles).await;

    // Every producer is gone; let the drain finish what is queued
    crawl.output().close();

    let mut fatal = None;
    for result in results {
        if let Err(e) = result.context("worker task failed")? {
            fatal.get_or_insert(e);
        }
    }

    let written = drain
        .await
        .context("output task failed")?
        .context("writing output failed")?;

    Ok(RunSummary {
        written,
        stats: crawl.stats(),
        fatal,
    })
}

#[cfg(test)]
mod tests {
    use super::worker::tests::CannedFetcher;
    use super::*;
    use crate::config::CrawlConfig;
    use crate::output::BoundedChannel;
    use parking_lot::Mutex;
    use std::io;
    use url::Url;

    // A sink the test can read back after the run
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn site() -> Arc<dyn Fetch> {
        let mut fetcher = CannedFetcher::new();
        for i in 0..30 {
            let body = format!(r#"<a href="/{}"><a href="/{}">"#, (i + 1) % 30, (i * 7) % 30);
            fetcher = fetcher.html(&format!("http://site.test/{}", i), &body);
        }
        Arc::new(fetcher)
    }

    fn seeded_crawl(config: &CrawlConfig) -> Arc<Crawl> {
        let output = Arc::new(BoundedChannel::new(config.output_capacity));
        let crawl = Crawl::new(config, output).unwrap();
        crawl
            .seed(&[Url::parse("http://site.test/0").unwrap()])
            .unwrap();
        Arc::new(crawl)
    }

    #[tokio::test]
    async fn test_run_writes_every_page() {
        let config = CrawlConfig {
            workers: 4,
            output_capacity: 2,
            ..CrawlConfig::default()
        };
        let sink = SharedSink::default();

        let summary = run(seeded_crawl(&config), site(), config.workers, sink.clone())
            .await
            .unwrap();

        assert_eq!(summary.written, 30);
        assert_eq!(summary.stats.pages, 30);
        assert!(summary.fatal.is_none());

        let text = String::from_utf8(sink.0.lock().clone()).unwrap();
        assert_eq!(text.lines().count(), 30);
        assert!(text.lines().all(|line| line.starts_with("ok\t200\thttp://site.test/")));
    }

    #[tokio::test]
    async fn test_shutdown_before_run() {
        let config = CrawlConfig::default();
        let crawl = seeded_crawl(&config);
        crawl.shutdown();

        let summary = run(crawl, site(), 2, SharedSink::default()).await.unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.stats.pages, 0);
    }

    #[tokio::test]
    async fn test_broken_sink_ends_run_with_error() {
        let config = CrawlConfig {
            output_capacity: 1,
            ..CrawlConfig::default()
        };
        let result = run(seeded_crawl(&config), site(), 2, ClosedPipe).await;

        let error = result.unwrap_err();
        assert!(format!("{:#}", error).contains("reader went away"));
    }
}

// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap and build a CrawlConfig
// 2. Set up logging, the output channel and the shared crawl state
// 3. Seed the frontier and start the workers and the output drain
// 4. Watch for Ctrl-C and the run deadline, and shut the crawl down on either
// 5. Exit with proper code (0 = crawl finished, 2 = error)
//
// Rust concepts used:
// - async/await: the runtime waits on signals, timers and worker tasks
// - Result<T, E>: For error handling (T = success type, E = error type)
// - Arc: shared ownership of the crawl state between tasks
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - validated run settings
mod crawl; // src/crawl/ - workers, fetching and the run loop
mod domain; // src/domain/ - per-host dedup and queues
mod frontier; // src/frontier/ - chunked queue with disk spill
mod logging; // src/logging.rs - tracing setup
mod output; // src/output/ - bounded channel and page records
mod parse; // src/parse/ - HTTP header and HTML parsers

use clap::Parser; // Parser trait enables the parse() method
use cli::Cli;
use crawl::{Crawl, TcpFetcher};
use output::BoundedChannel;
use std::io::{self, BufWriter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

// anyhow::Result is like std::result::Result but simpler for applications
// It lets us return any error type with the ? operator
use anyhow::{Context, Result};

// The #[tokio::main] attribute transforms our async main into a real main function
// It creates a tokio runtime and runs our async code inside it
#[tokio::main]
async fn main() {
    logging::init();

    // Run our application logic and capture the exit code
    // std::process::exit() terminates the program with the given code
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // If an unexpected error occurred, log it and exit with code 2
            error!("{:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// This is the main application logic
// Returns:
//   Ok(0) = crawl finished (frontier empty, budget spent, deadline or Ctrl-C)
//   Ok(2) = crawl aborted by a fatal frontier error
//   Err = unexpected error
async fn run() -> Result<i32> {
    // Parse command-line arguments into our Cli struct
    // This will automatically handle --help, --version, etc.
    let cli = Cli::parse();
    let config = cli.crawl_config()?;

    let mut seeds = Vec::new();
    for seed in &cli.seeds {
        match crawl::parse_seed(seed) {
            Ok(url) if crawl::is_crawlable(&url) => seeds.push(url),
            Ok(url) => warn!(url = %url, "seed is not an http(s) URL, skipping"),
            Err(e) => warn!(seed = %seed, error = %e, "invalid seed URL, skipping"),
        }
    }
    if seeds.is_empty() {
        anyhow::bail!("no usable seed URL");
    }

    let output = Arc::new(BoundedChannel::new(config.output_capacity));
    let crawl = Arc::new(Crawl::new(&config, output).context("creating the spill file")?);
    let queued = crawl.seed(&seeds)?;
    info!(seeds = queued, workers = config.workers, "crawl starting");

    // Ctrl-C or the deadline ends the crawl early
    let watcher = tokio::spawn(watch_for_shutdown(Arc::clone(&crawl), config.duration));

    let fetcher = Arc::new(TcpFetcher::new(config.timeout));
    let sink = BufWriter::new(io::stdout());
    let summary = crawl::run(Arc::clone(&crawl), fetcher, config.workers, sink).await;
    watcher.abort();
    let summary = summary?;

    let stats = summary.stats;
    info!(
        pages = stats.pages,
        records = summary.written,
        fetch_failures = stats.fetch_failures,
        invalid_headers = stats.invalid_headers,
        spill_failures = stats.spill_failures,
        links_found = stats.links_found,
        links_queued = stats.links_queued,
        urls_seen = stats.urls_seen,
        spill_slots_used = stats.spill_slots_used,
        spill_slots = stats.spill_slots,
        domains = crawl.registry().domain_count(),
        pending = crawl.registry().pending(),
        "crawl finished"
    );

    match summary.fatal {
        Some(e) => {
            error!(error = %e, "crawl aborted");
            Ok(2) // Exit code 2 = the crawl could not go on
        }
        None => Ok(0),
    }
}

// Waits for Ctrl-C or the end of the run duration, whichever comes first
async fn watch_for_shutdown(crawl: Arc<Crawl>, duration: Option<Duration>) {
    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupted, shutting down"),
            Err(e) => {
                // Without a signal handler only the deadline can stop us
                warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupted => {}
        _ = deadline => info!("run duration reached, shutting down"),
    }

    crawl.shutdown();
}

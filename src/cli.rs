// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// clap is a popular Rust library for parsing command-line arguments.
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Every flag can also come from a SPILLCRAWL_* environment variable, which
// is handy when the crawler runs in a container.
//
// Rust concepts:
// - Structs: Custom data types that group related data
// - Derive macros: Automatically generate code for our types
// - Option<T>: a value that may be absent (0 on the command line means "no limit")
// =============================================================================

use crate::config::{ConfigError, CrawlConfig};
use crate::frontier::FrontierSettings;
use crate::output::OutputFormat;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "spillcrawl",
    version,
    about = "A bounded-memory web crawler that streams the links it finds",
    long_about = "spillcrawl crawls plain-HTTP sites starting from one or more seed URLs. \
                  Each fetched page is reported as one line on stdout; URLs waiting to be \
                  crawled spill to a temporary file once the in-memory queue is full."
)]
pub struct Cli {
    /// URLs to start from (http:// is assumed when no scheme is given)
    #[arg(required = true)]
    pub seeds: Vec<String>,

    /// Number of concurrent workers
    #[arg(long, env = "SPILLCRAWL_WORKERS", default_value_t = 8)]
    pub workers: usize,

    /// Stop after fetching this many pages (0 = no limit)
    #[arg(long, env = "SPILLCRAWL_MAX_PAGES", default_value_t = 0)]
    pub max_pages: usize,

    /// Stop after this many seconds (0 = no limit)
    #[arg(long, env = "SPILLCRAWL_DURATION", default_value_t = 0)]
    pub duration_secs: u64,

    /// Page records buffered before workers wait for the output
    #[arg(long, env = "SPILLCRAWL_OUTPUT_CAPACITY", default_value_t = 1024)]
    pub output_capacity: usize,

    /// Bytes per frontier chunk, in memory and on disk
    #[arg(long, env = "SPILLCRAWL_CHUNK_SIZE", default_value_t = 4096)]
    pub chunk_size: usize,

    /// In-memory chunks per domain before its frontier spills to disk
    #[arg(long, env = "SPILLCRAWL_RESIDENT_CHUNKS", default_value_t = 64)]
    pub resident_chunks: usize,

    /// Directory for the spill file (default: the system temp directory)
    #[arg(long, env = "SPILLCRAWL_SPILL_DIR")]
    pub spill_dir: Option<PathBuf>,

    /// Largest response header accepted, in bytes
    #[arg(long, env = "SPILLCRAWL_MAX_HEADER_BYTES", default_value_t = 65536)]
    pub max_header_bytes: usize,

    /// Longer URLs are ignored
    #[arg(long, env = "SPILLCRAWL_MAX_URL_LEN", default_value_t = 2048)]
    pub max_url_len: usize,

    /// Connect, read and write timeout in seconds
    #[arg(long, env = "SPILLCRAWL_TIMEOUT", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Only crawl these hosts, comma separated (default: any host)
    #[arg(long, env = "SPILLCRAWL_DOMAINS", default_value = "")]
    pub allowed_domains: String,

    /// Output one JSON object per page instead of tab-separated text
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Converts the parsed CLI into a validated `CrawlConfig`.
    pub fn crawl_config(&self) -> Result<CrawlConfig, ConfigError> {
        if self.seeds.is_empty() {
            return Err(ConfigError::NoSeeds);
        }

        let config = CrawlConfig {
            workers: self.workers,
            max_pages: (self.max_pages > 0).then_some(self.max_pages),
            duration: (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs)),
            output_capacity: self.output_capacity,
            frontier: FrontierSettings {
                chunk_size: self.chunk_size,
                resident_chunks: self.resident_chunks,
            },
            spill_dir: self.spill_dir.clone(),
            max_header_bytes: self.max_header_bytes,
            max_url_len: self.max_url_len,
            timeout: Duration::from_secs(self.timeout_secs),
            allowed_domains: self.domains_vec(),
            format: if self.json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn domains_vec(&self) -> Vec<String> {
        self.allowed_domains
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does env = "..." do?
//    - If the flag is not on the command line, clap reads that variable
//    - The command line always wins over the environment
//
// 2. Why Vec<String> for seeds?
//    - A positional argument of type Vec takes every remaining value
//    - required = true makes clap refuse to run without at least one
//
// 3. Why convert to CrawlConfig instead of passing Cli around?
//    - The rest of the crate does not need to know about clap
//    - Tests can build a CrawlConfig directly
//
// 4. What is then_some / then?
//    - bool::then_some(v) gives Some(v) if the bool is true, else None
//    - then(|| ...) does the same but only builds the value when needed
// -----------------------------------------------------------------------------

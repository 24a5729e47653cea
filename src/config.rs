// src/config.rs
// =============================================================================
// The settings of one crawl run, independent of how they were given.
//
// The CLI (src/cli.rs) builds a CrawlConfig and validate() rejects values
// that would make the crawl hang or do nothing before anything starts.
// =============================================================================

use crate::frontier::FrontierSettings;
use crate::output::OutputFormat;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("at least one seed URL is required")]
    NoSeeds,
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub workers: usize,
    /// Stop after this many fetches.
    pub max_pages: Option<usize>,
    /// Stop after this much wall-clock time.
    pub duration: Option<Duration>,
    pub output_capacity: usize,
    pub frontier: FrontierSettings,
    /// Directory for the spill file; the system temp dir when None.
    pub spill_dir: Option<PathBuf>,
    pub max_header_bytes: usize,
    pub max_url_len: usize,
    pub timeout: Duration,
    pub allowed_domains: Vec<String>,
    pub format: OutputFormat,
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("workers", self.workers),
            ("output capacity", self.output_capacity),
            ("chunk size", self.frontier.chunk_size),
            ("resident chunks", self.frontier.resident_chunks),
            ("max header bytes", self.max_header_bytes),
            ("max URL length", self.max_url_len),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(*name));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Zero("timeout"));
        }
        Ok(())
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            max_pages: None,
            duration: None,
            output_capacity: 1024,
            frontier: FrontierSettings::default(),
            spill_dir: None,
            max_header_bytes: crate::parse::DEFAULT_MAX_HEADER_BYTES,
            max_url_len: 2048,
            timeout: Duration::from_secs(10),
            allowed_domains: Vec::new(),
            format: OutputFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(CrawlConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let config = CrawlConfig {
            workers: 0,
            ..CrawlConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("workers")));

        let mut config = CrawlConfig::default();
        config.frontier.chunk_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("chunk size")));

        let config = CrawlConfig {
            timeout: Duration::ZERO,
            ..CrawlConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("timeout")));
    }
}

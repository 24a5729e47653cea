// src/logging.rs
// =============================================================================
// Diagnostics go to stderr through `tracing`; stdout is reserved for page
// records so it can be piped straight into another tool.
//
// RUST_LOG picks the level (default "info"), for example:
//   RUST_LOG=debug            every page as it finishes
//   RUST_LOG=spillcrawl=trace every request sent
// =============================================================================

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init() {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .init();
}

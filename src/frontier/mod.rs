// src/frontier/mod.rs
// =============================================================================
// The frontier: every URL we still have to fetch.
//
// Submodules:
// - chunked: in-memory FIFO of zero-terminated byte strings in fixed chunks
// - spill: bitmap-tracked file of fixed-size chunks used as overflow
// - tiered: the Frontier itself, resident chunks first and spill tail after
//
// Only allocation failure is fatal. Spill I/O failures are reported and the
// crawl keeps going with less capacity.
// =============================================================================

mod chunked;
mod spill;
mod tiered;

pub use chunked::ChunkedQueue;
pub use spill::{DiskSpillStore, SpillError};
pub use tiered::{Frontier, FrontierSettings, SpillBatch};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierError {
    /// A frontier chunk could not be allocated. The crawl cannot continue
    /// without losing URLs.
    #[error("out of memory allocating a {requested}-byte frontier chunk")]
    Exhausted { requested: usize },

    /// Entries are zero-terminated, so they cannot contain a zero byte.
    #[error("frontier entries cannot contain a zero byte")]
    EmbeddedZero,

    /// Writing a chunk to the spill store failed. The entries were kept in
    /// memory instead.
    #[error("failed to spill frontier chunk, kept in memory: {0}")]
    SpillWrite(#[source] SpillError),

    /// Reading a spilled chunk back failed and its entries are gone.
    #[error("failed to reload spilled frontier chunk, {lost} entries dropped: {source}")]
    SpillRead {
        #[source]
        source: SpillError,
        lost: usize,
    },
}

impl FrontierError {
    // Only resource exhaustion ends the crawl
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrontierError::Exhausted { .. })
    }
}

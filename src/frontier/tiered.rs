// src/frontier/tiered.rs
// =============================================================================
// The frontier of one domain: resident chunks in memory, overflow on disk.
//
// How it works:
// 1. Entries go into the resident ChunkedQueue while it holds fewer than
//    `resident_chunks` chunks.
// 2. Past that, entries are appended to a staging buffer instead. When the
//    next entry would not fit a spill chunk, the staging buffer is sealed
//    and handed back to the caller as a SpillBatch. The caller writes it to
//    the DiskSpillStore (outside its own lock) and reports the slot back
//    through settle(). Until then the sealed bytes stay in memory and can
//    be popped like any other segment.
// 3. While anything is staged or spilled, every new entry goes to the spill
//    side too (tail-only spill), so the spill tier is always strictly newer
//    than the resident tier and FIFO order holds across both.
// 4. Pops drain the resident queue. When it runs dry, the oldest spilled
//    segment (or finally the staging buffer) is loaded back into it.
//
// Spilled segments always hold whole entries, so a segment that cannot be
// read back loses exactly its own entries and nothing else.
// =============================================================================

use super::{ChunkedQueue, DiskSpillStore, FrontierError, SpillError};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierSettings {
    /// Bytes per resident chunk.
    pub chunk_size: usize,
    /// Resident chunks allowed before new entries spill.
    pub resident_chunks: usize,
}

impl Default for FrontierSettings {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            resident_chunks: 64,
        }
    }
}

enum Segment {
    // Written to the store; `entries` terminated entries inside
    Disk { slot: usize, entries: usize },
    // Could not be written (or too big for a slot), kept in memory
    Memory { bytes: Vec<u8>, entries: usize },
    // Handed out as SpillBatch `id`, write result not back yet
    Sealed { id: u64, bytes: Vec<u8>, entries: usize },
}

impl Segment {
    fn entries(&self) -> usize {
        match self {
            Segment::Disk { entries, .. }
            | Segment::Memory { entries, .. }
            | Segment::Sealed { entries, .. } => *entries,
        }
    }
}

/// A sealed run of spilled entries waiting to be written to the store.
///
/// Write it with `write()` and pass the result to `Frontier::settle`. The
/// frontier keeps its own copy of the bytes until then.
#[must_use = "a sealed batch stays in memory until it is written and settled"]
pub struct SpillBatch<S = File> {
    id: u64,
    bytes: Vec<u8>,
    store: Arc<DiskSpillStore<S>>,
}

impl<S: Read + Write + Seek> SpillBatch<S> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Writes the batch into a free slot of the store.
    pub fn write(&self) -> Result<usize, SpillError> {
        self.store.write(&self.bytes)
    }
}

pub struct Frontier<S = File> {
    resident: ChunkedQueue,
    resident_chunks: usize,
    store: Option<Arc<DiskSpillStore<S>>>,
    spilled: VecDeque<Segment>,
    staging: Vec<u8>,
    staging_entries: usize,
    next_batch: u64,
}

impl<S: Read + Write + Seek> Frontier<S> {
    /// A frontier that never spills.
    pub fn in_memory(chunk_size: usize) -> Self {
        Self::build(chunk_size, usize::MAX, None)
    }

    /// A frontier that spills into `store` once `settings.resident_chunks`
    /// chunks are in use.
    pub fn with_spill(settings: FrontierSettings, store: Arc<DiskSpillStore<S>>) -> Self {
        Self::build(settings.chunk_size, settings.resident_chunks, Some(store))
    }

    fn build(
        chunk_size: usize,
        resident_chunks: usize,
        store: Option<Arc<DiskSpillStore<S>>>,
    ) -> Self {
        Self {
            resident: ChunkedQueue::new(chunk_size),
            resident_chunks: resident_chunks.max(1),
            store,
            spilled: VecDeque::new(),
            staging: Vec::new(),
            staging_entries: 0,
            next_batch: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.resident.len() + self.spilled_len()
    }

    /// Entries currently outside the resident queue.
    pub fn spilled_len(&self) -> usize {
        self.spilled.iter().map(Segment::entries).sum::<usize>() + self.staging_entries
    }

    fn is_spilling(&self) -> bool {
        !self.spilled.is_empty() || self.staging_entries > 0
    }

    /// Queues `entry` at the back.
    ///
    /// Returns a batch when this push sealed a full run of spilled entries.
    /// The entry is queued either way; the batch only moves older entries
    /// to disk once written and settled.
    pub fn push(&mut self, entry: &[u8]) -> Result<Option<SpillBatch<S>>, FrontierError> {
        if entry.contains(&0) {
            return Err(FrontierError::EmbeddedZero);
        }

        // Stay resident until the ceiling is hit, then spill until drained
        let over_ceiling = self.resident.chunk_count() >= self.resident_chunks;
        let store = match &self.store {
            Some(store) if over_ceiling || self.is_spilling() => Arc::clone(store),
            _ => return self.resident.push(entry).map(|()| None),
        };

        let encoded_len = entry.len() + 1;
        let mut batch = None;
        // Staging buffer full: seal it so the caller can write it out
        if self.staging.len() + encoded_len > store.chunk_size() {
            batch = self.seal_staging(Arc::clone(&store));
        }

        if encoded_len > store.chunk_size() {
            // Never fits a slot on its own
            let mut bytes = Vec::with_capacity(encoded_len);
            bytes.extend_from_slice(entry);
            bytes.push(0);
            self.spilled.push_back(Segment::Memory { bytes, entries: 1 });
        } else {
            self.staging.extend_from_slice(entry);
            self.staging.push(0);
            self.staging_entries += 1;
        }

        Ok(batch)
    }

    /// Records where batch `id` ended up.
    ///
    /// On success the sealed bytes are dropped from memory. If the batch was
    /// popped while being written, the fresh slot is released again. A
    /// failed write keeps the entries in memory and comes back as
    /// `SpillWrite`; nothing is lost.
    pub fn settle(
        &mut self,
        id: u64,
        written: Result<usize, SpillError>,
    ) -> Result<(), FrontierError> {
        let position = self
            .spilled
            .iter()
            .position(|segment| matches!(segment, Segment::Sealed { id: sealed, .. } if *sealed == id));

        match (position, written) {
            (Some(at), Ok(slot)) => {
                let entries = self.spilled[at].entries();
                self.spilled[at] = Segment::Disk { slot, entries };
                Ok(())
            }
            (None, Ok(slot)) => {
                if let Some(store) = &self.store {
                    store.release(slot).map_err(FrontierError::SpillWrite)?;
                }
                Ok(())
            }
            // A sealed segment that failed to write is read like a Memory one
            (_, Err(e)) => Err(FrontierError::SpillWrite(e)),
        }
    }

    /// Removes the oldest entry.
    ///
    /// `Ok(None)` means the frontier is empty. `SpillRead` means a spilled
    /// segment was lost; later pops keep working.
    pub fn pop(&mut self) -> Result<Option<Vec<u8>>, FrontierError> {
        loop {
            // Resident entries are always the oldest
            if !self.resident.is_empty() {
                return Ok(self.resident.pop());
            }

            // Refill from the oldest spilled segment, then from staging
            match self.spilled.pop_front() {
                Some(Segment::Memory { bytes, .. }) | Some(Segment::Sealed { bytes, .. }) => {
                    self.resident.push_encoded(&bytes)?
                }
                Some(Segment::Disk { slot, entries }) => {
                    let store = self.store.as_ref().map(Arc::clone);
                    let Some(store) = store else {
                        continue;
                    };
                    match store.take(slot) {
                        Ok(bytes) => self.resident.push_encoded(&bytes)?,
                        Err(source) => {
                            return Err(FrontierError::SpillRead {
                                source,
                                lost: entries,
                            })
                        }
                    }
                }
                None if self.staging_entries > 0 => {
                    let staged = std::mem::take(&mut self.staging);
                    self.staging_entries = 0;
                    self.resident.push_encoded(&staged)?;
                }
                None => return Ok(None),
            }
        }
    }

    // Moves the staging buffer into the spill queue as a sealed segment
    fn seal_staging(&mut self, store: Arc<DiskSpillStore<S>>) -> Option<SpillBatch<S>> {
        if self.staging_entries == 0 {
            return None;
        }

        let bytes = std::mem::take(&mut self.staging);
        let entries = std::mem::replace(&mut self.staging_entries, 0);
        let id = self.next_batch;
        self.next_batch += 1;

        let batch = SpillBatch {
            id,
            bytes: bytes.clone(),
            store,
        };
        self.spilled.push_back(Segment::Sealed { id, bytes, entries });
        Some(batch)
    }
}

impl<S> Drop for Frontier<S> {
    fn drop(&mut self) {
        // Hand spilled slots back so a shared store can reuse them
        if let Some(store) = &self.store {
            for segment in &self.spilled {
                if let Segment::Disk { slot, .. } = segment {
                    let _ = store.release(*slot);
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why does push() return a SpillBatch instead of writing to disk?
//    - Frontiers live behind a per-domain lock
//    - Returning the batch lets the caller drop that lock before the
//      (slow) disk write
//
// 2. What does #[must_use] on SpillBatch do?
//    - The compiler warns if a caller ignores a returned batch
//    - An ignored batch would stay in memory forever
//
// 3. What is std::mem::take?
//    - Moves the value out and leaves Default::default() in its place
//    - Handy to empty the staging buffer without cloning it
//
// 4. Why implement Drop for Frontier?
//    - Disk slots belong to the shared store
//    - When a frontier goes away its slots must be handed back
// -----------------------------------------------------------------------------

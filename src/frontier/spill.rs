// src/frontier/spill.rs
// =============================================================================
// Overflow storage for the frontier: a file cut into fixed-size slots.
//
// Every slot holds one chunk as a 4-byte little-endian length followed by
// up to `chunk_size` payload bytes. An occupancy bitmap (one bit per slot)
// says which slots hold live data. Allocation is a linear scan for the first
// clear bit; when every slot is taken, the bitmap and the file both grow by
// GROWTH_SLOTS slots.
//
// One mutex guards the bitmap and the file together, so a slot is never
// handed out twice and reads never see a half-written chunk.
// =============================================================================

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

// Slots added to the bitmap (and the file) when none is free
pub const GROWTH_SLOTS: usize = 512;

const LENGTH_PREFIX: usize = 4;

#[derive(Debug, Error)]
pub enum SpillError {
    #[error("spill slot {0} is not occupied")]
    NotOccupied(usize),

    #[error("{len} bytes do not fit a {capacity}-byte spill chunk")]
    TooLarge { len: usize, capacity: usize },

    #[error("spill slot {index} is corrupt (stored length {len})")]
    Corrupt { index: usize, len: usize },

    #[error("spill store I/O failed: {0}")]
    Io(#[from] io::Error),
}

struct Slots<S> {
    store: S,
    occupied: Vec<u8>,
    in_use: usize,
}

impl<S> Slots<S> {
    fn slot_count(&self) -> usize {
        self.occupied.len() * 8
    }

    fn is_set(&self, index: usize) -> bool {
        self.occupied
            .get(index / 8)
            .map_or(false, |byte| byte & (1 << (index % 8)) != 0)
    }

    fn set(&mut self, index: usize) {
        self.occupied[index / 8] |= 1 << (index % 8);
        self.in_use += 1;
    }

    fn clear(&mut self, index: usize) {
        self.occupied[index / 8] &= !(1 << (index % 8));
        self.in_use -= 1;
    }

    fn first_free(&self) -> Option<usize> {
        self.occupied
            .iter()
            .position(|&byte| byte != u8::MAX)
            .map(|at| at * 8 + (!self.occupied[at]).trailing_zeros() as usize)
    }
}

pub struct DiskSpillStore<S = File> {
    slots: Mutex<Slots<S>>,
    chunk_size: usize,
}

impl DiskSpillStore<File> {
    /// Spills into an anonymous temporary file that disappears on exit.
    pub fn temporary(chunk_size: usize) -> io::Result<Self> {
        Ok(Self::new(tempfile::tempfile()?, chunk_size))
    }

    /// Spills into an anonymous file created inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, chunk_size: usize) -> io::Result<Self> {
        Ok(Self::new(tempfile::tempfile_in(dir)?, chunk_size))
    }
}

impl<S> DiskSpillStore<S> {
    /// Largest payload a single slot accepts.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Slots currently holding data.
    pub fn occupied(&self) -> usize {
        self.slots.lock().in_use
    }

    /// Slots tracked by the bitmap, free or not.
    pub fn capacity(&self) -> usize {
        self.slots.lock().slot_count()
    }

    /// Frees slot `index` without reading it.
    pub fn release(&self, index: usize) -> Result<(), SpillError> {
        let mut slots = self.slots.lock();
        if !slots.is_set(index) {
            return Err(SpillError::NotOccupied(index));
        }
        slots.clear(index);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn with_store(&self, f: impl FnOnce(&mut S)) {
        f(&mut self.slots.lock().store)
    }
}

impl<S: Read + Write + Seek> DiskSpillStore<S> {
    pub fn new(store: S, chunk_size: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                store,
                occupied: Vec::new(),
                in_use: 0,
            }),
            chunk_size: chunk_size.max(1),
        }
    }

    fn stride(&self) -> u64 {
        (LENGTH_PREFIX + self.chunk_size) as u64
    }

    /// Stores `chunk` in a free slot and returns the slot index.
    pub fn write(&self, chunk: &[u8]) -> Result<usize, SpillError> {
        if chunk.len() > self.chunk_size {
            return Err(SpillError::TooLarge {
                len: chunk.len(),
                capacity: self.chunk_size,
            });
        }

        let mut slots = self.slots.lock();
        let index = match slots.first_free() {
            Some(index) => index,
            None => self.grow(&mut slots)?,
        };

        // Claim the slot first so a failed write can hand it straight back
        slots.set(index);
        let written = Self::write_slot(&mut slots.store, index as u64 * self.stride(), chunk);
        if let Err(e) = written {
            slots.clear(index);
            return Err(e.into());
        }
        Ok(index)
    }

    /// Reads the chunk in slot `index` and frees the slot.
    ///
    /// The slot is freed even when the read fails; its contents are lost.
    pub fn take(&self, index: usize) -> Result<Vec<u8>, SpillError> {
        let mut slots = self.slots.lock();
        if !slots.is_set(index) {
            return Err(SpillError::NotOccupied(index));
        }
        slots.clear(index);

        let offset = index as u64 * self.stride();
        let chunk = Self::read_slot(&mut slots.store, offset, self.chunk_size, index)?;
        Ok(chunk)
    }

    // Extends the file and the bitmap, returning the first new slot
    fn grow(&self, slots: &mut Slots<S>) -> Result<usize, SpillError> {
        let first_new = slots.slot_count();
        let new_end = (first_new + GROWTH_SLOTS) as u64 * self.stride();

        // Writing the last byte makes the store cover every new slot
        slots.store.seek(SeekFrom::Start(new_end - 1))?;
        slots.store.write_all(&[0])?;

        slots
            .occupied
            .resize(slots.occupied.len() + GROWTH_SLOTS / 8, 0);
        Ok(first_new)
    }

    fn write_slot(store: &mut S, offset: u64, chunk: &[u8]) -> io::Result<()> {
        store.seek(SeekFrom::Start(offset))?;
        store.write_all(&(chunk.len() as u32).to_le_bytes())?;
        store.write_all(chunk)?;
        store.flush()
    }

    fn read_slot(
        store: &mut S,
        offset: u64,
        capacity: usize,
        index: usize,
    ) -> Result<Vec<u8>, SpillError> {
        store.seek(SeekFrom::Start(offset))?;

        let mut prefix = [0u8; LENGTH_PREFIX];
        store.read_exact(&mut prefix)?;
        let len = u32::from_le_bytes(prefix) as usize;
        if len > capacity {
            return Err(SpillError::Corrupt { index, len });
        }

        let mut chunk = vec![0u8; len];
        store.read_exact(&mut chunk)?;
        Ok(chunk)
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is the occupancy bitmap?
//    - One bit per slot: 1 = holds a chunk, 0 = free
//    - Eight slots fit in one byte of the Vec<u8>
//
// 2. Why is DiskSpillStore generic over S?
//    - Anything that is Read + Write + Seek works as the backing store
//    - The binary uses a real File; the tests use an in-memory Cursor
//
// 3. Why take &self and not &mut self in write() and take()?
//    - Many frontiers share one store through an Arc
//    - The Mutex inside gives each call exclusive access for its duration
//
// 4. What does #[from] on SpillError::Io do?
//    - thiserror generates From<io::Error>, so `?` converts I/O errors
// -----------------------------------------------------------------------------

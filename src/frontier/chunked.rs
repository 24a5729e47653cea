// src/frontier/chunked.rs
// =============================================================================
// An in-memory FIFO of byte strings stored back to back in fixed-size chunks.
//
// Layout:
// - Every chunk is a boxed byte slice of `chunk_size` bytes with two cursors,
//   `begin` (next byte to read) and `end` (next byte to write), and
//   begin <= end <= chunk_size always holds.
// - Entries are written followed by a zero byte and may cross from one chunk
//   into the next.
// - Chunks are dropped as soon as they are fully read.
//
// All cursor arithmetic stays inside this file; callers only see push/pop.
// =============================================================================

use super::FrontierError;
use std::collections::VecDeque;

const TERMINATOR: u8 = 0;

struct Chunk {
    bytes: Box<[u8]>,
    begin: usize,
    end: usize,
}

impl Chunk {
    // Allocates without aborting the process when memory is short
    fn allocate(size: usize) -> Result<Self, FrontierError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| FrontierError::Exhausted { requested: size })?;
        bytes.resize(size, 0);

        Ok(Self {
            bytes: bytes.into_boxed_slice(),
            begin: 0,
            end: 0,
        })
    }

    fn free(&self) -> usize {
        self.bytes.len() - self.end
    }

    fn unread(&self) -> &[u8] {
        &self.bytes[self.begin..self.end]
    }

    // Copies as much of `input` as fits and returns how many bytes it took
    fn write(&mut self, input: &[u8]) -> usize {
        let count = input.len().min(self.free());
        self.bytes[self.end..self.end + count].copy_from_slice(&input[..count]);
        self.end += count;
        count
    }

    fn is_drained(&self) -> bool {
        self.begin == self.end
    }
}

pub struct ChunkedQueue {
    chunks: VecDeque<Chunk>,
    chunk_size: usize,
    // Complete (terminated) entries currently stored
    entries: usize,
}

impl ChunkedQueue {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            chunk_size: chunk_size.max(1),
            entries: 0,
        }
    }

    /// Number of chunks currently allocated.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Appends `entry` followed by its terminator.
    pub fn push(&mut self, entry: &[u8]) -> Result<(), FrontierError> {
        if entry.contains(&TERMINATOR) {
            return Err(FrontierError::EmbeddedZero);
        }

        self.write_all(entry)?;
        self.write_all(&[TERMINATOR])?;
        self.entries += 1;
        Ok(())
    }

    /// Appends bytes that are already a run of terminated entries, such as a
    /// chunk read back from the spill store.
    pub fn push_encoded(&mut self, encoded: &[u8]) -> Result<(), FrontierError> {
        self.write_all(encoded)?;
        self.entries += encoded.iter().filter(|&&b| b == TERMINATOR).count();
        Ok(())
    }

    /// Removes the oldest entry and returns its bytes.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        let mut entry = Vec::new();
        let found = self.pop_with(|part| entry.extend_from_slice(part));
        found.then_some(entry)
    }

    /// Removes the oldest entry, copying at most `buffer.len()` bytes of it
    /// into `buffer`. The rest of an entry that does not fit is discarded.
    ///
    /// Returns the number of bytes copied.
    #[cfg(test)]
    pub fn pop_into(&mut self, buffer: &mut [u8]) -> Option<usize> {
        let mut copied = 0;
        let found = self.pop_with(|part| {
            let count = part.len().min(buffer.len() - copied);
            buffer[copied..copied + count].copy_from_slice(&part[..count]);
            copied += count;
        });
        found.then_some(copied)
    }

    fn write_all(&mut self, mut input: &[u8]) -> Result<(), FrontierError> {
        while !input.is_empty() {
            let needs_chunk = self.chunks.back().map_or(true, |tail| tail.free() == 0);
            if needs_chunk {
                self.chunks.push_back(Chunk::allocate(self.chunk_size)?);
            }

            let tail = self
                .chunks
                .back_mut()
                .ok_or(FrontierError::Exhausted { requested: self.chunk_size })?;
            let written = tail.write(input);
            input = &input[written..];
        }
        Ok(())
    }

    // Feeds the oldest entry to `sink` one chunk-sized piece at a time
    fn pop_with(&mut self, mut sink: impl FnMut(&[u8])) -> bool {
        if self.entries == 0 {
            return false;
        }

        loop {
            let Some(head) = self.chunks.front_mut() else {
                // entries > 0 guarantees a terminator is stored somewhere
                self.entries = 0;
                return false;
            };

            let unread = head.unread();
            match unread.iter().position(|&b| b == TERMINATOR) {
                Some(at) => {
                    sink(&unread[..at]);
                    head.begin += at + 1;
                    self.release_head();
                    self.entries -= 1;
                    return true;
                }
                None => {
                    sink(unread);
                    head.begin = head.end;
                    self.release_head();
                }
            }
        }
    }

    // Unlinks the head chunk once everything written to it has been read
    fn release_head(&mut self) {
        let several = self.chunks.len() > 1;
        let Some(head) = self.chunks.front_mut() else {
            return;
        };
        if !head.is_drained() {
            return;
        }

        if head.free() == 0 || several {
            self.chunks.pop_front();
        } else {
            // The only chunk still has room: rewind it instead of freeing it
            head.begin = 0;
            head.end = 0;
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why fixed-size chunks instead of one big Vec?
//    - A big Vec doubles (and copies) when it grows
//    - Chunks are allocated one at a time and freed as soon as they are read
//
// 2. What is try_reserve_exact?
//    - A Vec allocation that returns an error instead of aborting the
//      process when memory runs out
//
// 3. Why is pop_with generic over FnMut?
//    - pop() and pop_into() differ only in where the bytes go
//    - The closure receives each piece of the entry in turn
//
// 4. What does then_some do?
//    - bool::then_some(v) gives Some(v) if the bool is true, else None
// -----------------------------------------------------------------------------

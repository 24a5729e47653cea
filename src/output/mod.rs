// src/output/mod.rs
// =============================================================================
// Everything between a finished page and the output sink.
//
// Submodules:
// - channel: the bounded blocking queue workers push into
// - record: page reports and their line formats
//
// This file holds the drain loop: the one consumer that pops records and
// writes them, one per line.
// =============================================================================

mod channel;
mod record;

pub use channel::BoundedChannel;
pub use record::{OutputFormat, OutputRecord, PageReport, PageStatus};

use std::io::{self, Write};

// Writes every record to `sink` until the channel is closed and empty.
//
// Returns how many records were written. If the sink fails (for example a
// closed pipe), the channel is closed so producers stop, and the error is
// returned.
pub fn drain<W: Write>(channel: &BoundedChannel<OutputRecord>, mut sink: W) -> io::Result<usize> {
    let mut written = 0;

    while let Some(record) = channel.pop() {
        let result = sink
            .write_all(record.as_bytes())
            .and_then(|()| sink.write_all(b"\n"));

        if let Err(e) = result {
            channel.close();
            return Err(e);
        }
        written += 1;
    }

    if let Err(e) = sink.flush() {
        channel.close();
        return Err(e);
    }
    Ok(written)
}

// src/output/channel.rs
// =============================================================================
// A bounded, blocking, closable queue between the crawl workers and the
// single thread that writes results.
//
// - push() blocks while the queue is full. This is the backpressure point:
//   a slow consumer slows the workers down instead of growing memory.
// - pop() blocks while the queue is empty.
// - close() wakes everybody. After it, pushes are silently dropped and pops
//   return what is left, then None.
//
// One mutex protects the queue and the closed flag; two condition variables
// let pushers and poppers wait for different events.
// =============================================================================

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

pub struct BoundedChannel<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BoundedChannel<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Appends `item`, waiting for room if the channel is full.
    ///
    /// Returns false when the channel was closed before the item could be
    /// stored; the item is dropped in that case.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();
        while state.queue.len() >= self.capacity && !state.closed {
            self.not_full.wait(&mut state);
        }

        if state.closed {
            return false;
        }

        state.queue.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Takes the oldest item, waiting while the channel is empty and open.
    ///
    /// Returns None once the channel is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        while state.queue.is_empty() && !state.closed {
            self.not_empty.wait(&mut state);
        }

        let item = state.queue.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Marks the channel closed and wakes every waiting thread.
    /// Closing twice is harmless.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);

        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is a Condvar?
//    - A condition variable lets a thread sleep until another thread says
//      something changed
//    - wait() releases the mutex while sleeping and takes it back on wake
//
// 2. Why loop around wait()?
//    - A thread can wake up without the condition being true
//    - The while loop checks again before going on
//
// 3. Why two condvars?
//    - Producers wait for room (not_full), consumers wait for items
//      (not_empty)
//    - Each side only wakes the threads that can make progress
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_single_producer() {
        let channel = BoundedChannel::new(4);
        for i in 0..4 {
            assert!(channel.push(i));
        }
        assert_eq!(channel.len(), 4);

        channel.close();
        let drained: Vec<_> = std::iter::from_fn(|| channel.pop()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_push_after_close_is_dropped() {
        let channel = BoundedChannel::new(2);
        channel.close();
        assert!(!channel.push("late"));
        assert_eq!(channel.len(), 0);
        assert_eq!(channel.pop(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let channel: BoundedChannel<u8> = BoundedChannel::new(1);
        channel.close();
        channel.close();
        assert!(channel.is_closed());
    }

    #[test]
    fn test_close_wakes_blocked_pusher() {
        let channel = Arc::new(BoundedChannel::new(1));
        assert!(channel.push(1));

        let pusher = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.push(2))
        };

        thread::sleep(Duration::from_millis(50));
        channel.close();

        // The blocked push gives up once the channel closes
        assert!(!pusher.join().unwrap());
        assert_eq!(channel.pop(), Some(1));
        assert_eq!(channel.pop(), None);
    }

    #[test]
    fn test_close_wakes_blocked_popper() {
        let channel: Arc<BoundedChannel<u32>> = Arc::new(BoundedChannel::new(1));
        let popper = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.pop())
        };

        thread::sleep(Duration::from_millis(50));
        channel.close();
        assert_eq!(popper.join().unwrap(), None);
    }

    #[test]
    fn test_many_producers_one_consumer() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 500;
        const CAPACITY: usize = 4;

        let channel = Arc::new(BoundedChannel::new(CAPACITY));
        let high_water = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let channel = Arc::clone(&channel);
                let high_water = Arc::clone(&high_water);
                thread::spawn(move || {
                    for n in 0..PER_PRODUCER {
                        assert!(channel.push((producer, n)));
                        high_water.fetch_max(channel.len(), Ordering::Relaxed);
                    }
                })
            })
            .collect();

        let consumer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let mut received = Vec::new();
                while let Some(item) = channel.pop() {
                    received.push(item);
                }
                received
            })
        };

        for producer in producers {
            producer.join().unwrap();
        }
        channel.close();
        let received = consumer.join().unwrap();

        assert_eq!(received.len(), PRODUCERS * PER_PRODUCER);
        assert!(high_water.load(Ordering::Relaxed) <= CAPACITY);

        // Each producer's own items arrive in the order it pushed them
        for producer in 0..PRODUCERS {
            let mine: Vec<_> = received
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, n)| *n)
                .collect();
            assert_eq!(mine, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
}

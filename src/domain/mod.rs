// src/domain/mod.rs
// =============================================================================
// One Domain per host we have seen.
//
// A Domain owns that host's VisitedSet and its Frontier (the backlog of
// URLs still to fetch) behind a single lock, so "have we seen this URL?"
// and "queue it" happen as one step. Two workers finding the same link at
// the same moment cannot both queue it.
//
// The domain lock is never held across disk I/O: when a push seals a spill
// batch, the batch is written after the lock is dropped and the result is
// settled under a fresh lock.
//
// Submodules:
// - visited: the FNV-1a hash set
// - registry: host -> Domain map and round-robin scheduling
// =============================================================================

mod registry;
mod visited;

pub use registry::{DomainRegistry, Offer};
pub use visited::VisitedSet;

use crate::frontier::{DiskSpillStore, Frontier, FrontierError, FrontierSettings};
use parking_lot::Mutex;
use std::sync::Arc;

struct DomainState {
    visited: VisitedSet,
    frontier: Frontier,
}

pub struct Domain {
    host: String,
    state: Mutex<DomainState>,
}

impl Domain {
    /// Creates a domain whose frontier spills into `store` when given, and
    /// stays entirely in memory otherwise.
    pub fn new(
        host: impl Into<String>,
        settings: FrontierSettings,
        store: Option<Arc<DiskSpillStore>>,
    ) -> Self {
        let frontier = match store {
            Some(store) => Frontier::with_spill(settings, store),
            None => Frontier::in_memory(settings.chunk_size),
        };

        Self {
            host: host.into(),
            state: Mutex::new(DomainState {
                visited: VisitedSet::new(),
                frontier,
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Queues `url` unless it was offered before.
    ///
    /// Returns Ok(true) if the URL is new. A `SpillWrite` error still means
    /// the URL was queued (in memory); any other error means it was not.
    pub fn offer(&self, url: &str) -> Result<bool, FrontierError> {
        let batch = {
            let mut state = self.state.lock();
            if state.visited.test_and_set(url.as_bytes()) {
                return Ok(false);
            }
            state.frontier.push(url.as_bytes())?
        };

        if let Some(batch) = batch {
            let written = batch.write();
            self.state.lock().frontier.settle(batch.id(), written)?;
        }
        Ok(true)
    }

    /// Takes the oldest queued URL of this domain.
    pub fn next_url(&self) -> Result<Option<String>, FrontierError> {
        let entry = self.state.lock().frontier.pop()?;
        Ok(entry.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// URLs still queued.
    pub fn pending(&self) -> usize {
        self.state.lock().frontier.len()
    }

    /// URLs ever queued.
    pub fn visited(&self) -> usize {
        self.state.lock().visited.len()
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why put VisitedSet and Frontier behind one Mutex?
//    - "Seen before?" and "queue it" must happen together
//    - With two locks, two threads could both see the URL as new
//
// 2. Why is the batch written outside the lock?
//    - Disk writes are slow
//    - Other workers offering URLs to the same domain should not wait
//      for them
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn small_settings() -> FrontierSettings {
        FrontierSettings {
            chunk_size: 64,
            resident_chunks: 1,
        }
    }

    #[test]
    fn test_offer_dedups() {
        let domain = Domain::new("example.com", small_settings(), None);

        assert!(domain.offer("http://example.com/").unwrap());
        assert!(!domain.offer("http://example.com/").unwrap());
        assert!(domain.offer("http://example.com/about").unwrap());
        assert_eq!(domain.pending(), 2);
        assert_eq!(domain.visited(), 2);
    }

    #[test]
    fn test_popped_url_is_still_visited() {
        let domain = Domain::new("example.com", small_settings(), None);
        domain.offer("http://example.com/a").unwrap();

        assert_eq!(domain.next_url().unwrap().as_deref(), Some("http://example.com/a"));
        assert_eq!(domain.next_url().unwrap(), None);
        assert!(!domain.offer("http://example.com/a").unwrap());
    }

    #[test]
    fn test_spilling_domain_keeps_order() {
        let store = Arc::new(DiskSpillStore::temporary(64).unwrap());
        let domain = Domain::new("example.com", small_settings(), Some(store));

        let urls: Vec<String> = (0..100)
            .map(|i| format!("http://example.com/{}", i))
            .collect();
        for url in &urls {
            assert!(domain.offer(url).unwrap());
        }

        let popped: Vec<String> = std::iter::from_fn(|| domain.next_url().unwrap()).collect();
        assert_eq!(popped, urls);
    }

    #[test]
    fn test_concurrent_offers_queue_once() {
        let domain = Arc::new(Domain::new("example.com", small_settings(), None));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let domain = Arc::clone(&domain);
                std::thread::spawn(move || {
                    (0..200)
                        .filter(|i| {
                            domain
                                .offer(&format!("http://example.com/{}", i))
                                .unwrap()
                        })
                        .count()
                })
            })
            .collect();

        let queued: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(queued, 200);
        assert_eq!(domain.pending(), 200);
    }

    #[test]
    fn test_concurrent_spilling_offers_keep_every_url() {
        let store = Arc::new(DiskSpillStore::temporary(64).unwrap());
        let domain = Arc::new(Domain::new("example.com", small_settings(), Some(Arc::clone(&store))));

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let domain = Arc::clone(&domain);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let url = format!("http://example.com/{}/{}", worker, i);
                        assert!(domain.offer(&url).unwrap());
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(domain.pending(), 400);
        assert!(store.occupied() > 0);

        let mut popped: Vec<String> = std::iter::from_fn(|| domain.next_url().unwrap()).collect();
        assert_eq!(popped.len(), 400);
        popped.sort();
        popped.dedup();
        assert_eq!(popped.len(), 400);
        assert_eq!(store.occupied(), 0);
    }
}

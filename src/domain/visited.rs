// src/domain/visited.rs
// =============================================================================
// Per-domain record of URLs we have already queued.
//
// We do not store the URLs themselves, only a 64-bit FNV-1a hash of each
// one. Two different URLs with the same hash are treated as the same URL;
// that false dedup is accepted, never corrected.
//
// The hashes live in a plain Vec that grows in steps of 1024 slots and is
// scanned linearly. Domains are small enough that this beats a HashSet on
// memory, and the caller (Domain) holds the lock that makes test-and-set
// atomic.
// =============================================================================

/// FNV-1a 64-bit offset basis.
pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a 64-bit prime.
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

// Number of slots added every time the hash array is full
pub const GROWTH_STEP: usize = 1024;

// Hashes exactly `bytes.len()` bytes; a zero byte does not end the input.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// The set of visited URL hashes for one domain
pub struct VisitedSet {
    hashes: Vec<u64>,
    hasher: fn(&[u8]) -> u64,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::with_hasher(fnv1a)
    }

    // Builds a set that hashes with `hasher` instead of FNV-1a.
    // Only tests swap the hash, to force collisions.
    pub fn with_hasher(hasher: fn(&[u8]) -> u64) -> Self {
        Self {
            hashes: Vec::new(),
            hasher,
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.hashes.capacity()
    }

    // Records `url` as visited.
    //
    // Returns true when the URL (or another URL with the same hash) was
    // already recorded, false when this call inserted it.
    pub fn test_and_set(&mut self, url: &[u8]) -> bool {
        let hash = (self.hasher)(url);

        if self.hashes.iter().any(|&seen| seen == hash) {
            return true;
        }

        if self.hashes.len() == self.hashes.capacity() {
            self.hashes.reserve_exact(GROWTH_STEP);
        }
        self.hashes.push(hash);
        false
    }
}

impl Default for VisitedSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_known_vectors() {
        // Reference values from the FNV test suite
        assert_eq!(fnv1a(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let url = b"http://example.com/a?b=c";
        assert_eq!(fnv1a(url), fnv1a(url));
    }

    #[test]
    fn test_embedded_zero_is_hashed() {
        assert_ne!(fnv1a(b"ab\0c"), fnv1a(b"ab"));
    }

    #[test]
    fn test_and_set_false_then_true() {
        let mut visited = VisitedSet::new();
        assert!(!visited.test_and_set(b"http://example.com/"));
        assert!(visited.test_and_set(b"http://example.com/"));
        assert!(visited.test_and_set(b"http://example.com/"));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_distinct_urls_are_kept_apart() {
        let mut visited = VisitedSet::new();
        assert!(!visited.test_and_set(b"http://example.com/a"));
        assert!(!visited.test_and_set(b"http://example.com/b"));
        assert_eq!(visited.len(), 2);
    }

    #[test]
    fn test_collision_is_reported_as_visited() {
        fn constant(_: &[u8]) -> u64 {
            42
        }

        let mut visited = VisitedSet::with_hasher(constant);
        assert!(!visited.test_and_set(b"http://example.com/a"));
        // Different URL, same hash: accepted false dedup
        assert!(visited.test_and_set(b"http://example.com/b"));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_grows_in_fixed_steps() {
        let mut visited = VisitedSet::new();
        for i in 0..(GROWTH_STEP + 1) {
            let url = format!("http://example.com/{}", i);
            assert!(!visited.test_and_set(url.as_bytes()));
        }
        assert_eq!(visited.len(), GROWTH_STEP + 1);
        assert!(visited.capacity() >= 2 * GROWTH_STEP);
    }
}

// src/domain/registry.rs
// =============================================================================
// Routes URLs to their Domain and hands out work across domains.
//
// - offer(): looks up (or creates) the Domain for the URL's host and queues
//   the URL there.
// - next_url(): walks the domains round-robin starting after the last one
//   served, so one huge site does not starve the others.
//
// Domains live for the whole run. All of them share one spill store.
// =============================================================================

use super::Domain;
use crate::frontier::{DiskSpillStore, FrontierError, FrontierSettings};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// What happened to an offered URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    AlreadyVisited,
    /// No host, or the host is not on the allowlist.
    Rejected,
}

pub struct DomainRegistry {
    domains: DashMap<String, Arc<Domain>>,
    // Same domains in creation order, for round-robin
    ring: RwLock<Vec<Arc<Domain>>>,
    cursor: AtomicUsize,
    settings: FrontierSettings,
    store: Option<Arc<DiskSpillStore>>,
    allowed_domains: Vec<String>,
}

impl DomainRegistry {
    pub fn new(
        settings: FrontierSettings,
        store: Option<Arc<DiskSpillStore>>,
        allowed_domains: Vec<String>,
    ) -> Self {
        Self {
            domains: DashMap::new(),
            ring: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            settings,
            store,
            allowed_domains,
        }
    }

    /// Empty allowlist means every host is allowed.
    pub fn is_domain_allowed(&self, host: &str) -> bool {
        self.allowed_domains.is_empty()
            || self
                .allowed_domains
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host))
    }

    pub fn offer(&self, url: &Url) -> Result<Offer, FrontierError> {
        let Some(host) = url.host_str() else {
            return Ok(Offer::Rejected);
        };
        if !self.is_domain_allowed(host) {
            return Ok(Offer::Rejected);
        }

        let domain = self.domain(host);
        match domain.offer(url.as_str())? {
            true => Ok(Offer::Queued),
            false => Ok(Offer::AlreadyVisited),
        }
    }

    // Finds the domain for `host`, creating it on first sight
    fn domain(&self, host: &str) -> Arc<Domain> {
        if let Some(existing) = self.domains.get(host) {
            return Arc::clone(existing.value());
        }

        let entry = self.domains.entry(host.to_string()).or_insert_with(|| {
            let domain = Arc::new(Domain::new(host, self.settings, self.store.clone()));
            self.ring.write().push(Arc::clone(&domain));
            tracing::debug!(host = domain.host(), "new domain");
            domain
        });
        Arc::clone(entry.value())
    }

    /// Takes one URL from the next domain that has work.
    ///
    /// A spill read failure on one domain is returned at once; the caller
    /// decides whether to keep going.
    pub fn next_url(&self) -> Result<Option<String>, FrontierError> {
        // Domain locks never take the ring lock, so holding it here is safe
        let ring = self.ring.read();
        if ring.is_empty() {
            return Ok(None);
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..ring.len() {
            let domain = &ring[(start + offset) % ring.len()];
            if let Some(url) = domain.next_url()? {
                return Ok(Some(url));
            }
        }
        Ok(None)
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// Distinct URLs ever queued across all domains.
    pub fn visited(&self) -> usize {
        self.ring.read().iter().map(|domain| domain.visited()).sum()
    }

    /// URLs queued across all domains.
    pub fn pending(&self) -> usize {
        self.ring.read().iter().map(|domain| domain.pending()).sum()
    }
}

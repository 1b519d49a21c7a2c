//! Retrieval result cache
//!
//! TTL-keyed cache over full parameter tuples. Entries hold immutable
//! document snapshots, so hits hand out clones without synchronization
//! concerns.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use newsloom_core::Document;
use tracing::debug;

/// TTL cache for retrieval results
pub struct RetrievalCache {
    ttl: Duration,
    entries: DashMap<String, (Instant, Vec<Document>)>,
}

impl RetrievalCache {
    /// Cache with the given entry lifetime
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Look up a fresh entry; expired entries are evicted on the way
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<Document>> {
        if self.ttl.is_zero() {
            return None;
        }
        match self.entries.get(key) {
            Some(entry) if entry.0.elapsed() < self.ttl => {
                debug!(key, "retrieval cache hit");
                Some(entry.1.clone())
            }
            Some(_) => {
                drop(self.entries.remove(key));
                None
            }
            None => None,
        }
    }

    /// Store a result snapshot
    pub fn put(&self, key: String, docs: Vec<Document>) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(key, (Instant::now(), docs));
    }

    /// Entries currently held (fresh or not yet evicted)
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

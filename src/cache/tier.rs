//! In-memory cache tiers.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::CacheEntry;
use crate::models::ArchetypeKey;

/// Concurrent in-memory map of cache entries.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: DashMap<ArchetypeKey, CacheEntry>,
    next_revision: AtomicU64,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloned entry for a key.
    pub fn get(&self, key: &ArchetypeKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|r| r.clone())
    }

    /// Revision of the held entry, without cloning it.
    pub fn revision(&self, key: &ArchetypeKey) -> Option<u64> {
        self.entries.get(key).map(|r| r.revision)
    }

    /// Next write stamp, unique for this tier.
    pub fn next_revision(&self) -> u64 {
        self.next_revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn insert(&self, entry: CacheEntry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn remove(&self, key: &ArchetypeKey) -> Option<CacheEntry> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> Vec<ArchetypeKey> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

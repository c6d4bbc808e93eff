//! Tiered cache of raw samples and derived analysis.
//!
//! Every archetype key moves through the states in [`CacheState`]. The
//! [`CacheManager`] is the single place where divergent or stale entries
//! are repaired: collect the raw sample if missing, analyze it, and write
//! the result back to every tier.
//!
//! Tiers, checked in order:
//! - session: owned by one manager
//! - process: shared between managers in the same process
//! - durable: a [`DurableStore`], one record per key

pub mod entry;
pub mod manager;
pub mod tier;

pub use entry::{CacheEntry, CacheState};
pub use manager::{CacheManager, CacheStats, RankedArchetype, Served};
pub use tier::MemoryTier;

use async_trait::async_trait;
use thiserror::Error;

use crate::calculate::AnalysisError;
use crate::fetch::FetchError;
use crate::models::ArchetypeKey;
use crate::storage::StorageError;

/// Errors surfaced by cache reads and writes.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The source has no decks for this key. Not retryable.
    #[error("insufficient sample for {0}")]
    InsufficientSample(ArchetypeKey),

    /// Repair could not collect the raw sample.
    #[error("could not collect decklists for {key}: {source}")]
    RecoverableFetch {
        key: ArchetypeKey,
        #[source]
        source: FetchError,
    },

    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CacheError {
    /// Whether a later repair may succeed without new source data.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CacheError::RecoverableFetch { .. })
    }
}

/// Persistent cache tier.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Entry for a key, or `None` if nothing is stored.
    async fn read_entry(&self, key: &ArchetypeKey) -> Result<Option<CacheEntry>, StorageError>;

    /// Store an entry, replacing any previous one for its key.
    async fn write_entry(&self, entry: &CacheEntry) -> Result<(), StorageError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove_entry(&self, key: &ArchetypeKey) -> Result<(), StorageError>;

    /// Every stored key.
    async fn list_keys(&self) -> Result<Vec<ArchetypeKey>, StorageError>;
}

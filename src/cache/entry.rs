//! Cache entries and their consistency state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ArchetypeAnalysis, ArchetypeKey, RawSample};

/// Consistency state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// Nothing cached
    Absent,
    /// Raw sample held, not analyzed yet
    RawOnly,
    /// Analysis held without the raw sample behind it
    AnalyzedOnly,
    /// Raw sample and the analysis derived from it
    Consistent,
    /// Invalidated or expired; must be repaired before serving
    Stale,
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CacheState::Absent => "absent",
            CacheState::RawOnly => "raw_only",
            CacheState::AnalyzedOnly => "analyzed_only",
            CacheState::Consistent => "consistent",
            CacheState::Stale => "stale",
        };
        write!(f, "{}", s)
    }
}

/// Raw and derived data cached for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: ArchetypeKey,

    #[serde(default)]
    pub raw: Option<RawSample>,

    #[serde(default)]
    pub analysis: Option<ArchetypeAnalysis>,

    /// Set by invalidation; cleared by a successful repair
    #[serde(default)]
    pub stale: bool,

    /// When the raw sample was last collected
    pub last_updated: DateTime<Utc>,

    /// Stamp of the last memory-tier write; 0 until stored in memory
    #[serde(skip)]
    pub revision: u64,
}

impl CacheEntry {
    pub fn new(key: ArchetypeKey) -> Self {
        Self {
            key,
            raw: None,
            analysis: None,
            stale: false,
            last_updated: Utc::now(),
            revision: 0,
        }
    }

    /// A freshly repaired entry.
    pub fn consistent(key: ArchetypeKey, raw: RawSample, analysis: ArchetypeAnalysis) -> Self {
        Self {
            raw: Some(raw),
            analysis: Some(analysis),
            ..Self::new(key)
        }
    }

    pub fn with_last_updated(mut self, last_updated: DateTime<Utc>) -> Self {
        self.last_updated = last_updated;
        self
    }

    /// State from the held data and the invalidation flag alone.
    pub fn state(&self) -> CacheState {
        match (&self.raw, &self.analysis) {
            (None, None) => CacheState::Absent,
            _ if self.stale => CacheState::Stale,
            (Some(_), None) => CacheState::RawOnly,
            (None, Some(_)) => CacheState::AnalyzedOnly,
            (Some(_), Some(_)) => CacheState::Consistent,
        }
    }

    /// Whether the data is older than `stale_after`.
    pub fn is_expired(&self, stale_after: Duration, now: DateTime<Utc>) -> bool {
        (now - self.last_updated)
            .to_std()
            .map(|age| age > stale_after)
            .unwrap_or(false)
    }

    /// State with expiry applied: expired entries holding data are Stale.
    pub fn effective_state(&self, stale_after: Duration, now: DateTime<Utc>) -> CacheState {
        match self.state() {
            CacheState::Absent => CacheState::Absent,
            _ if self.is_expired(stale_after, now) => CacheState::Stale,
            state => state,
        }
    }

    /// Copy without the raw sample, for stores that keep analysis only.
    pub fn without_raw(&self) -> Self {
        Self {
            raw: None,
            ..self.clone()
        }
    }
}

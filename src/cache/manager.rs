//! Cache consistency manager.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{CacheEntry, CacheError, CacheState, DurableStore, MemoryTier};
use crate::calculate::{rank_by_power_index, AnalysisError, Analyzer};
use crate::config::CacheConfig;
use crate::fetch::DecklistProvider;
use crate::models::{
    format_archetype_name, ArchetypeAnalysis, ArchetypeKey, ArchetypeSnapshot, RawSample,
};
use crate::storage::StorageError;

/// An analysis together with whether it is known to be out of date.
#[derive(Debug, Clone, Serialize)]
pub struct Served {
    #[serde(flatten)]
    pub analysis: ArchetypeAnalysis,
    pub stale: bool,
}

/// Entry counts per tier and per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub session_entries: usize,
    pub process_entries: usize,

    /// `None` when the durable tier could not be listed
    pub durable_entries: Option<usize>,

    pub by_state: BTreeMap<CacheState, usize>,
}

/// One row of the ranked archetype table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedArchetype {
    pub rank: usize,
    #[serde(flatten)]
    pub key: ArchetypeKey,
    /// Display name, e.g. `Charizard Ex (A2a)`
    pub name: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub power_index: f64,
    pub decks: u32,
    /// Distinct events behind the sample; `None` when the raw sample is not held
    pub events: Option<usize>,
    pub stale: bool,
}

/// Owns the cache tiers and repairs entries on access.
///
/// Reads and writes for one key are serialized by a per-key lock, so
/// concurrent `get` calls on a stale key trigger a single repair.
pub struct CacheManager {
    provider: Arc<dyn DecklistProvider>,
    durable: Arc<dyn DurableStore>,
    analyzer: Analyzer,
    session: MemoryTier,
    process: Arc<MemoryTier>,
    locks: DashMap<ArchetypeKey, Arc<Mutex<()>>>,
    stale_after: Duration,
    persist_raw: bool,
}

impl CacheManager {
    pub fn new(
        provider: Arc<dyn DecklistProvider>,
        durable: Arc<dyn DurableStore>,
        analyzer: Analyzer,
    ) -> Self {
        Self::from_config(provider, durable, analyzer, &CacheConfig::default())
    }

    pub fn from_config(
        provider: Arc<dyn DecklistProvider>,
        durable: Arc<dyn DurableStore>,
        analyzer: Analyzer,
        config: &CacheConfig,
    ) -> Self {
        Self {
            provider,
            durable,
            analyzer,
            session: MemoryTier::new(),
            process: Arc::new(MemoryTier::new()),
            locks: DashMap::new(),
            stale_after: config.stale_after(),
            persist_raw: config.persist_raw,
        }
    }

    /// Share a process tier with other managers.
    pub fn with_process_tier(mut self, process: Arc<MemoryTier>) -> Self {
        self.process = process;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_persist_raw(mut self, persist_raw: bool) -> Self {
        self.persist_raw = persist_raw;
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    fn key_lock(&self, key: &ArchetypeKey) -> Arc<Mutex<()>> {
        self.locks.entry(key.clone()).or_default().clone()
    }

    /// Find an entry without promoting it between tiers. Session copies
    /// mirror the process tier, so it is skipped here.
    async fn peek(&self, key: &ArchetypeKey) -> Option<CacheEntry> {
        if let Some(entry) = self.process.get(key) {
            return Some(entry);
        }
        match self.durable.read_entry(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Durable read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Find an entry, copying it into the faster tiers.
    ///
    /// A session copy is served only while the process tier still holds the
    /// same revision; another manager sharing the process tier may have
    /// invalidated, replaced or evicted it since.
    async fn lookup(&self, key: &ArchetypeKey) -> Option<CacheEntry> {
        if let Some(entry) = self.session.get(key) {
            if self.process.revision(key) == Some(entry.revision) {
                return Some(entry);
            }
            debug!("Session copy of {} is out of date", key);
            self.session.remove(key);
        }
        if let Some(entry) = self.process.get(key) {
            self.session.insert(entry.clone());
            return Some(entry);
        }
        match self.durable.read_entry(key).await {
            Ok(Some(entry)) => {
                debug!("Loaded {} from durable tier ({})", key, entry.state());
                self.store_memory(&entry);
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Durable read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn store_memory(&self, entry: &CacheEntry) {
        let stamped = CacheEntry {
            revision: self.process.next_revision(),
            ..entry.clone()
        };
        self.session.insert(stamped.clone());
        self.process.insert(stamped);
    }

    async fn store_durable(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        if self.persist_raw {
            self.durable.write_entry(entry).await
        } else {
            self.durable.write_entry(&entry.without_raw()).await
        }
    }

    /// Current state of a key, with expiry applied.
    pub async fn state(&self, key: &ArchetypeKey) -> CacheState {
        self.peek(key)
            .await
            .map(|entry| entry.effective_state(self.stale_after, Utc::now()))
            .unwrap_or(CacheState::Absent)
    }

    /// Consistent analysis for a key, repairing the entry first if needed.
    ///
    /// Never returns partially repaired data: either the analysis of a
    /// complete raw sample or an error.
    pub async fn get(&self, key: &ArchetypeKey) -> Result<ArchetypeAnalysis, CacheError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let entry = self
            .lookup(key)
            .await
            .unwrap_or_else(|| CacheEntry::new(key.clone()));
        let state = entry.effective_state(self.stale_after, Utc::now());

        if let (CacheState::Consistent, Some(analysis)) = (state, &entry.analysis) {
            return Ok(analysis.clone());
        }
        self.repair(entry, state).await
    }

    /// Bring an entry to Consistent: reuse held raw data when it is
    /// current, otherwise collect it, then analyze and write back.
    async fn repair(
        &self,
        mut entry: CacheEntry,
        state: CacheState,
    ) -> Result<ArchetypeAnalysis, CacheError> {
        debug!("Repairing {} from {}", entry.key, state);

        if entry.is_expired(self.stale_after, Utc::now()) {
            entry.raw = None;
        }

        let raw = match entry.raw.take() {
            Some(raw) => raw,
            None => {
                let raw = self
                    .provider
                    .fetch_decklists(&entry.key)
                    .await
                    .map_err(|source| CacheError::RecoverableFetch {
                        key: entry.key.clone(),
                        source,
                    })?;
                if raw.is_empty() {
                    return Err(CacheError::InsufficientSample(entry.key.clone()));
                }
                entry.last_updated = Utc::now();
                raw
            }
        };

        match self.analyzer.analyze(&entry.key, &raw) {
            Ok(analysis) => {
                let repaired = CacheEntry::consistent(entry.key.clone(), raw, analysis.clone())
                    .with_last_updated(entry.last_updated);
                self.store_memory(&repaired);
                if let Err(e) = self.store_durable(&repaired).await {
                    warn!(
                        "Durable write failed for {}, keeping in memory only: {}",
                        repaired.key, e
                    );
                }
                info!(
                    "Repaired {} ({} decks, power index {:.2})",
                    repaired.key, analysis.snapshot.total_decks, analysis.power_index
                );
                Ok(analysis)
            }
            Err(e) => {
                // Keep the collected sample; a previous analysis stays as stale.
                entry.stale = entry.analysis.is_some();
                entry.raw = Some(raw);
                self.store_memory(&entry);
                Err(match e {
                    AnalysisError::InsufficientSample(key) => CacheError::InsufficientSample(key),
                    other => CacheError::Analysis(other),
                })
            }
        }
    }

    /// Like [`get`](Self::get), but falls back to the last analysis, marked
    /// stale, when repair fails.
    pub async fn get_or_stale(&self, key: &ArchetypeKey) -> Result<Served, CacheError> {
        match self.get(key).await {
            Ok(analysis) => Ok(Served {
                analysis,
                stale: false,
            }),
            Err(e) => match self.peek(key).await.and_then(|entry| entry.analysis) {
                Some(analysis) => {
                    warn!("Serving stale analysis for {}: {}", key, e);
                    Ok(Served {
                        analysis,
                        stale: true,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Aggregate-only read. Served straight from an AnalyzedOnly entry
    /// without collecting the raw sample again.
    pub async fn get_snapshot(&self, key: &ArchetypeKey) -> Result<ArchetypeSnapshot, CacheError> {
        if let Some(entry) = self.lookup(key).await {
            let state = entry.effective_state(self.stale_after, Utc::now());
            if matches!(state, CacheState::Consistent | CacheState::AnalyzedOnly) {
                if let Some(analysis) = entry.analysis {
                    return Ok(analysis.snapshot);
                }
            }
        }
        Ok(self.get(key).await?.snapshot)
    }

    /// Raw sample currently held for a key, if any.
    pub async fn raw_sample(&self, key: &ArchetypeKey) -> Option<RawSample> {
        self.peek(key).await.and_then(|entry| entry.raw)
    }

    /// Mark a key stale. The raw sample is kept, so the next read
    /// recomputes without collecting. Returns false if nothing is cached.
    pub async fn invalidate(&self, key: &ArchetypeKey) -> bool {
        self.mark_stale(key, false).await
    }

    /// Mark a key stale and drop its raw sample, so the next read collects
    /// fresh decklists. Used when new events reference the archetype.
    pub async fn invalidate_and_drop_raw(&self, key: &ArchetypeKey) -> bool {
        self.mark_stale(key, true).await
    }

    async fn mark_stale(&self, key: &ArchetypeKey, drop_raw: bool) -> bool {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let mut entry = match self.lookup(key).await {
            Some(entry) if entry.state() != CacheState::Absent => entry,
            _ => return false,
        };
        entry.stale = true;
        if drop_raw {
            entry.raw = None;
        }

        self.store_memory(&entry);
        if let Err(e) = self.store_durable(&entry).await {
            warn!("Durable write failed while invalidating {}: {}", key, e);
        }
        debug!("Invalidated {} (raw dropped: {})", key, drop_raw);
        true
    }

    /// Write an entry through every tier. Returns once the durable write
    /// has completed.
    pub async fn put(&self, key: &ArchetypeKey, mut entry: CacheEntry) -> Result<(), CacheError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        entry.key = key.clone();
        self.store_memory(&entry);
        self.store_durable(&entry).await?;
        Ok(())
    }

    /// Remove a key from every tier. Returns whether memory held it.
    pub async fn evict(&self, key: &ArchetypeKey) -> Result<bool, CacheError> {
        let lock = self.key_lock(key);
        let held = {
            let _guard = lock.lock().await;
            let in_session = self.session.remove(key).is_some();
            let in_process = self.process.remove(key).is_some();
            self.durable.remove_entry(key).await?;
            in_session || in_process
        };
        drop(lock);

        // Only the map's own handle left: nobody is waiting on this key.
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        info!("Evicted {}", key);
        Ok(held)
    }

    fn memory_keys(&self) -> BTreeSet<ArchetypeKey> {
        self.session
            .keys()
            .into_iter()
            .chain(self.process.keys())
            .collect()
    }

    /// Every key held by any tier, sorted.
    pub async fn tracked_keys(&self) -> Vec<ArchetypeKey> {
        let mut keys = self.memory_keys();
        match self.durable.list_keys().await {
            Ok(stored) => keys.extend(stored),
            Err(e) => warn!("Could not list durable entries: {}", e),
        }
        keys.into_iter().collect()
    }

    /// Cached analyses ordered by power index, strongest first.
    ///
    /// Reads only what is already cached: nothing is collected or repaired,
    /// and keys without an analysis are left out.
    pub async fn ranking(&self) -> Vec<RankedArchetype> {
        let now = Utc::now();
        let mut cached = Vec::new();
        for key in self.tracked_keys().await {
            let Some(entry) = self.peek(&key).await else {
                continue;
            };
            let stale = entry.effective_state(self.stale_after, now) == CacheState::Stale;
            let events = entry.raw.as_ref().map(|raw| raw.event_ids().len());
            if let Some(analysis) = entry.analysis {
                cached.push((key, analysis, events, stale));
            }
        }

        rank_by_power_index(cached, |(_, analysis, _, _)| &analysis.performance)
            .into_iter()
            .enumerate()
            .map(|(i, ((key, analysis, events, stale), power_index))| RankedArchetype {
                rank: i + 1,
                name: format_archetype_name(key.archetype.as_str()),
                wins: analysis.performance.wins,
                losses: analysis.performance.losses,
                ties: analysis.performance.ties,
                power_index,
                decks: analysis.snapshot.total_decks,
                events,
                stale,
                key,
            })
            .collect()
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            session_entries: self.session.len(),
            process_entries: self.process.len(),
            ..CacheStats::default()
        };

        let mut keys = self.memory_keys();
        match self.durable.list_keys().await {
            Ok(stored) => {
                stats.durable_entries = Some(stored.len());
                keys.extend(stored);
            }
            Err(e) => warn!("Could not list durable entries: {}", e),
        }

        for key in keys {
            *stats.by_state.entry(self.state(&key).await).or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::models::{CardIdentity, CardKind, CardObservation, CopyCount, DeckRecord, WinLossRecord};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[derive(Default)]
    struct MockProvider {
        samples: std::sync::Mutex<HashMap<ArchetypeKey, RawSample>>,
        calls: AtomicU32,
        fail: AtomicBool,
        delay: Option<Duration>,
    }

    impl MockProvider {
        fn with_sample(key: &ArchetypeKey, sample: RawSample) -> Self {
            let provider = Self::default();
            provider.samples.lock().unwrap().insert(key.clone(), sample);
            provider
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DecklistProvider for MockProvider {
        async fn fetch_decklists(&self, key: &ArchetypeKey) -> Result<RawSample, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::HttpStatus {
                    status: 503,
                    message: "Service Unavailable".to_string(),
                });
            }
            Ok(self.samples.lock().unwrap().get(key).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct MockStore {
        entries: std::sync::Mutex<HashMap<ArchetypeKey, CacheEntry>>,
        fail: AtomicBool,
    }

    impl MockStore {
        fn check(&self) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )))
            } else {
                Ok(())
            }
        }

        fn stored(&self, key: &ArchetypeKey) -> Option<CacheEntry> {
            self.entries.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl DurableStore for MockStore {
        async fn read_entry(&self, key: &ArchetypeKey) -> Result<Option<CacheEntry>, StorageError> {
            self.check()?;
            Ok(self.stored(key))
        }

        async fn write_entry(&self, entry: &CacheEntry) -> Result<(), StorageError> {
            self.check()?;
            self.entries
                .lock()
                .unwrap()
                .insert(entry.key.clone(), entry.clone());
            Ok(())
        }

        async fn remove_entry(&self, key: &ArchetypeKey) -> Result<(), StorageError> {
            self.check()?;
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> Result<Vec<ArchetypeKey>, StorageError> {
            self.check()?;
            Ok(self.entries.lock().unwrap().keys().cloned().collect())
        }
    }

    fn key() -> ArchetypeKey {
        ArchetypeKey::new("charizard-ex", "A2")
    }

    fn sample() -> RawSample {
        let charizard = CardIdentity::new(CardKind::Pokemon, "Charizard ex", "A1", "36");
        let decks: Vec<DeckRecord> = ["p1", "p2", "p3"]
            .iter()
            .map(|p| DeckRecord::new((*p).into(), "t1".into()).with_record(WinLossRecord::new(3, 2, 0)))
            .collect();
        RawSample {
            observations: decks
                .iter()
                .map(|d| CardObservation::new(d.deck_id.clone(), charizard.clone(), CopyCount::Two))
                .collect(),
            total_decks: 3,
            energy_types: vec!["Fire".to_string()],
            decks,
        }
    }

    fn setup() -> (Arc<MockProvider>, Arc<MockStore>, CacheManager) {
        let provider = Arc::new(MockProvider::with_sample(&key(), sample()));
        let store = Arc::new(MockStore::default());
        let manager = CacheManager::new(provider.clone(), store.clone(), Analyzer::default());
        (provider, store, manager)
    }

    #[tokio::test]
    async fn test_get_collects_once_then_serves_cached() {
        let (provider, store, manager) = setup();
        assert_eq!(manager.state(&key()).await, CacheState::Absent);

        let first = manager.get(&key()).await.unwrap();
        let second = manager.get(&key()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.snapshot.total_decks, 3);
        assert_eq!(provider.calls(), 1);
        assert_eq!(manager.state(&key()).await, CacheState::Consistent);
        assert_eq!(store.stored(&key()).unwrap().state(), CacheState::Consistent);
    }

    #[tokio::test]
    async fn test_invalidate_recomputes_from_held_raw() {
        let (provider, store, manager) = setup();
        manager.get(&key()).await.unwrap();

        assert!(manager.invalidate(&key()).await);
        assert_eq!(manager.state(&key()).await, CacheState::Stale);
        assert!(store.stored(&key()).unwrap().stale);

        manager.get(&key()).await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(manager.state(&key()).await, CacheState::Consistent);
    }

    #[tokio::test]
    async fn test_invalidate_and_drop_raw_recollects() {
        let (provider, _store, manager) = setup();
        manager.get(&key()).await.unwrap();

        assert!(manager.invalidate_and_drop_raw(&key()).await);
        manager.get(&key()).await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_absent_key() {
        let (_provider, _store, manager) = setup();
        assert!(!manager.invalidate(&key()).await);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_recoverable_and_serves_stale() {
        let (provider, _store, manager) = setup();
        let fresh = manager.get(&key()).await.unwrap();

        manager.invalidate_and_drop_raw(&key()).await;
        provider.fail.store(true, Ordering::SeqCst);

        let err = manager.get(&key()).await.unwrap_err();
        assert!(err.is_recoverable());

        let served = manager.get_or_stale(&key()).await.unwrap();
        assert!(served.stale);
        assert_eq!(served.analysis, fresh);

        provider.fail.store(false, Ordering::SeqCst);
        let served = manager.get_or_stale(&key()).await.unwrap();
        assert!(!served.stale);
    }

    #[tokio::test]
    async fn test_get_or_stale_without_history_fails() {
        let (provider, _store, manager) = setup();
        provider.fail.store(true, Ordering::SeqCst);
        assert!(manager.get_or_stale(&key()).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_sample_is_insufficient() {
        let (_provider, _store, manager) = setup();
        let unknown = ArchetypeKey::new("magikarp", "A2");

        let err = manager.get(&unknown).await.unwrap_err();
        assert!(matches!(err, CacheError::InsufficientSample(_)));
        assert_eq!(manager.state(&unknown).await, CacheState::Absent);
    }

    #[tokio::test]
    async fn test_durable_failure_does_not_break_get() {
        let (_provider, store, manager) = setup();
        store.fail.store(true, Ordering::SeqCst);

        let analysis = manager.get(&key()).await.unwrap();
        assert_eq!(analysis.snapshot.total_decks, 3);
        assert!(manager.invalidate(&key()).await);
        assert!(manager.get(&key()).await.is_ok());
    }

    #[tokio::test]
    async fn test_put_writes_through() {
        let (provider, store, manager) = setup();
        let analysis = Analyzer::default().analyze(&key(), &sample()).unwrap();

        manager
            .put(&key(), CacheEntry::consistent(key(), sample(), analysis))
            .await
            .unwrap();

        assert!(store.stored(&key()).is_some());
        manager.get(&key()).await.unwrap();
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_put_surfaces_storage_error() {
        let (_provider, store, manager) = setup();
        store.fail.store(true, Ordering::SeqCst);

        let err = manager.put(&key(), CacheEntry::new(key())).await.unwrap_err();
        assert!(matches!(err, CacheError::Storage(_)));
    }

    #[tokio::test]
    async fn test_analysis_only_persistence_reloads_as_analyzed_only() {
        let (provider, store, manager) = setup();
        let manager = manager.with_persist_raw(false);
        manager.get(&key()).await.unwrap();
        assert!(store.stored(&key()).unwrap().raw.is_none());

        // A fresh manager only sees the durable tier.
        let reloaded = CacheManager::new(provider.clone(), store.clone(), Analyzer::default());
        assert_eq!(reloaded.state(&key()).await, CacheState::AnalyzedOnly);

        let snapshot = reloaded.get_snapshot(&key()).await.unwrap();
        assert_eq!(snapshot.total_decks, 3);
        assert_eq!(provider.calls(), 1);

        reloaded.get(&key()).await.unwrap();
        assert_eq!(provider.calls(), 2);
        assert_eq!(reloaded.state(&key()).await, CacheState::Consistent);
    }

    #[tokio::test]
    async fn test_expired_entry_is_recollected() {
        let (provider, _store, manager) = setup();
        let analysis = Analyzer::default().analyze(&key(), &sample()).unwrap();
        let old = CacheEntry::consistent(key(), sample(), analysis)
            .with_last_updated(Utc::now() - chrono::Duration::days(30));
        manager.put(&key(), old).await.unwrap();

        assert_eq!(manager.state(&key()).await, CacheState::Stale);
        manager.get(&key()).await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(manager.state(&key()).await, CacheState::Consistent);
    }

    #[tokio::test]
    async fn test_concurrent_gets_repair_once() {
        let provider = Arc::new(MockProvider {
            delay: Some(Duration::from_millis(20)),
            ..MockProvider::with_sample(&key(), sample())
        });
        let store = Arc::new(MockStore::default());
        let manager = CacheManager::new(provider.clone(), store, Analyzer::default());

        let k = key();
        let (a, b) = tokio::join!(manager.get(&k), manager.get(&k));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_shared_process_tier() {
        let (provider, store, manager) = setup();
        let process = Arc::new(MemoryTier::new());
        let manager = manager.with_process_tier(process.clone());
        manager.get(&key()).await.unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let other = CacheManager::new(provider.clone(), store.clone(), Analyzer::default())
            .with_process_tier(process);
        other.get(&key()).await.unwrap();
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_shared_process_tier_sees_invalidation() {
        let (provider, store, a) = setup();
        let process = Arc::new(MemoryTier::new());
        let a = a.with_process_tier(process.clone());
        let b = CacheManager::new(provider.clone(), store.clone(), Analyzer::default())
            .with_process_tier(process);

        a.get(&key()).await.unwrap();
        b.get(&key()).await.unwrap();
        assert_eq!(provider.calls(), 1);

        assert!(a.invalidate(&key()).await);
        assert_eq!(a.state(&key()).await, CacheState::Stale);
        assert_eq!(b.state(&key()).await, CacheState::Stale);

        // b repairs instead of serving its own session copy.
        b.get(&key()).await.unwrap();
        assert_eq!(a.state(&key()).await, CacheState::Consistent);
    }

    #[tokio::test]
    async fn test_shared_process_tier_sees_put_and_evict() {
        let (provider, store, a) = setup();
        let process = Arc::new(MemoryTier::new());
        let a = a.with_process_tier(process.clone());
        let b = CacheManager::new(provider.clone(), store.clone(), Analyzer::default())
            .with_process_tier(process);

        a.get(&key()).await.unwrap();
        let before = b.get(&key()).await.unwrap();
        assert_eq!(before.snapshot.total_decks, 3);

        let mut smaller = sample();
        smaller.decks.truncate(2);
        smaller.observations.truncate(2);
        smaller.total_decks = 2;
        let analysis = Analyzer::default().analyze(&key(), &smaller).unwrap();
        a.put(&key(), CacheEntry::consistent(key(), smaller, analysis))
            .await
            .unwrap();
        assert_eq!(b.get(&key()).await.unwrap().snapshot.total_decks, 2);

        assert!(a.evict(&key()).await.unwrap());
        assert_eq!(b.state(&key()).await, CacheState::Absent);
        assert_eq!(b.get(&key()).await.unwrap().snapshot.total_decks, 3);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_evict_releases_key_lock() {
        let (_provider, _store, manager) = setup();
        manager.get(&key()).await.unwrap();
        assert!(manager.locks.contains_key(&key()));

        manager.evict(&key()).await.unwrap();
        assert!(!manager.locks.contains_key(&key()));
    }

    #[tokio::test]
    async fn test_evict_clears_all_tiers() {
        let (provider, store, manager) = setup();
        manager.get(&key()).await.unwrap();

        assert!(manager.evict(&key()).await.unwrap());
        assert!(store.stored(&key()).is_none());
        assert_eq!(manager.state(&key()).await, CacheState::Absent);

        manager.get(&key()).await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_ranking_orders_cached_analyses() {
        let (provider, _store, manager) = setup();
        let weak = ArchetypeKey::new("pikachu-ex-a1", "A2");
        let pikachu = CardIdentity::new(CardKind::Pokemon, "Pikachu ex", "A1", "96");
        let decks = vec![
            DeckRecord::new("p4".into(), "t2".into()).with_record(WinLossRecord::new(0, 5, 0)),
            DeckRecord::new("p5".into(), "t3".into()).with_record(WinLossRecord::new(1, 4, 0)),
        ];
        let weak_sample = RawSample {
            observations: decks
                .iter()
                .map(|d| CardObservation::new(d.deck_id.clone(), pikachu.clone(), CopyCount::Two))
                .collect(),
            total_decks: 2,
            energy_types: vec!["Lightning".to_string()],
            decks,
        };
        provider.samples.lock().unwrap().insert(weak.clone(), weak_sample);
        manager.get(&weak).await.unwrap();
        manager.get(&key()).await.unwrap();
        manager
            .put(&ArchetypeKey::new("arcanine-ex", "A2"), CacheEntry {
                raw: Some(sample()),
                ..CacheEntry::new(ArchetypeKey::new("arcanine-ex", "A2"))
            })
            .await
            .unwrap();
        manager.invalidate(&weak).await;

        let ranking = manager.ranking().await;
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[0].key, key());
        assert_eq!(ranking[0].name, "Charizard Ex");
        assert_eq!((ranking[0].wins, ranking[0].losses, ranking[0].ties), (9, 6, 0));
        assert_eq!(ranking[0].events, Some(1));
        assert!(!ranking[0].stale);

        assert_eq!(ranking[1].rank, 2);
        assert_eq!(ranking[1].name, "Pikachu Ex (A1)");
        assert_eq!(ranking[1].events, Some(2));
        assert!(ranking[1].stale);
        assert!(ranking[0].power_index > ranking[1].power_index);

        // Ranking reads the cache only.
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let (_provider, _store, manager) = setup();
        manager.get(&key()).await.unwrap();
        manager
            .put(&ArchetypeKey::new("arcanine-ex", "A2"), CacheEntry {
                raw: Some(sample()),
                ..CacheEntry::new(ArchetypeKey::new("arcanine-ex", "A2"))
            })
            .await
            .unwrap();

        let stats = manager.stats().await;
        assert_eq!(stats.session_entries, 2);
        assert_eq!(stats.process_entries, 2);
        assert_eq!(stats.durable_entries, Some(2));
        assert_eq!(stats.by_state.get(&CacheState::Consistent), Some(&1));
        assert_eq!(stats.by_state.get(&CacheState::RawOnly), Some(&1));
        assert_eq!(manager.tracked_keys().await.len(), 2);
    }
}

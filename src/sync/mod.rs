//! Incremental updater.
//!
//! Coordinates one update pass:
//! 1. Fetch recent event IDs
//! 2. Diff against known events
//! 3. Resolve the archetypes those events reference
//! 4. Invalidate and repair only the affected cache keys
//! 5. Backfill the player-event mapping and commit the events as known

pub mod tracker;

pub use tracker::{
    detect_new_events, resolve_affected_archetypes, EventTracker, KnownEventSet,
    PlayerEventMapping,
};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::cache::{CacheError, CacheManager};
use crate::fetch::{EventIdProvider, FetchError};
use crate::models::{ArchetypeAnalysis, ArchetypeId, ArchetypeKey, SourceEventId};
use crate::storage::StorageError;

/// Errors that can occur during an update.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Update already in progress")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// State of the updater, for status reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    pub last_update_started: Option<DateTime<Utc>>,
    pub last_update_completed: Option<DateTime<Utc>>,
    pub status: SyncStatus,

    /// New events seen by the last pass
    pub new_events: usize,

    /// Keys refreshed by the last pass
    pub refreshed: usize,

    pub errors: Vec<String>,
}

/// A key whose repair failed during an update.
#[derive(Debug, Clone, Serialize)]
pub struct KeyFailure {
    pub key: ArchetypeKey,
    pub error: String,
}

/// Result of one update pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateResult {
    pub new_events: Vec<SourceEventId>,
    pub affected_archetypes: Vec<ArchetypeId>,

    /// New events no mapping entry references yet
    pub unresolved_events: usize,

    pub refreshed: Vec<ArchetypeKey>,
    pub failed: Vec<KeyFailure>,

    /// State persistence problems; the pass itself still completed
    pub errors: Vec<String>,

    pub duration_ms: u64,
}

/// Runs incremental updates against a cache manager.
pub struct IncrementalUpdater {
    events: Arc<dyn EventIdProvider>,
    cache: Arc<CacheManager>,
    tracker: Mutex<EventTracker>,
    state: Arc<RwLock<SyncState>>,
    cancel_token: AtomicBool,
}

impl IncrementalUpdater {
    pub fn new(
        events: Arc<dyn EventIdProvider>,
        cache: Arc<CacheManager>,
        tracker: EventTracker,
    ) -> Self {
        Self {
            events,
            cache,
            tracker: Mutex::new(tracker),
            state: Arc::new(RwLock::new(SyncState::default())),
            cancel_token: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Get current updater state.
    pub async fn state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// Stop a running [`run_periodic`](Self::run_periodic) loop after the
    /// current pass.
    pub fn cancel(&self) {
        self.cancel_token.store(true, Ordering::SeqCst);
    }

    /// Run one update pass. Passes are serialized.
    pub async fn update_once(&self) -> Result<UpdateResult, SyncError> {
        let mut tracker = self.tracker.lock().await;
        self.run_pass(&mut tracker).await
    }

    /// Run one pass unless another is already in progress.
    pub async fn trigger(&self) -> Result<UpdateResult, SyncError> {
        let mut tracker = self
            .tracker
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;
        self.run_pass(&mut tracker).await
    }

    async fn run_pass(&self, tracker: &mut EventTracker) -> Result<UpdateResult, SyncError> {
        {
            let mut state = self.state.write().await;
            state.last_update_started = Some(Utc::now());
            state.status = SyncStatus::Running;
            state.errors.clear();
        }

        let start = std::time::Instant::now();
        let outcome = self.pass(tracker).await;

        let mut state = self.state.write().await;
        state.last_update_completed = Some(Utc::now());
        match &outcome {
            Ok(result) => {
                state.status = if result.failed.is_empty() && result.errors.is_empty() {
                    SyncStatus::Completed
                } else {
                    SyncStatus::Failed
                };
                state.new_events = result.new_events.len();
                state.refreshed = result.refreshed.len();
                state.errors = result
                    .failed
                    .iter()
                    .map(|f| format!("{}: {}", f.key, f.error))
                    .chain(result.errors.iter().cloned())
                    .collect();
            }
            Err(e) => {
                state.status = SyncStatus::Failed;
                state.errors = vec![e.to_string()];
            }
        }

        outcome.map(|mut result| {
            result.duration_ms = start.elapsed().as_millis() as u64;
            result
        })
    }

    async fn pass(&self, tracker: &mut EventTracker) -> Result<UpdateResult, SyncError> {
        let current = self.events.fetch_recent_event_ids().await?;
        let new_ids = tracker.detect_new_events(&current);

        if new_ids.is_empty() {
            info!("No new events among {} recent", current.len());
            return Ok(UpdateResult::default());
        }

        let affected = tracker.resolve_affected_archetypes(&new_ids);
        let unresolved = tracker.unresolved_events(&new_ids);
        if !unresolved.is_empty() {
            warn!(
                "{} new events have no mapping entries yet and were skipped",
                unresolved.len()
            );
        }

        let keys: Vec<ArchetypeKey> = self
            .cache
            .tracked_keys()
            .await
            .into_iter()
            .filter(|key| affected.contains(&key.archetype))
            .collect();

        info!(
            "{} new events affect {} archetypes ({} cached keys)",
            new_ids.len(),
            affected.len(),
            keys.len()
        );

        let mut result = UpdateResult {
            new_events: new_ids.iter().cloned().collect(),
            affected_archetypes: affected.iter().cloned().collect(),
            unresolved_events: unresolved.len(),
            ..UpdateResult::default()
        };

        for key in keys {
            match self.refresh(tracker, &key).await {
                Ok(_) => result.refreshed.push(key),
                Err(e) => {
                    error!("Failed to refresh {}: {}", key, e);
                    result.failed.push(KeyFailure {
                        key,
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = tracker.save_mapping() {
            error!("Failed to save player-event mapping: {}", e);
            result.errors.push(e.to_string());
        }

        // Failed keys stay stale in the cache, so the events are committed
        // regardless.
        if let Err(e) = tracker.record_known_events(&new_ids) {
            error!("Failed to record known events: {}", e);
            result.errors.push(e.to_string());
        }

        info!(
            "Update complete: {} refreshed, {} failed",
            result.refreshed.len(),
            result.failed.len()
        );
        Ok(result)
    }

    /// Drop the key's raw sample, re-collect and re-analyze it, then index
    /// the new sample.
    async fn refresh(
        &self,
        tracker: &mut EventTracker,
        key: &ArchetypeKey,
    ) -> Result<ArchetypeAnalysis, CacheError> {
        self.cache.invalidate_and_drop_raw(key).await;
        let analysis = self.cache.get(key).await?;
        if let Some(sample) = self.cache.raw_sample(key).await {
            tracker.track_sample(&key.archetype, &sample);
        }
        Ok(analysis)
    }

    /// Analyze a key now and index its sample, so future events that
    /// reference its decks resolve to it.
    pub async fn track_archetype(&self, key: &ArchetypeKey) -> Result<ArchetypeAnalysis, SyncError> {
        let analysis = self.cache.get(key).await?;

        let mut tracker = self.tracker.lock().await;
        if let Some(sample) = self.cache.raw_sample(key).await {
            let added = tracker.track_sample(&key.archetype, &sample);
            info!("Tracking {}: {} new mapping entries", key, added);
        }
        tracker.save_mapping()?;

        Ok(analysis)
    }

    /// Known event IDs, for status output.
    pub async fn known_event_count(&self) -> usize {
        self.tracker.lock().await.known().len()
    }

    /// Archetypes referenced by the given events.
    pub async fn resolve(&self, ids: &BTreeSet<SourceEventId>) -> BTreeSet<ArchetypeId> {
        self.tracker.lock().await.resolve_affected_archetypes(ids)
    }

    /// Run update passes every `every` until cancelled.
    pub async fn run_periodic(self: Arc<Self>, every: Duration) {
        let mut ticker = interval(every);

        info!("Starting periodic updates every {:?}", every);

        loop {
            ticker.tick().await;

            if self.cancel_token.load(Ordering::SeqCst) {
                info!("Periodic updates stopped");
                break;
            }

            match self.update_once().await {
                Ok(result) => {
                    info!(
                        "Periodic update: {} new events, {} keys refreshed",
                        result.new_events.len(),
                        result.refreshed.len()
                    );
                }
                Err(e) => {
                    error!("Periodic update failed: {}", e);
                }
            }
        }
    }
}

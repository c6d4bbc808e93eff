//! Incremental event tracking.
//!
//! Remembers which source events have been processed and which archetype
//! each player brought to each event, so an update only touches the
//! archetypes that new events actually reference.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{ArchetypeId, PlayerId, RawSample, SourceEventId};
use crate::storage::{JsonlReader, JsonlWriter, StateFile, StorageConfig, StorageError};

/// Event IDs that have already been processed. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownEventSet {
    ids: BTreeSet<SourceEventId>,
}

impl KnownEventSet {
    pub fn contains(&self, id: &SourceEventId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Insert IDs, returning the ones that were not already known.
    fn insert_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a SourceEventId>) -> Vec<SourceEventId> {
        ids.into_iter()
            .filter(|id| self.ids.insert((*id).clone()))
            .cloned()
            .collect()
    }
}

/// One line of `known_events.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KnownEventRecord {
    event_id: SourceEventId,
    recorded_at: DateTime<Utc>,
}

/// One line of `player_event_mapping.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub player_id: PlayerId,
    pub event_id: SourceEventId,
    pub archetype: ArchetypeId,
}

/// `(player, event) -> archetype` index built from collected samples.
#[derive(Debug, Clone, Default)]
pub struct PlayerEventMapping {
    entries: HashMap<(PlayerId, SourceEventId), ArchetypeId>,
}

impl PlayerEventMapping {
    /// Add an entry unless the pair is already mapped. Returns whether it
    /// was added.
    pub fn insert(&mut self, player: PlayerId, event: SourceEventId, archetype: ArchetypeId) -> bool {
        match self.entries.entry((player, event)) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(archetype);
                true
            }
        }
    }

    /// Index every deck of a sample under `archetype`. Returns the number
    /// of new entries.
    pub fn track_sample(&mut self, archetype: &ArchetypeId, sample: &RawSample) -> usize {
        sample
            .decks
            .iter()
            .filter(|deck| {
                self.insert(
                    deck.player_id.clone(),
                    deck.event_id.clone(),
                    archetype.clone(),
                )
            })
            .count()
    }

    pub fn get(&self, player: &PlayerId, event: &SourceEventId) -> Option<&ArchetypeId> {
        self.entries.get(&(player.clone(), event.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in a stable order.
    pub fn records(&self) -> Vec<MappingRecord> {
        let mut records: Vec<MappingRecord> = self
            .entries
            .iter()
            .map(|((player_id, event_id), archetype)| MappingRecord {
                player_id: player_id.clone(),
                event_id: event_id.clone(),
                archetype: archetype.clone(),
            })
            .collect();
        records.sort_by(|a, b| {
            (&a.event_id, &a.player_id).cmp(&(&b.event_id, &b.player_id))
        });
        records
    }
}

/// IDs in `current` that are not yet known. Does not change any state.
pub fn detect_new_events(current: &[SourceEventId], known: &KnownEventSet) -> BTreeSet<SourceEventId> {
    current
        .iter()
        .filter(|id| !known.contains(id))
        .cloned()
        .collect()
}

/// Archetypes that some player brought to one of `new_ids`.
///
/// An empty `new_ids` returns immediately without scanning the mapping.
/// Events with no mapping entries resolve to nothing until the mapping is
/// backfilled.
pub fn resolve_affected_archetypes(
    new_ids: &BTreeSet<SourceEventId>,
    mapping: &PlayerEventMapping,
) -> BTreeSet<ArchetypeId> {
    if new_ids.is_empty() {
        return BTreeSet::new();
    }

    mapping
        .entries
        .iter()
        .filter(|((_, event), _)| new_ids.contains(event))
        .map(|(_, archetype)| archetype.clone())
        .collect()
}

/// Events in `new_ids` that no mapping entry references.
pub fn unresolved_events(
    new_ids: &BTreeSet<SourceEventId>,
    mapping: &PlayerEventMapping,
) -> BTreeSet<SourceEventId> {
    if new_ids.is_empty() {
        return BTreeSet::new();
    }

    let mapped: BTreeSet<&SourceEventId> = mapping.entries.keys().map(|(_, event)| event).collect();
    new_ids
        .iter()
        .filter(|id| !mapped.contains(id))
        .cloned()
        .collect()
}

/// Known events plus the player-event mapping, optionally persisted as
/// JSONL under the state directory.
#[derive(Debug, Default)]
pub struct EventTracker {
    storage: Option<StorageConfig>,
    known: KnownEventSet,
    mapping: PlayerEventMapping,
}

impl EventTracker {
    /// A tracker that keeps state in memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load state from the state directory. Missing files start empty.
    pub fn load(storage: StorageConfig) -> Result<Self, StorageError> {
        let known_records: Vec<KnownEventRecord> =
            JsonlReader::for_state(&storage, StateFile::KnownEvents).read_all()?;
        let mapping_records: Vec<MappingRecord> =
            JsonlReader::for_state(&storage, StateFile::PlayerEventMapping).read_all()?;

        let mut tracker = Self {
            storage: Some(storage),
            ..Self::default()
        };
        tracker
            .known
            .insert_all(known_records.iter().map(|r| &r.event_id));
        for record in mapping_records {
            tracker
                .mapping
                .insert(record.player_id, record.event_id, record.archetype);
        }

        info!(
            "Loaded tracker state: {} known events, {} mapping entries",
            tracker.known.len(),
            tracker.mapping.len()
        );
        Ok(tracker)
    }

    pub fn known(&self) -> &KnownEventSet {
        &self.known
    }

    pub fn mapping(&self) -> &PlayerEventMapping {
        &self.mapping
    }

    pub fn detect_new_events(&self, current: &[SourceEventId]) -> BTreeSet<SourceEventId> {
        detect_new_events(current, &self.known)
    }

    pub fn resolve_affected_archetypes(&self, new_ids: &BTreeSet<SourceEventId>) -> BTreeSet<ArchetypeId> {
        resolve_affected_archetypes(new_ids, &self.mapping)
    }

    pub fn unresolved_events(&self, new_ids: &BTreeSet<SourceEventId>) -> BTreeSet<SourceEventId> {
        unresolved_events(new_ids, &self.mapping)
    }

    /// Commit event IDs as processed. Persisted state is written before
    /// memory is updated, so a failed write leaves the events new.
    pub fn record_known_events(&mut self, ids: &BTreeSet<SourceEventId>) -> Result<usize, StorageError> {
        let fresh: Vec<&SourceEventId> = ids.iter().filter(|id| !self.known.contains(id)).collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        if let Some(storage) = &self.storage {
            let now = Utc::now();
            let records: Vec<KnownEventRecord> = fresh
                .iter()
                .map(|id| KnownEventRecord {
                    event_id: (*id).clone(),
                    recorded_at: now,
                })
                .collect();
            JsonlWriter::for_state(storage, StateFile::KnownEvents).append_batch(&records)?;
        }

        let added = self.known.insert_all(fresh).len();
        debug!("Recorded {} known events", added);
        Ok(added)
    }

    /// Index a collected sample. Call [`save_mapping`](Self::save_mapping)
    /// to persist.
    pub fn track_sample(&mut self, archetype: &ArchetypeId, sample: &RawSample) -> usize {
        self.mapping.track_sample(archetype, sample)
    }

    pub fn save_mapping(&self) -> Result<(), StorageError> {
        if let Some(storage) = &self.storage {
            JsonlWriter::for_state(storage, StateFile::PlayerEventMapping)
                .write_all(&self.mapping.records())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeckRecord;
    use tempfile::TempDir;

    fn ids(raw: &[&str]) -> Vec<SourceEventId> {
        raw.iter().map(|s| SourceEventId::from(*s)).collect()
    }

    fn set(raw: &[&str]) -> BTreeSet<SourceEventId> {
        ids(raw).into_iter().collect()
    }

    fn sample(decks: &[(&str, &str)]) -> RawSample {
        RawSample {
            total_decks: decks.len() as u32,
            decks: decks
                .iter()
                .map(|(player, event)| DeckRecord::new((*player).into(), (*event).into()))
                .collect(),
            ..RawSample::default()
        }
    }

    #[test]
    fn test_detect_then_record() {
        let mut tracker = EventTracker::in_memory();
        tracker.record_known_events(&set(&["A", "B"])).unwrap();

        let current = ids(&["A", "B", "C"]);
        let new = tracker.detect_new_events(&current);
        assert_eq!(new, set(&["C"]));

        // Detection alone does not commit.
        assert_eq!(tracker.detect_new_events(&current), set(&["C"]));

        assert_eq!(tracker.record_known_events(&new).unwrap(), 1);
        assert!(tracker.detect_new_events(&current).is_empty());
    }

    #[test]
    fn test_resolve_affected_archetypes() {
        let mut mapping = PlayerEventMapping::default();
        mapping.track_sample(&"pikachu-ex".into(), &sample(&[("p1", "t1"), ("p2", "t2")]));
        mapping.track_sample(&"mewtwo-ex".into(), &sample(&[("p3", "t2")]));
        mapping.track_sample(&"starmie-ex".into(), &sample(&[("p4", "t3")]));

        let affected = resolve_affected_archetypes(&set(&["t2"]), &mapping);
        let names: Vec<&str> = affected.iter().map(|a| a.as_str()).collect();
        assert_eq!(names, vec!["mewtwo-ex", "pikachu-ex"]);
    }

    #[test]
    fn test_resolve_empty_fast_path() {
        let mut mapping = PlayerEventMapping::default();
        mapping.track_sample(&"pikachu-ex".into(), &sample(&[("p1", "t1")]));

        assert!(resolve_affected_archetypes(&BTreeSet::new(), &mapping).is_empty());
        assert!(unresolved_events(&BTreeSet::new(), &mapping).is_empty());
    }

    #[test]
    fn test_unmapped_event_is_unresolved() {
        let mut mapping = PlayerEventMapping::default();
        mapping.track_sample(&"pikachu-ex".into(), &sample(&[("p1", "t1")]));

        let new = set(&["t1", "t9"]);
        assert_eq!(resolve_affected_archetypes(&new, &mapping).len(), 1);
        assert_eq!(unresolved_events(&new, &mapping), set(&["t9"]));
    }

    #[test]
    fn test_mapping_keeps_first_archetype() {
        let mut mapping = PlayerEventMapping::default();
        assert_eq!(mapping.track_sample(&"first".into(), &sample(&[("p1", "t1")])), 1);
        assert_eq!(mapping.track_sample(&"second".into(), &sample(&[("p1", "t1")])), 0);
        assert_eq!(
            mapping.get(&"p1".into(), &"t1".into()).map(|a| a.as_str()),
            Some("first")
        );
    }

    #[test]
    fn test_state_persists_across_loads() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageConfig::new(temp_dir.path().to_path_buf());

        let mut tracker = EventTracker::load(storage.clone()).unwrap();
        tracker.record_known_events(&set(&["t1", "t2"])).unwrap();
        tracker.record_known_events(&set(&["t2", "t3"])).unwrap();
        tracker.track_sample(&"pikachu-ex".into(), &sample(&[("p1", "t3")]));
        tracker.save_mapping().unwrap();

        let reloaded = EventTracker::load(storage).unwrap();
        assert_eq!(reloaded.known().len(), 3);
        assert!(reloaded.detect_new_events(&ids(&["t1", "t3"])).is_empty());
        assert_eq!(
            reloaded.resolve_affected_archetypes(&set(&["t3"])).len(),
            1
        );
    }
}

//! Raw collected samples: the decklists behind one archetype key.

use serde::{Deserialize, Serialize};

use super::{CardObservation, DeckId, PlayerId, SourceEventId};

/// Win/loss/tie record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WinLossRecord {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl WinLossRecord {
    /// Create a new record.
    pub fn new(wins: u32, losses: u32, ties: u32) -> Self {
        Self { wins, losses, ties }
    }

    /// Total games played.
    pub fn total_games(&self) -> u32 {
        self.wins.saturating_add(self.losses).saturating_add(self.ties)
    }
}

/// One collected decklist and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckRecord {
    pub deck_id: DeckId,
    pub player_id: PlayerId,
    pub event_id: SourceEventId,

    /// Energy types this deck registered
    #[serde(default)]
    pub energy_types: Vec<String>,

    /// Match record at the event, if the source reported one
    #[serde(default)]
    pub record: Option<WinLossRecord>,
}

impl DeckRecord {
    /// Create a deck record whose ID is derived from event and player.
    pub fn new(player_id: PlayerId, event_id: SourceEventId) -> Self {
        Self {
            deck_id: super::deck_id_for(&event_id, &player_id),
            player_id,
            event_id,
            energy_types: Vec::new(),
            record: None,
        }
    }

    pub fn with_energy_types(mut self, energy_types: Vec<String>) -> Self {
        self.energy_types = energy_types;
        self
    }

    pub fn with_record(mut self, record: WinLossRecord) -> Self {
        self.record = Some(record);
        self
    }
}

/// Everything the decklist provider returned for one archetype key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSample {
    /// Card lines across all collected decks
    pub observations: Vec<CardObservation>,

    /// Sample size used as the percentage denominator. Can exceed the number
    /// of decks in `decks` when some lists could not be read.
    pub total_decks: u32,

    /// Union of energy types seen across the sample
    #[serde(default)]
    pub energy_types: Vec<String>,

    /// Per-deck metadata
    #[serde(default)]
    pub decks: Vec<DeckRecord>,
}

impl RawSample {
    /// Event IDs referenced by this sample, deduplicated in first-seen order.
    pub fn event_ids(&self) -> Vec<SourceEventId> {
        let mut seen = std::collections::HashSet::new();
        self.decks
            .iter()
            .filter(|d| seen.insert(d.event_id.clone()))
            .map(|d| d.event_id.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.total_decks == 0
    }
}

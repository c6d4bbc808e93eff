//! Archetype performance records.

use serde::{Deserialize, Serialize};

use super::{ArchetypeId, RawSample, WinLossRecord};

/// Accumulated match results for one archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub archetype: ArchetypeId,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl PerformanceRecord {
    pub fn new(archetype: ArchetypeId, wins: u32, losses: u32, ties: u32) -> Self {
        Self {
            archetype,
            wins,
            losses,
            ties,
        }
    }

    /// Sum the per-deck records of a collected sample. Decks without a
    /// reported record contribute nothing.
    pub fn from_sample(archetype: ArchetypeId, sample: &RawSample) -> Self {
        let mut record = Self::new(archetype, 0, 0, 0);
        for deck in &sample.decks {
            if let Some(r) = deck.record {
                record.add(r);
            }
        }
        record
    }

    /// Add one player's event result.
    pub fn add(&mut self, result: WinLossRecord) {
        self.wins = self.wins.saturating_add(result.wins);
        self.losses = self.losses.saturating_add(result.losses);
        self.ties = self.ties.saturating_add(result.ties);
    }

    pub fn total_games(&self) -> u32 {
        self.wins.saturating_add(self.losses).saturating_add(self.ties)
    }

    /// Raw win rate (0.0 to 1.0), ties excluded from the numerator.
    pub fn win_rate(&self) -> f64 {
        let total = self.wins as f64 + self.losses as f64 + self.ties as f64;
        if total == 0.0 {
            0.0
        } else {
            self.wins as f64 / total
        }
    }
}

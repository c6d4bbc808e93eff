//! Per-card usage snapshot for one archetype.

use serde::{Deserialize, Serialize};

use super::{ArchetypeKey, CardIdentity, CardKind};

/// Usage category, assigned from `pct_total` by configured bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Tech,
    Standard,
    Core,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Tech => write!(f, "Tech"),
            Category::Standard => write!(f, "Standard"),
            Category::Core => write!(f, "Core"),
        }
    }
}

/// Usage of one printing across the sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardUsage {
    pub card: CardIdentity,

    /// Decks running exactly one copy
    pub count_1: u32,

    /// Decks running exactly two copies
    pub count_2: u32,

    /// `floor(count_1 / total_decks * 100)`
    pub pct_1: u32,

    /// `floor(count_2 / total_decks * 100)`
    pub pct_2: u32,

    /// Always `pct_1 + pct_2`
    pub pct_total: u32,

    pub category: Category,

    /// Copy count most decks run; 1 on ties
    pub majority: u32,
}

impl CardUsage {
    /// Core card whose minority copy count is still common enough that either
    /// count is a legitimate build.
    pub fn is_flexible_core(&self, threshold: u32) -> bool {
        self.category == Category::Core
            && ((self.majority == 2 && self.pct_1 >= threshold)
                || (self.majority == 1 && self.pct_2 >= threshold))
    }

    /// Usage shown for optional cards: the minority share for Core cards,
    /// otherwise the total share.
    pub fn display_usage(&self) -> u32 {
        if self.category == Category::Core {
            self.pct_1.min(self.pct_2)
        } else {
            self.pct_total
        }
    }
}

/// Aggregated card usage for one `(archetype, format)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchetypeSnapshot {
    pub key: ArchetypeKey,
    pub total_decks: u32,

    /// Rows ordered by kind, then `pct_total` descending
    pub rows: Vec<CardUsage>,
}

impl ArchetypeSnapshot {
    /// Row for an exact printing.
    pub fn get(&self, card: &CardIdentity) -> Option<&CardUsage> {
        self.rows.iter().find(|r| &r.card == card)
    }

    /// Rows of a given category, in snapshot order.
    pub fn in_category(&self, category: Category) -> Vec<&CardUsage> {
        self.rows.iter().filter(|r| r.category == category).collect()
    }

    /// Rows of a given deck section, in snapshot order.
    pub fn of_kind(&self, kind: CardKind) -> Vec<&CardUsage> {
        self.rows.iter().filter(|r| r.card.kind == kind).collect()
    }
}

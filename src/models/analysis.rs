//! Derived analysis bundle served for one archetype key.

use serde::{Deserialize, Serialize};

use super::{ArchetypeSnapshot, CardIdentity, Category, PerformanceRecord, VariantGroup};

/// A card line in the suggested deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCard {
    pub card: CardIdentity,
    pub count: u32,
}

/// A non-core (or flexible core) card offered as an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOption {
    pub card: CardIdentity,
    pub category: Category,
    pub display_usage: u32,
}

/// Suggested list built from core cards plus the optional pool.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeckTemplate {
    pub pokemon: Vec<TemplateCard>,
    pub trainer: Vec<TemplateCard>,
    pub total_cards: u32,

    /// Slots left before the deck is full
    pub remaining_space: u32,

    pub options: Vec<TemplateOption>,
}

/// Everything derived from one raw sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeAnalysis {
    pub snapshot: ArchetypeSnapshot,
    pub variants: Vec<VariantGroup>,
    pub performance: PerformanceRecord,
    pub power_index: f64,
    pub template: DeckTemplate,
    pub most_common_energy: Vec<String>,
}

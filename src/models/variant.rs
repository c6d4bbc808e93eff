//! Variant usage groups: how decks split copies between two printings.

use serde::{Deserialize, Serialize};

use super::CardIdentity;

/// Per-deck copy pattern across two printings of one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantPattern {
    /// Two copies of variant A
    BothA,
    /// Two copies of variant B
    BothB,
    /// One of each
    Mixed,
    /// One copy of variant A only
    SingleA,
    /// One copy of variant B only
    SingleB,
}

impl VariantPattern {
    /// Pattern for a deck's `(variant_a, variant_b)` copy totals.
    /// Any other combination has no bucket.
    pub fn classify(copies_a: u32, copies_b: u32) -> Option<Self> {
        match (copies_a, copies_b) {
            (2, 0) => Some(VariantPattern::BothA),
            (0, 2) => Some(VariantPattern::BothB),
            (1, 1) => Some(VariantPattern::Mixed),
            (1, 0) => Some(VariantPattern::SingleA),
            (0, 1) => Some(VariantPattern::SingleB),
            _ => None,
        }
    }
}

/// Bucket counts per pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatternCounts {
    pub both_a: u32,
    pub both_b: u32,
    pub mixed: u32,
    pub single_a: u32,
    pub single_b: u32,
}

impl PatternCounts {
    pub fn record(&mut self, pattern: VariantPattern) {
        match pattern {
            VariantPattern::BothA => self.both_a += 1,
            VariantPattern::BothB => self.both_b += 1,
            VariantPattern::Mixed => self.mixed += 1,
            VariantPattern::SingleA => self.single_a += 1,
            VariantPattern::SingleB => self.single_b += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.both_a + self.both_b + self.mixed + self.single_a + self.single_b
    }
}

/// Usage split for a card name that appears under two or more printings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantGroup {
    pub card_name: String,
    pub variant_a: CardIdentity,
    pub variant_b: CardIdentity,

    /// Decks containing any printing of this card name
    pub decks_with_card: u32,

    pub patterns: PatternCounts,
}

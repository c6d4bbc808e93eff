//! Analysis engine.
//!
//! Computes everything derived from a raw sample:
//! - Per-card usage and categories
//! - Variant usage splits
//! - Power index
//! - Deck template and energy combination

pub mod aggregate;
pub mod energy;
pub mod power_index;
pub mod template;
pub mod variants;

pub use aggregate::{aggregate, CategoryBins};
pub use energy::most_common_energy;
pub use power_index::{power_index, rank_by_power_index, record_power_index};
pub use template::{build_deck_template, DECK_SIZE};
pub use variants::classify_variants;

use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::models::{
    ArchetypeAnalysis, ArchetypeKey, DeckId, InvalidCopyCount, PerformanceRecord, RawSample,
};

/// Errors produced while analyzing a sample.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("insufficient sample for {0}: no decks collected")]
    InsufficientSample(ArchetypeKey),

    #[error(transparent)]
    InvalidCopyCount(#[from] InvalidCopyCount),

    #[error("deck {deck_id} lists {card} more than once")]
    DuplicateObservation { deck_id: DeckId, card: String },

    #[error("{decks} decks observed but sample size is {total_decks}")]
    SampleOverflow { decks: usize, total_decks: u32 },

    #[error("invalid category bins: {0}")]
    InvalidBins(String),
}

/// Runs the full analysis pipeline with a fixed configuration.
#[derive(Debug, Clone)]
pub struct Analyzer {
    bins: CategoryBins,
    flexible_core_threshold: u32,
}

impl Analyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            bins: CategoryBins::new(&config.category_bins)?,
            flexible_core_threshold: config.flexible_core_threshold,
        })
    }

    pub fn bins(&self) -> &CategoryBins {
        &self.bins
    }

    pub fn flexible_core_threshold(&self) -> u32 {
        self.flexible_core_threshold
    }

    /// Analyze one key's raw sample.
    pub fn analyze(
        &self,
        key: &ArchetypeKey,
        sample: &RawSample,
    ) -> Result<ArchetypeAnalysis, AnalysisError> {
        let snapshot = aggregate(key, &sample.observations, sample.total_decks, &self.bins)?;
        let variants = classify_variants(&snapshot, &sample.observations);
        let performance = PerformanceRecord::from_sample(key.archetype.clone(), sample);
        let power_index = record_power_index(&performance);
        let template = build_deck_template(&snapshot, self.flexible_core_threshold);
        let most_common_energy = most_common_energy(&sample.decks);

        tracing::debug!(
            key = %key,
            rows = snapshot.rows.len(),
            variant_groups = variants.len(),
            power_index,
            "Analyzed sample"
        );

        Ok(ArchetypeAnalysis {
            snapshot,
            variants,
            performance,
            power_index,
            template,
            most_common_energy,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            bins: CategoryBins::default(),
            flexible_core_threshold: 25,
        }
    }
}

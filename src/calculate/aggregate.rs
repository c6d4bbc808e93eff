//! Card usage aggregation.
//!
//! Groups per-deck card observations by printing and derives counts,
//! truncated percentages, a usage category and the majority copy count.

use std::collections::{BTreeMap, HashSet};

use crate::models::{ArchetypeKey, ArchetypeSnapshot, CardIdentity, CardObservation, CardUsage, Category, CopyCount};

use super::AnalysisError;

/// Percentage bins mapping `pct_total` to a category.
///
/// Four edges `[e0, e1, e2, e3]` form right-closed bins
/// `(e0, e1]` Tech, `(e1, e2]` Standard, `(e2, e3]` Core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBins {
    edges: [i32; 4],
}

impl CategoryBins {
    /// Validate bin edges. They must be strictly increasing and cover
    /// every percentage in `[0, 100]`.
    pub fn new(edges: &[i32]) -> Result<Self, AnalysisError> {
        let edges: [i32; 4] = edges.try_into().map_err(|_| {
            AnalysisError::InvalidBins(format!("expected 4 edges, got {}", edges.len()))
        })?;

        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalysisError::InvalidBins(format!(
                "edges must be strictly increasing: {:?}",
                edges
            )));
        }
        if edges[0] >= 0 || edges[3] < 100 {
            return Err(AnalysisError::InvalidBins(format!(
                "edges must span [0, 100]: {:?}",
                edges
            )));
        }

        Ok(Self { edges })
    }

    pub fn edges(&self) -> &[i32; 4] {
        &self.edges
    }

    /// Category for a total usage percentage.
    pub fn categorize(&self, pct_total: u32) -> Category {
        let pct = pct_total as i64;
        if pct <= self.edges[1] as i64 {
            Category::Tech
        } else if pct <= self.edges[2] as i64 {
            Category::Standard
        } else {
            Category::Core
        }
    }
}

impl Default for CategoryBins {
    fn default() -> Self {
        Self {
            edges: [-1, 25, 79, 100],
        }
    }
}

/// Integer-truncated share of the sample.
fn truncated_pct(count: u32, total_decks: u32) -> u32 {
    ((count as u64 * 100) / total_decks as u64) as u32
}

/// Aggregate observations for one key into a usage snapshot.
///
/// `total_decks` is the sample size used as the denominator; it must be
/// non-zero and at least the number of distinct decks observed.
pub fn aggregate(
    key: &ArchetypeKey,
    observations: &[CardObservation],
    total_decks: u32,
    bins: &CategoryBins,
) -> Result<ArchetypeSnapshot, AnalysisError> {
    if total_decks == 0 {
        return Err(AnalysisError::InsufficientSample(key.clone()));
    }

    let mut counts: BTreeMap<&CardIdentity, (u32, u32)> = BTreeMap::new();
    let mut seen = HashSet::new();
    let mut decks = HashSet::new();

    for obs in observations {
        if !seen.insert((&obs.deck_id, &obs.card)) {
            return Err(AnalysisError::DuplicateObservation {
                deck_id: obs.deck_id.clone(),
                card: obs.card.label(),
            });
        }
        decks.insert(&obs.deck_id);

        let entry = counts.entry(&obs.card).or_default();
        match obs.copies {
            CopyCount::One => entry.0 += 1,
            CopyCount::Two => entry.1 += 1,
        }
    }

    if decks.len() as u64 > total_decks as u64 {
        return Err(AnalysisError::SampleOverflow {
            decks: decks.len(),
            total_decks,
        });
    }

    let mut rows: Vec<CardUsage> = counts
        .into_iter()
        .map(|(card, (count_1, count_2))| {
            let pct_1 = truncated_pct(count_1, total_decks);
            let pct_2 = truncated_pct(count_2, total_decks);
            let pct_total = pct_1 + pct_2;
            CardUsage {
                card: card.clone(),
                count_1,
                count_2,
                pct_1,
                pct_2,
                pct_total,
                category: bins.categorize(pct_total),
                majority: if count_2 > count_1 { 2 } else { 1 },
            }
        })
        .collect();

    // Stable: rows with equal (kind, pct_total) keep identity order.
    rows.sort_by(|a, b| {
        a.card
            .kind
            .cmp(&b.card.kind)
            .then(b.pct_total.cmp(&a.pct_total))
    });

    Ok(ArchetypeSnapshot {
        key: key.clone(),
        total_decks,
        rows,
    })
}

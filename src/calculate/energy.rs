//! Energy type combinations.

use std::collections::HashMap;

use crate::models::DeckRecord;

/// The energy combination registered by the most decks.
///
/// Types are lowercased and sorted so `[Water, Lightning]` and
/// `[lightning, water]` are the same combination. On ties the combination
/// seen first wins. Decks without energy types are skipped.
pub fn most_common_energy(decks: &[DeckRecord]) -> Vec<String> {
    let mut order: Vec<Vec<String>> = Vec::new();
    let mut counts: HashMap<Vec<String>, u32> = HashMap::new();

    for deck in decks.iter().filter(|d| !d.energy_types.is_empty()) {
        let mut combo: Vec<String> = deck.energy_types.iter().map(|e| e.to_lowercase()).collect();
        combo.sort();
        combo.dedup();

        let count = counts.entry(combo.clone()).or_insert(0);
        if *count == 0 {
            order.push(combo);
        }
        *count += 1;
    }

    let mut best: Option<(&Vec<String>, u32)> = None;
    for combo in &order {
        let count = counts[combo];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((combo, count));
        }
    }
    best.map(|(combo, _)| combo.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck(player: &str, energy: &[&str]) -> DeckRecord {
        DeckRecord::new(player.into(), "t1".into())
            .with_energy_types(energy.iter().map(|e| e.to_string()).collect())
    }

    #[test]
    fn test_normalizes_and_counts() {
        let decks = vec![
            deck("p1", &["Water"]),
            deck("p2", &["Water", "Lightning"]),
            deck("p3", &["lightning", "water"]),
        ];
        assert_eq!(most_common_energy(&decks), vec!["lightning", "water"]);
    }

    #[test]
    fn test_first_seen_wins_ties() {
        let decks = vec![deck("p1", &["Fire"]), deck("p2", &["Psychic"])];
        assert_eq!(most_common_energy(&decks), vec!["fire"]);
    }

    #[test]
    fn test_no_energy_data() {
        assert!(most_common_energy(&[]).is_empty());
        assert!(most_common_energy(&[deck("p1", &[])]).is_empty());
    }
}

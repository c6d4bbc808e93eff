//! Variant classification.
//!
//! For every card name printed under two or more identities in a snapshot,
//! count how each deck splits its copies between the first two printings.

use std::collections::HashMap;

use crate::models::{
    ArchetypeSnapshot, CardIdentity, CardObservation, DeckId, PatternCounts, VariantGroup,
    VariantPattern,
};

/// Build variant groups from a snapshot and the observations behind it.
///
/// Groups follow the order in which card names first appear in the
/// snapshot. Only the first two printings of a name are compared; decks
/// whose copies of the name fall outside the five patterns are counted in
/// `decks_with_card` but in no bucket.
pub fn classify_variants(
    snapshot: &ArchetypeSnapshot,
    observations: &[CardObservation],
) -> Vec<VariantGroup> {
    let mut names: Vec<(&str, Vec<&CardIdentity>)> = Vec::new();
    for row in &snapshot.rows {
        match names.iter_mut().find(|(name, _)| *name == row.card.name) {
            Some((_, printings)) => printings.push(&row.card),
            None => names.push((row.card.name.as_str(), vec![&row.card])),
        }
    }

    let mut deck_order: Vec<&DeckId> = Vec::new();
    let mut by_deck: HashMap<&DeckId, Vec<&CardObservation>> = HashMap::new();
    for obs in observations {
        by_deck
            .entry(&obs.deck_id)
            .or_insert_with(|| {
                deck_order.push(&obs.deck_id);
                Vec::new()
            })
            .push(obs);
    }

    names
        .into_iter()
        .filter(|(_, printings)| printings.len() >= 2)
        .map(|(name, printings)| {
            let (variant_a, variant_b) = (printings[0], printings[1]);
            let mut decks_with_card = 0;
            let mut patterns = PatternCounts::default();

            for deck in &deck_order {
                let lines: Vec<&&CardObservation> = by_deck[deck]
                    .iter()
                    .filter(|o| o.card.name == name)
                    .collect();
                if lines.is_empty() {
                    continue;
                }
                decks_with_card += 1;

                let copies_of = |variant: &CardIdentity| -> u32 {
                    lines
                        .iter()
                        .filter(|o| &o.card == variant)
                        .map(|o| o.copies.get())
                        .sum()
                };
                if let Some(pattern) =
                    VariantPattern::classify(copies_of(variant_a), copies_of(variant_b))
                {
                    patterns.record(pattern);
                }
            }

            VariantGroup {
                card_name: name.to_string(),
                variant_a: variant_a.clone(),
                variant_b: variant_b.clone(),
                decks_with_card,
                patterns,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::{aggregate, CategoryBins};
    use crate::models::{ArchetypeKey, CardKind, CopyCount};

    fn obs(deck: &str, card: &CardIdentity, copies: CopyCount) -> CardObservation {
        CardObservation::new(DeckId::from(deck), card.clone(), copies)
    }

    fn misty(num: &str) -> CardIdentity {
        CardIdentity::new(CardKind::Trainer, "Misty", "A1", num)
    }

    fn run(observations: &[CardObservation], total: u32) -> Vec<VariantGroup> {
        let key = ArchetypeKey::new("starmie-ex", "A1");
        let snapshot = aggregate(&key, observations, total, &CategoryBins::default()).unwrap();
        classify_variants(&snapshot, observations)
    }

    #[test]
    fn test_patterns_bucketed() {
        let (a, b) = (misty("220"), misty("266"));
        let observations = vec![
            obs("d1", &a, CopyCount::Two),
            obs("d2", &a, CopyCount::Two),
            obs("d3", &b, CopyCount::Two),
            obs("d4", &a, CopyCount::One),
            obs("d4", &b, CopyCount::One),
            obs("d5", &a, CopyCount::One),
        ];
        let groups = run(&observations, 6);

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.card_name, "Misty");
        assert_eq!(group.decks_with_card, 5);
        assert_eq!(group.patterns.both_a, 2);
        assert_eq!(group.patterns.both_b, 1);
        assert_eq!(group.patterns.mixed, 1);
        assert_eq!(group.patterns.single_a, 1);
        assert_eq!(group.patterns.single_b, 0);
    }

    #[test]
    fn test_single_printing_yields_no_group() {
        let a = misty("220");
        let observations = vec![obs("d1", &a, CopyCount::Two)];
        assert!(run(&observations, 1).is_empty());
    }

    #[test]
    fn test_bucket_sum_bounded_by_decks_with_card() {
        let (a, b) = (misty("220"), misty("266"));
        let observations = vec![
            obs("d1", &a, CopyCount::Two),
            obs("d1", &b, CopyCount::One),
            obs("d2", &a, CopyCount::Two),
            obs("d2", &b, CopyCount::Two),
            obs("d3", &b, CopyCount::One),
        ];
        let groups = run(&observations, 3);
        let group = &groups[0];

        // 266 has the higher pct_total, so it leads the snapshot and is variant A
        assert_eq!(group.variant_a, b);
        assert_eq!(group.variant_b, a);
        assert_eq!(group.decks_with_card, 3);
        assert_eq!(group.patterns.single_a, 1);
        assert_eq!(group.patterns.total(), 1);
        assert!(group.patterns.total() <= group.decks_with_card);
    }

    #[test]
    fn test_third_printing_outside_pair_leaves_deck_unbucketed() {
        let (a, b, c) = (misty("220"), misty("266"), misty("300"));
        let observations = vec![
            obs("d1", &a, CopyCount::Two),
            obs("d2", &b, CopyCount::Two),
            obs("d3", &a, CopyCount::Two),
            obs("d3", &b, CopyCount::Two),
            obs("d4", &c, CopyCount::Two),
        ];
        let groups = run(&observations, 4);
        let group = &groups[0];

        assert_eq!(group.variant_a, a);
        assert_eq!(group.variant_b, b);
        // d4 only holds the third printing: (0, 0) has no bucket
        assert_eq!(group.decks_with_card, 4);
        assert_eq!(group.patterns.total(), 2);
    }

    #[test]
    fn test_decks_without_card_ignored() {
        let (a, b) = (misty("220"), misty("266"));
        let other = CardIdentity::new(CardKind::Pokemon, "Staryu", "A1", "53");
        let observations = vec![
            obs("d1", &a, CopyCount::One),
            obs("d2", &b, CopyCount::One),
            obs("d3", &other, CopyCount::Two),
        ];
        let groups = run(&observations, 3);
        assert_eq!(groups[0].decks_with_card, 2);
    }
}

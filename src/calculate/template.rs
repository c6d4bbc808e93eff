//! Suggested deck template built from a usage snapshot.

use crate::models::{ArchetypeSnapshot, CardKind, Category, DeckTemplate, TemplateCard, TemplateOption};

/// Cards in a legal deck.
pub const DECK_SIZE: u32 = 20;

/// Build a template: every Core card at its majority count (one copy for
/// flexible core cards), followed by the pool of optional cards.
///
/// Options are Standard cards, then Tech cards, then flexible core cards,
/// each in snapshot order.
pub fn build_deck_template(snapshot: &ArchetypeSnapshot, flexible_core_threshold: u32) -> DeckTemplate {
    let mut template = DeckTemplate::default();

    for row in snapshot.in_category(Category::Core) {
        let count = if row.is_flexible_core(flexible_core_threshold) {
            1
        } else {
            row.majority
        };
        let line = TemplateCard {
            card: row.card.clone(),
            count,
        };
        match row.card.kind {
            CardKind::Pokemon => template.pokemon.push(line),
            CardKind::Trainer => template.trainer.push(line),
        }
        template.total_cards += count;
    }
    template.remaining_space = DECK_SIZE.saturating_sub(template.total_cards);

    let flexible = snapshot
        .in_category(Category::Core)
        .into_iter()
        .filter(|r| r.is_flexible_core(flexible_core_threshold));
    template.options = snapshot
        .in_category(Category::Standard)
        .into_iter()
        .chain(snapshot.in_category(Category::Tech))
        .chain(flexible)
        .map(|row| TemplateOption {
            card: row.card.clone(),
            category: row.category,
            display_usage: row.display_usage(),
        })
        .collect();

    template
}

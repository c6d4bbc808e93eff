//! JSON shapes served by decklist sources and their conversion to samples.

use serde::{Deserialize, Serialize};

use crate::models::{
    CardIdentity, CardKind, CardObservation, CopyCount, DeckRecord, RawSample, SourceEventId,
    WinLossRecord,
};

use super::FetchError;

/// A card line as published by the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardLine {
    pub kind: CardKind,
    pub name: String,
    #[serde(default)]
    pub set_code: String,
    #[serde(default)]
    pub collector_number: String,
    pub copies: u8,
}

/// A published decklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decklist {
    pub player_id: String,
    pub event_id: String,
    #[serde(default)]
    pub energy_types: Vec<String>,
    #[serde(default)]
    pub record: Option<WinLossRecord>,
    pub cards: Vec<CardLine>,
}

/// Decklists for one archetype key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecklistPage {
    /// Number of decks the source reports for the archetype. Falls back to
    /// the number of lists when absent.
    #[serde(default)]
    pub total_decks: Option<u32>,
    #[serde(default)]
    pub decks: Vec<Decklist>,
}

/// Recently completed events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentEvents {
    pub event_ids: Vec<String>,
}

impl RecentEvents {
    pub fn into_ids(self) -> Vec<SourceEventId> {
        self.event_ids.into_iter().map(SourceEventId::from).collect()
    }
}

impl DecklistPage {
    /// Convert to a raw sample, rejecting copy counts outside `{1, 2}`.
    pub fn into_sample(self) -> Result<RawSample, FetchError> {
        let total_decks = self.total_decks.unwrap_or(self.decks.len() as u32);
        if (self.decks.len() as u64) > total_decks as u64 {
            return Err(FetchError::Parse(format!(
                "{} decklists listed for a sample of {}",
                self.decks.len(),
                total_decks
            )));
        }

        let mut sample = RawSample {
            total_decks,
            ..RawSample::default()
        };

        for list in self.decks {
            let deck = DeckRecord::new(list.player_id.into(), list.event_id.into())
                .with_energy_types(list.energy_types);
            let deck = match list.record {
                Some(record) => deck.with_record(record),
                None => deck,
            };

            for line in list.cards {
                let copies = CopyCount::try_from(line.copies).map_err(|e| {
                    FetchError::Parse(format!("{} in deck {}: {}", line.name, deck.deck_id, e))
                })?;
                let card = CardIdentity::new(line.kind, line.name, line.set_code, line.collector_number);
                sample
                    .observations
                    .push(CardObservation::new(deck.deck_id.clone(), card, copies));
            }

            for energy in &deck.energy_types {
                if !sample.energy_types.contains(energy) {
                    sample.energy_types.push(energy.clone());
                }
            }
            sample.decks.push(deck);
        }

        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "total_decks": 3,
        "decks": [
            {
                "player_id": "ash",
                "event_id": "t-100",
                "energy_types": ["Lightning"],
                "record": {"wins": 4, "losses": 1, "ties": 0},
                "cards": [
                    {"kind": "Pokemon", "name": "Pikachu ex", "set_code": "A1", "collector_number": "96", "copies": 2},
                    {"kind": "Trainer", "name": "Poke Ball", "set_code": "P-A", "collector_number": "5", "copies": 2}
                ]
            },
            {
                "player_id": "misty",
                "event_id": "t-100",
                "energy_types": ["Lightning", "Water"],
                "cards": [
                    {"kind": "Pokemon", "name": "Pikachu ex", "set_code": "A1", "collector_number": "96", "copies": 1}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_page_into_sample() {
        let page: DecklistPage = serde_json::from_str(PAGE).unwrap();
        let sample = page.into_sample().unwrap();

        assert_eq!(sample.total_decks, 3);
        assert_eq!(sample.decks.len(), 2);
        assert_eq!(sample.observations.len(), 3);
        assert_eq!(sample.energy_types, vec!["Lightning", "Water"]);
        assert_eq!(sample.decks[0].record, Some(WinLossRecord::new(4, 1, 0)));
        assert_eq!(sample.observations[2].deck_id, sample.decks[1].deck_id);
    }

    #[test]
    fn test_total_decks_defaults_to_list_count() {
        let page = DecklistPage {
            total_decks: None,
            decks: vec![Decklist {
                player_id: "p".into(),
                event_id: "t".into(),
                energy_types: vec![],
                record: None,
                cards: vec![],
            }],
        };
        assert_eq!(page.into_sample().unwrap().total_decks, 1);
    }

    #[test]
    fn test_bad_copy_count_is_parse_error() {
        let page = DecklistPage {
            total_decks: Some(1),
            decks: vec![Decklist {
                player_id: "p".into(),
                event_id: "t".into(),
                energy_types: vec![],
                record: None,
                cards: vec![CardLine {
                    kind: CardKind::Trainer,
                    name: "Professor's Research".into(),
                    set_code: "P-A".into(),
                    collector_number: "7".into(),
                    copies: 3,
                }],
            }],
        };
        assert!(matches!(page.into_sample(), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_more_lists_than_total_is_parse_error() {
        let mut page: DecklistPage = serde_json::from_str(PAGE).unwrap();
        page.total_decks = Some(1);
        assert!(matches!(page.into_sample(), Err(FetchError::Parse(_))));
    }
}

//! Card printings and per-deck card observations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DeckId;

/// Deck section a card belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CardKind {
    Pokemon,
    Trainer,
}

impl std::fmt::Display for CardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardKind::Pokemon => write!(f, "Pokemon"),
            CardKind::Trainer => write!(f, "Trainer"),
        }
    }
}

/// One printing of a card. Two printings with the same name are variants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardIdentity {
    pub kind: CardKind,
    pub name: String,
    pub set_code: String,
    pub collector_number: String,
}

impl CardIdentity {
    pub fn new(
        kind: CardKind,
        name: impl Into<String>,
        set_code: impl Into<String>,
        collector_number: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            set_code: set_code.into(),
            collector_number: collector_number.into(),
        }
    }

    /// Printing label, e.g. `A1-129`.
    pub fn variant_id(&self) -> String {
        format!("{}-{}", self.set_code, self.collector_number)
    }

    /// Display label, e.g. `Misty (A1-220)`.
    pub fn label(&self) -> String {
        if self.set_code.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.variant_id())
        }
    }
}

/// A copy count of one card in a deck was outside `{1, 2}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("copies played must be 1 or 2, got {0}")]
pub struct InvalidCopyCount(pub u8);

/// Copies of a card in one deck. Decks run one or two of a printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CopyCount {
    One,
    Two,
}

impl CopyCount {
    pub fn get(self) -> u32 {
        match self {
            CopyCount::One => 1,
            CopyCount::Two => 2,
        }
    }
}

impl TryFrom<u8> for CopyCount {
    type Error = InvalidCopyCount;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CopyCount::One),
            2 => Ok(CopyCount::Two),
            other => Err(InvalidCopyCount(other)),
        }
    }
}

impl From<CopyCount> for u8 {
    fn from(value: CopyCount) -> Self {
        value.get() as u8
    }
}

/// A single card line of a single collected decklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardObservation {
    pub deck_id: DeckId,
    pub card: CardIdentity,
    pub copies: CopyCount,
}

impl CardObservation {
    pub fn new(deck_id: DeckId, card: CardIdentity, copies: CopyCount) -> Self {
        Self {
            deck_id,
            card,
            copies,
        }
    }
}

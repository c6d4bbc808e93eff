//! Identifiers and deterministic ID generation using SHA256 hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// An opaque identifier. Source-assigned IDs are wrapped as-is; derived IDs
/// come from a content hash.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new EntityId from a string.
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Generate an EntityId from input fields.
    /// Uses SHA256 and takes the first 16 characters for brevity.
    pub fn generate(fields: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                hasher.update(b"|");
            }
            hasher.update(field.as_bytes());
        }
        let result = hasher.finalize();
        let hash = hex::encode(result);
        Self(hash[..16].to_string())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Archetype (deck strategy) identifier, e.g. `charizard-ex-arcanine-ex`.
pub type ArchetypeId = EntityId;

/// Format / set partition identifier, e.g. `A3`.
pub type FormatId = EntityId;

/// Identifier of one completed source event (tournament).
pub type SourceEventId = EntityId;

/// Player identifier as assigned by the source.
pub type PlayerId = EntityId;

/// Decklist identifier.
pub type DeckId = EntityId;

/// Deck ID for a player's list at an event.
pub fn deck_id_for(event_id: &SourceEventId, player_id: &PlayerId) -> DeckId {
    EntityId::generate(&[event_id.as_str(), player_id.as_str()])
}

/// Cache and analysis key: one archetype under one format.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArchetypeKey {
    pub archetype: ArchetypeId,
    pub format: FormatId,
}

impl ArchetypeKey {
    pub fn new(archetype: impl Into<ArchetypeId>, format: impl Into<FormatId>) -> Self {
        Self {
            archetype: archetype.into(),
            format: format.into(),
        }
    }

    /// Filesystem-safe stem, `{archetype}.{format}`.
    ///
    /// ASCII alphanumerics and `-` are kept; every other byte is written as
    /// `_` plus two hex digits. Neither `.` nor a bare `_` survive escaping,
    /// so distinct keys never share a stem and the key can be read back with
    /// [`from_file_stem`](Self::from_file_stem).
    pub fn file_stem(&self) -> String {
        format!(
            "{}.{}",
            escape_component(self.archetype.as_str()),
            escape_component(self.format.as_str())
        )
    }

    /// Inverse of [`file_stem`](Self::file_stem).
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let (archetype, format) = stem.split_once('.')?;
        Some(Self::new(
            unescape_component(archetype)?,
            unescape_component(format)?,
        ))
    }
}

fn escape_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push('_');
            out.push_str(&hex::encode_upper([byte]));
        }
    }
    out
}

fn unescape_component(s: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(s.len());
    let mut rest = s.as_bytes();
    while let Some((&first, tail)) = rest.split_first() {
        match first {
            b'_' => {
                let digits = tail.get(..2)?;
                bytes.extend(hex::decode(digits).ok()?);
                rest = &tail[2..];
            }
            b if b.is_ascii_alphanumeric() || b == b'-' => {
                bytes.push(b);
                rest = tail;
            }
            _ => return None,
        }
    }
    String::from_utf8(bytes).ok()
}

impl fmt::Display for ArchetypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.archetype, self.format)
    }
}

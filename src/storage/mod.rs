//! Filesystem storage.
//!
//! Handles reading and writing to the local data directory:
//! - Durable cache entries (one JSON file per archetype key)
//! - Tracker state files (JSONL)
//! - Local decklist samples

pub mod entries;
pub mod jsonl;

pub use entries::JsonEntryStore;
pub use jsonl::{JsonlReader, JsonlWriter, StateFile};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Durable cache tier.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Known events and the player-event mapping.
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Decklist samples read by the local provider.
    pub fn samples_dir(&self) -> PathBuf {
        self.data_dir.join("samples")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

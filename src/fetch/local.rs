//! Local file source.
//!
//! Reads decklist pages from `{samples_dir}/{archetype}.{format}.json` (see
//! [`ArchetypeKey::file_stem`]) and recent events from
//! `{samples_dir}/events.json`, in the same JSON shapes the HTTP source
//! serves.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::debug;

use super::wire::{DecklistPage, RecentEvents};
use super::{DecklistProvider, EventIdProvider, FetchError};
use crate::models::{ArchetypeKey, RawSample, SourceEventId};

pub struct LocalProvider {
    dir: PathBuf,
}

impl LocalProvider {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn sample_path(&self, key: &ArchetypeKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    pub fn events_path(&self) -> PathBuf {
        self.dir.join("events.json")
    }

    /// Read a JSON file, treating a missing file as `None`.
    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, FetchError> {
        match fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DecklistProvider for LocalProvider {
    async fn fetch_decklists(&self, key: &ArchetypeKey) -> Result<RawSample, FetchError> {
        let path = self.sample_path(key);
        let page: DecklistPage = Self::read_json(&path).await?.unwrap_or_default();
        debug!("Read {} decklists from {:?}", page.decks.len(), path);
        page.into_sample()
    }
}

#[async_trait]
impl EventIdProvider for LocalProvider {
    async fn fetch_recent_event_ids(&self) -> Result<Vec<SourceEventId>, FetchError> {
        let events: RecentEvents = Self::read_json(&self.events_path()).await?.unwrap_or_default();
        Ok(events.into_ids())
    }
}

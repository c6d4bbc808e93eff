//! Durable cache entries on the local filesystem.
//!
//! One pretty-printed JSON file per archetype key, named after
//! [`ArchetypeKey::file_stem`]. Keys are listed from file names alone.
//! Writes go to a temporary file first and are renamed into place.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::StorageError;
use crate::cache::{CacheEntry, DurableStore};
use crate::models::ArchetypeKey;

pub struct JsonEntryStore {
    dir: PathBuf,
}

impl JsonEntryStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, key: &ArchetypeKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }
}

#[async_trait]
impl DurableStore for JsonEntryStore {
    async fn read_entry(&self, key: &ArchetypeKey) -> Result<Option<CacheEntry>, StorageError> {
        let path = self.entry_path(key);
        let entry: CacheEntry = match fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if entry.key != *key {
            warn!(
                "Ignoring cache entry {:?}: holds {} instead of {}",
                path, entry.key, key
            );
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn write_entry(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.entry_path(&entry.key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entry)?).await?;
        fs::rename(&tmp, &path).await?;

        debug!("Wrote cache entry {:?}", path);
        Ok(())
    }

    async fn remove_entry(&self, key: &ArchetypeKey) -> Result<(), StorageError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<ArchetypeKey>, StorageError> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            match ArchetypeKey::from_file_stem(stem) {
                Some(key) => keys.push(key),
                None => warn!("Skipping unrecognized cache file {:?}", item.path()),
            }
        }

        keys.sort();
        Ok(keys)
    }
}

//! JSONL (JSON Lines) storage for tracker state.
//!
//! Each line is a valid JSON object representing one record.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::{StorageConfig, StorageError};

/// Tracker state files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFile {
    KnownEvents,
    PlayerEventMapping,
}

impl StateFile {
    /// Get the filename for this state file.
    pub fn filename(&self) -> &'static str {
        match self {
            StateFile::KnownEvents => "known_events.jsonl",
            StateFile::PlayerEventMapping => "player_event_mapping.jsonl",
        }
    }

    pub fn path(&self, config: &StorageConfig) -> PathBuf {
        config.state_dir().join(self.filename())
    }
}

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a writer for a tracker state file.
    pub fn for_state(config: &StorageConfig, file: StateFile) -> Self {
        Self::new(file.path(config))
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append records to the file.
    pub fn append_batch(&self, records: &[T]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let count = Self::write_lines(BufWriter::new(file), records)?;
        debug!("Appended {} records to {:?}", count, self.path);

        Ok(count)
    }

    /// Write records, replacing the entire file.
    pub fn write_all(&self, records: &[T]) -> Result<usize, StorageError> {
        self.ensure_dir()?;

        let file = File::create(&self.path)?;
        let count = Self::write_lines(BufWriter::new(file), records)?;
        info!("Wrote {} records to {:?}", count, self.path);

        Ok(count)
    }

    fn write_lines(mut writer: BufWriter<File>, records: &[T]) -> Result<usize, StorageError> {
        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;
        Ok(records.len())
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a reader for a tracker state file.
    pub fn for_state(config: &StorageConfig, file: StateFile) -> Self {
        Self::new(file.path(config))
    }

    /// Check if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all records from the file. Unparseable lines are skipped.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Failed to parse line {} in {:?}: {}", idx + 1, self.path, e);
                }
            }
        }

        debug!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }
}

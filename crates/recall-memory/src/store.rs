//! Persistence Adapter.
//!
//! Full-collection load and save for [`Memory`] records.
//!
//! # Storage layout
//!
//! A single JSON array (pretty-printed, 2-space indent) of objects with
//! exactly these keys:
//!
//! | key                   | description                                 |
//! |-----------------------|---------------------------------------------|
//! | `fact`                | Normalized declarative sentence             |
//! | `created_at`          | ISO-8601 UTC timestamp, fixed width         |
//! | `source_user_message` | Utterance the fact was extracted from       |
//!
//! Every save rewrites the whole file in place. There is no temporary file
//! and no rename, so a crash mid-write can leave a truncated file behind;
//! [`Persistence::load`] reports that as [`Loaded::Corrupt`] and the engine
//! starts from an empty collection.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use recall_types::Memory;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise while reading or writing the memory store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Result of reading the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    /// Nothing has been written yet.
    Missing,
    /// Content exists but is not a list of memories.
    Corrupt(String),
    Parsed(Vec<Memory>),
}

/// Durable storage for the full memory collection.
pub trait Persistence {
    /// Read the backing store. Unparseable content is [`Loaded::Corrupt`],
    /// never an error.
    fn load(&self) -> Result<Loaded, StoreError>;

    /// Overwrite the backing store with `memories`.
    fn save(&mut self, memories: &[Memory]) -> Result<(), StoreError>;
}

fn parse(raw: &str) -> Loaded {
    match serde_json::from_str::<Vec<Memory>>(raw) {
        Ok(memories) => Loaded::Parsed(memories),
        Err(e) => Loaded::Corrupt(e.to_string()),
    }
}

fn render(memories: &[Memory]) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(memories)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// JsonFileStore
// ─────────────────────────────────────────────────────────────────────────────

/// File-backed store (`memories.json` by default).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Persistence for JsonFileStore {
    fn load(&self) -> Result<Loaded, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(parse(&raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Loaded::Missing),
            // Non-UTF-8 bytes are damaged content, not an I/O failure.
            Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(Loaded::Corrupt(e.to_string())),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&mut self, memories: &[Memory]) -> Result<(), StoreError> {
        let raw = render(memories)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        fs::write(&self.path, raw).map_err(|e| self.io_error(e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// InMemoryStore
// ─────────────────────────────────────────────────────────────────────────────

/// Store that keeps the serialized text in memory.
///
/// Behaves exactly like [`JsonFileStore`] (same encoding, same corruption
/// handling) without touching the filesystem. Useful for tests and
/// throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    contents: Option<String>,
    saves: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-existing serialized content (possibly invalid).
    pub fn with_contents(raw: impl Into<String>) -> Self {
        Self {
            contents: Some(raw.into()),
            saves: 0,
        }
    }

    /// The serialized text as last saved.
    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl Persistence for InMemoryStore {
    fn load(&self) -> Result<Loaded, StoreError> {
        Ok(match &self.contents {
            None => Loaded::Missing,
            Some(raw) => parse(raw),
        })
    }

    fn save(&mut self, memories: &[Memory]) -> Result<(), StoreError> {
        self.contents = Some(render(memories)?);
        self.saves += 1;
        Ok(())
    }
}

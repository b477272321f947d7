//! [`MemoryEngine`] – the consolidation and retrieval front door.
//!
//! Owns the in-memory collection and its [`Persistence`] backend. Every
//! mutating call re-serializes the whole collection once; reads never touch
//! the backend.
//!
//! The engine does no locking of its own. Mutation takes `&mut self`, so
//! sharing one engine across tasks requires an external guard held for the
//! whole conversation turn.
//!
//! # Example
//!
//! ```rust
//! use recall_memory::MemoryEngine;
//!
//! let mut engine = MemoryEngine::open_in_memory().unwrap();
//! let added = engine
//!     .add_facts(&["User's name is Alex", "User likes pizz", "User likes pizza"], "hi")
//!     .unwrap();
//! assert_eq!(added, 2);
//!
//! let facts: Vec<_> = engine.list_all().iter().map(|m| m.fact.as_str()).collect();
//! assert_eq!(facts, ["User's name is Alex", "User likes pizza"]);
//!
//! let hits = engine.search("any pizza nearby?", 1, 0.0);
//! assert_eq!(hits[0].fact, "User likes pizza");
//! ```

use std::path::PathBuf;

use recall_types::Memory;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::consolidate::{consolidate, repair};
use crate::ranker::rank;
use crate::store::{InMemoryStore, JsonFileStore, Loaded, Persistence, StoreError};

/// Consolidating memory collection bound to a persistence backend.
#[derive(Debug)]
pub struct MemoryEngine<P = JsonFileStore> {
    memories: Vec<Memory>,
    store: P,
}

impl MemoryEngine<JsonFileStore> {
    /// Open (or start) the JSON store at `path`.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open(JsonFileStore::new(path))
    }
}

impl MemoryEngine<InMemoryStore> {
    /// Open an engine backed by an empty in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(InMemoryStore::new())
    }
}

impl<P: Persistence> MemoryEngine<P> {
    /// Load the collection from `store` and repair it.
    ///
    /// A missing store yields an empty collection. A corrupt store is
    /// discarded with a warning and also yields an empty collection. When the
    /// repair pass changes anything, the repaired form is written back
    /// immediately.
    pub fn open(store: P) -> Result<Self, StoreError> {
        let loaded = match store.load()? {
            Loaded::Missing => {
                debug!("no memory store yet; starting empty");
                Vec::new()
            }
            Loaded::Corrupt(reason) => {
                warn!(%reason, "memory store is unreadable; discarding its contents");
                Vec::new()
            }
            Loaded::Parsed(memories) => memories,
        };

        let outcome = repair(loaded);
        let mut engine = Self {
            memories: outcome.memories,
            store,
        };
        if outcome.changed {
            info!(
                dropped = outcome.dropped,
                superseded = outcome.superseded,
                merged = outcome.merged,
                "repaired memory store on load"
            );
            engine.persist()?;
        }
        info!(count = engine.memories.len(), "memory store loaded");
        Ok(engine)
    }

    /// Classify and consolidate candidate facts.
    ///
    /// Returns the number of newly accepted facts: new preferences, slot
    /// writes and new plain facts. Corrections to an existing preference are
    /// applied but not counted. Rejected candidates are skipped silently.
    /// The collection is saved once at the end if anything changed.
    pub fn add_facts<S: AsRef<str>>(
        &mut self,
        facts: &[S],
        source_message: &str,
    ) -> Result<usize, StoreError> {
        let mut accepted = 0;
        let mut dirty = false;

        for raw in facts {
            let raw = raw.as_ref();
            let fact = match classify(raw) {
                Ok(fact) => fact,
                Err(reason) => {
                    debug!(fact = raw, %reason, "candidate fact dropped");
                    continue;
                }
            };

            let applied = consolidate(
                &mut self.memories,
                &fact,
                Memory::now(raw.trim(), source_message),
            );
            debug!(fact = raw.trim(), ?applied, "candidate fact consolidated");
            if applied.is_accepted() {
                accepted += 1;
            }
            dirty |= applied.is_change();
        }

        if dirty {
            self.persist()?;
        }
        Ok(accepted)
    }

    /// The `top_k` memories most similar to `query` with a score of at least
    /// `min_score`, best first.
    pub fn search(&self, query: &str, top_k: usize, min_score: f64) -> Vec<&Memory> {
        rank(&self.memories, query, top_k, min_score)
            .into_iter()
            .map(|scored| scored.memory)
            .collect()
    }

    /// Every stored memory, in storage order.
    pub fn list_all(&self) -> &[Memory] {
        &self.memories
    }

    /// Delete every memory and persist the empty collection.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let removed = self.memories.len();
        self.memories.clear();
        self.persist()?;
        info!(removed, "memory store cleared");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// The persistence backend.
    pub fn store(&self) -> &P {
        &self.store
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.store.save(&self.memories)?;
        debug!(count = self.memories.len(), "memory store saved");
        Ok(())
    }
}

//! `recall-memory` – The Memory Consolidation & Retrieval Engine.
//!
//! Turns noisy candidate fact strings into a consistent, durable set of
//! memories about the user and retrieves the ones relevant to a new
//! utterance.
//!
//! # Modules
//!
//! - [`classifier`] – [`classify`][classifier::classify]: maps a raw fact to
//!   a slot, preference or plain [`Fact`][recall_types::Fact], rejecting
//!   denylisted names and object-less fragments.
//! - [`matcher`] – [`is_near_match`][matcher::is_near_match]: the cheap
//!   near-duplicate test for preference items (normalization, length gate,
//!   substring rule, one-edit scan).
//! - [`consolidate`] – slot replacement, preference upsert with canonical
//!   labels, plain dedup, and the load-time [`repair`][consolidate::repair]
//!   pass.
//! - [`store`] – [`Persistence`][store::Persistence] with a JSON file backend
//!   and an in-memory backend; corrupt content loads as empty.
//! - [`ranker`] – term-frequency cosine ranking of memories against a query.
//! - [`engine`] – [`MemoryEngine`][engine::MemoryEngine]: `add_facts`,
//!   `search`, `list_all`, `clear`.

pub mod classifier;
pub mod consolidate;
pub mod engine;
pub mod matcher;
pub mod ranker;
pub mod store;

pub use engine::MemoryEngine;
pub use store::{InMemoryStore, JsonFileStore, Loaded, Persistence, StoreError};

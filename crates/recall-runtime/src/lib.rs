//! `recall-runtime` – conversation runtime around the memory engine.
//!
//! # Modules
//!
//! - [`llm_driver`] – [`LlmDriver`]: async OpenAI-compatible
//!   chat-completions client (xAI Grok by default). Disabled without an API
//!   key, in which case every collaborator falls back to heuristics.
//! - [`extractor`] – [`FactExtractor`]: turns a user utterance into
//!   candidate facts, via the LLM or regex heuristics, and canonicalises
//!   their phrasing.
//! - [`responder`] – [`AssistantResponder`]: answers from remembered facts
//!   when a rule applies, otherwise prompts the LLM with the relevant
//!   memories and recent history.
//! - [`session`] – [`ChatSession`]: one conversation turn at a time over a
//!   shared [`MemoryEngine`][recall_memory::MemoryEngine].
//! - [`telemetry`] – [`init_tracing`]: `tracing` subscriber with optional
//!   OTLP export.

pub mod extractor;
pub mod llm_driver;
pub mod responder;
pub mod session;
pub mod telemetry;

pub use extractor::{FactExtractor, FactSource};
pub use llm_driver::{ChatMessage, LlmDriver, LlmError, Role};
pub use responder::{AssistantResponder, Responder};
pub use session::{ChatSession, Command, SessionConfig, TurnOutcome};
pub use telemetry::{TracerProviderGuard, init_tracing};

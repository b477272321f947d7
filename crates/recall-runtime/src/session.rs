//! [`ChatSession`] – one user's conversation over a shared memory engine.
//!
//! Each turn:
//!
//! 1. **Retrieve** – rank stored facts against the message, then append
//!    every remaining fact so the responder sees the whole collection with
//!    the most relevant first.
//! 2. **Reply** – hand the message, context facts and history to the
//!    [`Responder`].
//! 3. **Remember** – extract candidate facts from the message with the
//!    [`FactSource`] and consolidate them into the [`MemoryEngine`].
//!
//! The engine and the history sit behind one [`tokio::sync::Mutex`] held
//! for the whole turn, so concurrent callers are serialized and the
//! search → consolidate → save sequence is never interleaved.

use std::collections::HashSet;
use std::sync::Arc;

use recall_memory::{JsonFileStore, MemoryEngine, Persistence, StoreError};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::extractor::FactSource;
use crate::llm_driver::ChatMessage;
use crate::responder::Responder;

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Session commands recognised in place of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Forget the conversation history; stored memories remain.
    New,
    /// List stored memories.
    Mem,
    /// Delete every stored memory.
    Clear,
    Quit,
}

impl Command {
    /// Parse `/new`, `new`, `/quit`, `exit`, ... (case-insensitive).
    pub fn parse(input: &str) -> Option<Self> {
        let lowered = input.trim().to_lowercase();
        let word = lowered.strip_prefix('/').unwrap_or(&lowered);
        match word {
            "new" => Some(Command::New),
            "mem" => Some(Command::Mem),
            "clear" => Some(Command::Clear),
            "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration & outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Retrieval parameters for building a turn's context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub top_k: usize,
    pub min_score: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.0,
        }
    }
}

/// Result of one [`ChatSession::handle_message`] call.
#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    /// Facts accepted into memory this turn.
    pub saved: usize,
    /// Set when the memory store could not be written. The reply is still
    /// valid and the in-memory collection reflects the turn.
    pub store_error: Option<StoreError>,
    /// The user asked to end the session.
    pub quit: bool,
}

impl TurnOutcome {
    fn reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            saved: 0,
            store_error: None,
            quit: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChatSession
// ─────────────────────────────────────────────────────────────────────────────

struct SessionState<P> {
    engine: MemoryEngine<P>,
    history: Vec<ChatMessage>,
}

/// Conversation front end over a [`MemoryEngine`].
pub struct ChatSession<P = JsonFileStore> {
    state: Mutex<SessionState<P>>,
    facts: Arc<dyn FactSource>,
    responder: Arc<dyn Responder>,
    config: SessionConfig,
}

impl<P: Persistence + Send> ChatSession<P> {
    pub fn new(
        engine: MemoryEngine<P>,
        facts: Arc<dyn FactSource>,
        responder: Arc<dyn Responder>,
        config: SessionConfig,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState {
                engine,
                history: Vec::new(),
            }),
            facts,
            responder,
            config,
        }
    }

    /// Process one line of user input: a command or a chat message.
    #[instrument(skip_all, fields(len = message.len()))]
    pub async fn handle_message(&self, message: &str) -> TurnOutcome {
        let message = message.trim();
        if message.is_empty() {
            return TurnOutcome::reply("Please type a message, or use /quit to exit.");
        }

        if let Some(command) = Command::parse(message) {
            return self.run_command(command).await;
        }

        let mut state = self.state.lock().await;

        let context = context_facts(&state.engine, message, self.config);
        state.history.push(ChatMessage::user(message));
        let reply = self
            .responder
            .generate_reply(message, &context, &state.history)
            .await;
        state.history.push(ChatMessage::assistant(reply.clone()));

        let extracted = self.facts.extract_facts(message).await;
        let mut outcome = TurnOutcome::reply(reply);
        match state.engine.add_facts(&extracted, message) {
            Ok(saved) => {
                if saved > 0 {
                    info!(saved, "new facts remembered");
                }
                outcome.saved = saved;
            }
            Err(e) => {
                warn!(error = %e, "failed to persist memories");
                outcome.store_error = Some(e);
            }
        }
        outcome
    }

    async fn run_command(&self, command: Command) -> TurnOutcome {
        match command {
            Command::New => {
                self.new_session().await;
                TurnOutcome::reply("Started a new session. I still remember past saved facts.")
            }
            Command::Mem => {
                let memories = self.list_memories().await;
                if memories.is_empty() {
                    return TurnOutcome::reply("No memories saved yet.");
                }
                let mut reply = String::from("Stored memories:");
                for (idx, fact) in memories.iter().enumerate() {
                    reply.push_str(&format!("\n  {}. {fact}", idx + 1));
                }
                TurnOutcome::reply(reply)
            }
            Command::Clear => match self.clear_memories().await {
                Ok(()) => TurnOutcome::reply("Cleared all saved memories."),
                Err(e) => {
                    let mut outcome = TurnOutcome::reply("Could not clear saved memories.");
                    outcome.store_error = Some(e);
                    outcome
                }
            },
            Command::Quit => TurnOutcome {
                quit: true,
                ..TurnOutcome::reply("Goodbye.")
            },
        }
    }

    /// Drop the conversation history. Stored memories are untouched.
    pub async fn new_session(&self) {
        self.state.lock().await.history.clear();
    }

    /// Delete every stored memory and the conversation history.
    pub async fn clear_memories(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.history.clear();
        state.engine.clear()
    }

    /// Stored facts in storage order.
    pub async fn list_memories(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .engine
            .list_all()
            .iter()
            .map(|m| m.fact.clone())
            .collect()
    }

    /// Copy of the conversation history.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.state.lock().await.history.clone()
    }
}

/// Ranked matches first, then the rest of the collection, without repeats.
fn context_facts<P: Persistence>(
    engine: &MemoryEngine<P>,
    message: &str,
    config: SessionConfig,
) -> Vec<String> {
    let ranked = engine.search(message, config.top_k, config.min_score);
    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .chain(engine.list_all())
        .filter(|m| seen.insert(m.fact.as_str()))
        .map(|m| m.fact.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recall_memory::InMemoryStore;
    use std::sync::Mutex as StdMutex;

    /// Returns a fixed fact list for every utterance.
    struct ScriptedFacts(Vec<&'static str>);

    #[async_trait]
    impl FactSource for ScriptedFacts {
        async fn extract_facts(&self, _utterance: &str) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
    }

    /// Records what it was given and echoes the message.
    #[derive(Default)]
    struct RecordingResponder {
        calls: StdMutex<Vec<(Vec<String>, usize)>>,
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn generate_reply(
            &self,
            message: &str,
            facts: &[String],
            history: &[ChatMessage],
        ) -> String {
            self.calls
                .lock()
                .unwrap()
                .push((facts.to_vec(), history.len()));
            format!("echo: {message}")
        }
    }

    fn build(
        facts: Vec<&'static str>,
        engine: MemoryEngine<InMemoryStore>,
    ) -> (ChatSession<InMemoryStore>, Arc<RecordingResponder>) {
        let responder = Arc::new(RecordingResponder::default());
        let session = ChatSession::new(
            engine,
            Arc::new(ScriptedFacts(facts)),
            responder.clone(),
            SessionConfig {
                top_k: 1,
                min_score: 0.0,
            },
        );
        (session, responder)
    }

    // ── commands ─────────────────────────────────────────────────────────────

    #[test]
    fn command_aliases() {
        assert_eq!(Command::parse("/new"), Some(Command::New));
        assert_eq!(Command::parse(" MEM "), Some(Command::Mem));
        assert_eq!(Command::parse("clear"), Some(Command::Clear));
        assert_eq!(Command::parse("exit"), Some(Command::Quit));
        assert_eq!(Command::parse("/exit"), Some(Command::Quit));
        assert_eq!(Command::parse("new york"), None);
    }

    #[tokio::test]
    async fn empty_input_prompts_for_a_message() {
        let (session, responder) = build(vec![], MemoryEngine::open_in_memory().unwrap());
        let outcome = session.handle_message("   ").await;
        assert!(outcome.reply.starts_with("Please type a message"));
        assert!(responder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn quit_sets_the_flag() {
        let (session, _) = build(vec![], MemoryEngine::open_in_memory().unwrap());
        let outcome = session.handle_message("quit").await;
        assert!(outcome.quit);
        assert_eq!(outcome.reply, "Goodbye.");
    }

    #[tokio::test]
    async fn mem_lists_numbered_facts() {
        let (session, _) = build(vec![], MemoryEngine::open_in_memory().unwrap());
        assert_eq!(session.handle_message("/mem").await.reply, "No memories saved yet.");

        let mut engine = MemoryEngine::open_in_memory().unwrap();
        engine.add_facts(&["User likes tea", "User is tall"], "x").unwrap();
        let (session, _) = build(vec![], engine);
        assert_eq!(
            session.handle_message("mem").await.reply,
            "Stored memories:\n  1. User likes tea\n  2. User is tall"
        );
    }

    // ── turns ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn turn_replies_then_saves_extracted_facts() {
        let (session, _) =
            build(vec!["User likes pizza", "User is allergic to peanuts"], MemoryEngine::open_in_memory().unwrap());
        let outcome = session.handle_message("I like pizza").await;
        assert_eq!(outcome.reply, "echo: I like pizza");
        assert_eq!(outcome.saved, 2);
        assert!(outcome.store_error.is_none());
        assert_eq!(
            session.list_memories().await,
            vec!["User likes pizza", "User is allergic to peanuts"]
        );

        let again = session.handle_message("I like pizza").await;
        assert_eq!(again.saved, 0);
    }

    #[tokio::test]
    async fn context_puts_ranked_facts_first_without_repeats() {
        let mut engine = MemoryEngine::open_in_memory().unwrap();
        engine
            .add_facts(&["User likes jazz", "User is allergic to peanuts"], "x")
            .unwrap();
        let (session, responder) = build(vec![], engine);

        session.handle_message("any peanuts in this?").await;
        let calls = responder.calls.lock().unwrap();
        assert_eq!(
            calls[0].0,
            vec!["User is allergic to peanuts", "User likes jazz"]
        );
    }

    #[tokio::test]
    async fn history_grows_and_new_session_resets_it() {
        let (session, responder) = build(vec![], MemoryEngine::open_in_memory().unwrap());
        session.handle_message("hello").await;
        session.handle_message("again").await;
        assert_eq!(session.history().await.len(), 4);
        // The responder sees the history ending with the current message.
        assert_eq!(responder.calls.lock().unwrap()[1].1, 3);

        session.handle_message("/new").await;
        assert!(session.history().await.is_empty());
    }

    #[tokio::test]
    async fn clear_deletes_memories_and_history() {
        let (session, _) = build(vec!["User likes tea"], MemoryEngine::open_in_memory().unwrap());
        session.handle_message("I like tea").await;
        let outcome = session.handle_message("/clear").await;
        assert_eq!(outcome.reply, "Cleared all saved memories.");
        assert!(session.list_memories().await.is_empty());
        assert!(session.history().await.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_reported_with_the_reply() {
        struct FailingStore;

        impl Persistence for FailingStore {
            fn load(&self) -> Result<recall_memory::Loaded, StoreError> {
                Ok(recall_memory::Loaded::Missing)
            }

            fn save(&mut self, _memories: &[recall_types::Memory]) -> Result<(), StoreError> {
                Err(StoreError::Io {
                    path: "memories.json".into(),
                    source: std::io::Error::other("disk full"),
                })
            }
        }

        let session = ChatSession::new(
            MemoryEngine::open(FailingStore).unwrap(),
            Arc::new(ScriptedFacts(vec!["User likes tea"])),
            Arc::new(RecordingResponder::default()),
            SessionConfig::default(),
        );
        let outcome = session.handle_message("I like tea").await;
        assert_eq!(outcome.reply, "echo: I like tea");
        assert!(matches!(outcome.store_error, Some(StoreError::Io { .. })));
    }

    #[tokio::test]
    async fn concurrent_turns_are_serialized() {
        let (session, _) = build(vec!["User likes tea"], MemoryEngine::open_in_memory().unwrap());
        let session = Arc::new(session);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.handle_message(&format!("turn {i}")).await })
            })
            .collect();
        let mut saved = 0;
        for handle in handles {
            saved += handle.await.unwrap().saved;
        }
        assert_eq!(saved, 1);
        assert_eq!(session.list_memories().await, vec!["User likes tea"]);
        assert_eq!(session.history().await.len(), 16);
    }
}

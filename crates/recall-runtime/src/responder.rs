//! Reply generation.
//!
//! [`AssistantResponder`] answers memory questions ("what is my name?",
//! "what do I like?") and food requests deterministically from the stored
//! facts, and only asks the LLM when none of those rules fire.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::extractor::fallback_extract;
use crate::llm_driver::{ChatMessage, LlmDriver};

/// System prompt for conversational replies.
pub const SYSTEM_PROMPT: &str = "You are a helpful, concise assistant in a terminal chat app.";

/// Reply used when no rule fires and the LLM is unavailable.
pub const FALLBACK_REPLY: &str =
    "I can help with that. Could you share a bit more detail so I can personalize the suggestion?";

const ACKNOWLEDGEMENT: &str = "Thanks for sharing. I will remember that.";

const FOOD_INTENT_WORDS: &[&str] = &[
    "dinner", "lunch", "breakfast", "eat", "meal", "food", "hungry", "flavorful", "flavourful",
];

const FOOD_KEYWORDS: &[&str] = &[
    "biryani", "pasta", "pizza", "rice", "burger", "curry", "noodle", "salad", "food", "dish",
    "cuisine", "chicken", "paneer", "dessert", "italian", "indian",
];

/// Produces the assistant's reply for one turn.
#[async_trait]
pub trait Responder: Send + Sync {
    /// `facts` are the context facts, most relevant first. `history` already
    /// ends with the current user message.
    async fn generate_reply(&self, message: &str, facts: &[String], history: &[ChatMessage]) -> String;
}

/// Rule-first responder backed by an [`LlmDriver`].
#[derive(Debug, Clone)]
pub struct AssistantResponder {
    driver: Arc<LlmDriver>,
    history_window: usize,
}

impl AssistantResponder {
    /// `history_window` caps how many trailing history messages reach the
    /// prompt.
    pub fn new(driver: Arc<LlmDriver>, history_window: usize) -> Self {
        Self {
            driver,
            history_window,
        }
    }
}

#[async_trait]
impl Responder for AssistantResponder {
    async fn generate_reply(&self, message: &str, facts: &[String], history: &[ChatMessage]) -> String {
        if let Some(reply) = deterministic_reply(message, facts) {
            debug!("answered from remembered facts");
            return reply;
        }

        if self.driver.is_enabled() {
            let prompt = build_prompt(facts, history, self.history_window);
            match self.driver.complete(SYSTEM_PROMPT, &prompt).await {
                Ok(output) if !output.trim().is_empty() => return output.trim().to_string(),
                Ok(_) => warn!("LLM returned an empty reply"),
                Err(e) => warn!(error = %e, "LLM reply failed; using fallback"),
            }
        }

        FALLBACK_REPLY.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompt
// ─────────────────────────────────────────────────────────────────────────────

/// Render the user prompt sent to the model.
pub fn build_prompt(facts: &[String], history: &[ChatMessage], window: usize) -> String {
    let memory_section = if facts.is_empty() {
        "- (no relevant memories)".to_string()
    } else {
        facts
            .iter()
            .map(|fact| format!("- {fact}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let start = history.len().saturating_sub(window);
    let history_lines = history[start..]
        .iter()
        .map(|msg| format!("{}: {}", msg.role.as_str().to_uppercase(), msg.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Relevant memories about the user:\n{memory_section}\n\n\
         Recent conversation:\n{history_lines}\n\n\
         Now answer the latest USER message naturally. \
         Use memories when relevant, but do not force them into unrelated answers. \
         If safety-related memories exist (like allergies), prioritize them in recommendations."
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Remembered facts
// ─────────────────────────────────────────────────────────────────────────────

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex is valid")
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^user's name is\s+(.+)$"));
static ALLERGY_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^user is allergic to\s+(.+)$"));
static PREFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^user (?:likes|loves|enjoys|prefers)\s+(.+)$"));
static BEST_FRIEND_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^user'?s?\s+best\s*friend\s+is\s+(.+)$"));
static DECLARES_BEST_FRIEND_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"\bmy\s+best\s*friend\s+is\b"));

/// What the stored facts say about the user.
#[derive(Debug, Default, PartialEq, Eq)]
struct Remembered {
    name: Option<String>,
    allergies: Vec<String>,
    preferences: Vec<String>,
    best_friend: Option<String>,
}

fn first_capture(pattern: &Regex, facts: &[String]) -> Option<String> {
    facts
        .iter()
        .find_map(|fact| pattern.captures(fact).map(|caps| caps[1].trim().to_string()))
}

fn all_captures(pattern: &Regex, facts: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    facts
        .iter()
        .filter_map(|fact| pattern.captures(fact).map(|caps| caps[1].trim().to_string()))
        .filter(|value| !value.is_empty() && seen.insert(value.to_lowercase()))
        .collect()
}

impl Remembered {
    fn from_facts(facts: &[String]) -> Self {
        Self {
            name: first_capture(&NAME_RE, facts),
            allergies: all_captures(&ALLERGY_RE, facts),
            preferences: all_captures(&PREFERENCE_RE, facts),
            best_friend: first_capture(&BEST_FRIEND_RE, facts),
        }
    }
}

fn is_food(item: &str) -> bool {
    let lower = item.to_lowercase();
    FOOD_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// First food-like preference, else the first preference.
fn pick_preferred_item(preferences: &[String]) -> Option<&str> {
    preferences
        .iter()
        .find(|pref| is_food(pref))
        .or_else(|| preferences.first())
        .map(String::as_str)
}

/// Food-like preferences first, otherwise in remembered order.
fn order_preferences(preferences: &[String]) -> Vec<&str> {
    let mut ordered: Vec<&str> = preferences.iter().map(String::as_str).collect();
    ordered.sort_by_key(|pref| !is_food(pref));
    ordered
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules
// ─────────────────────────────────────────────────────────────────────────────

/// Answer from the stored facts alone, if a rule applies.
pub fn deterministic_reply(message: &str, facts: &[String]) -> Option<String> {
    let lower = message.to_lowercase();
    let remembered = Remembered::from_facts(facts);

    if lower.contains("my name") || lower.contains("who am i") {
        return Some(match remembered.name {
            Some(name) => format!("Your name is {name}."),
            None => "I do not have your name saved yet.".to_string(),
        });
    }

    if lower.contains("allergic") {
        return Some(if remembered.allergies.is_empty() {
            "I do not have any allergy memory saved yet.".to_string()
        } else {
            format!(
                "You told me you are allergic to {}.",
                remembered.allergies.join(", ")
            )
        });
    }

    if DECLARES_BEST_FRIEND_RE.is_match(&lower) {
        return Some(ACKNOWLEDGEMENT.to_string());
    }

    if lower.contains("bestfriend") || lower.contains("best friend") {
        return Some(match remembered.best_friend {
            Some(friend) => format!("Your best friend is {friend}."),
            None => "I do not know your best friend yet. You can tell me by saying: My best friend is <name>."
                .to_string(),
        });
    }

    if lower.contains("what do i love") || lower.contains("what do i like") {
        return Some(if remembered.preferences.is_empty() {
            "I do not have any saved preference yet.".to_string()
        } else {
            format!(
                "You told me you like {}.",
                order_preferences(&remembered.preferences).join(", ")
            )
        });
    }

    if lower.contains("suggest") {
        if let Some(item) = pick_preferred_item(&remembered.preferences) {
            return Some(format!(
                "Since you like {item}, you can try it in two ways tonight: \
                 1) classic style, 2) spicy chef-special version."
            ));
        }
    }

    if FOOD_INTENT_WORDS.iter().any(|word| lower.contains(word)) {
        if let Some(top) = pick_preferred_item(&remembered.preferences) {
            return Some(if remembered.allergies.is_empty() {
                format!(
                    "Since you like {top}, try this: {top} with extra herbs and bold spices. \
                     If you want, I can give 3 specific dish options next."
                )
            } else {
                format!(
                    "Since you like {top}, try a flavorful {top} dish made without {}.",
                    remembered.allergies.join(", ")
                )
            });
        }

        let lower_facts: Vec<String> = facts.iter().map(|f| f.to_lowercase()).collect();
        let likes_italian = lower_facts.iter().any(|f| f.contains("likes italian"));
        let peanut_allergy = lower_facts.iter().any(|f| f.contains("allergic to peanuts"));
        match (likes_italian, peanut_allergy) {
            (true, true) => {
                return Some(
                    "How about a peanut-free pasta primavera? Since you like Italian food, it should fit well."
                        .to_string(),
                );
            }
            (true, false) => {
                return Some(
                    "How about Italian tonight, maybe a pasta primavera or margherita pizza?".to_string(),
                );
            }
            (false, true) => {
                return Some(
                    "A peanut-free rice bowl with roasted vegetables could be a good option tonight."
                        .to_string(),
                );
            }
            (false, false) => {}
        }
    }

    if !fallback_extract(message).is_empty() {
        return Some(ACKNOWLEDGEMENT.to_string());
    }

    facts
        .first()
        .map(|fact| format!("I remember this about you: {fact}."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // ── remembered facts ─────────────────────────────────────────────────────

    #[test]
    fn remembered_facts_are_extracted_and_deduped() {
        let remembered = Remembered::from_facts(&facts(&[
            "User's name is Alex",
            "User is allergic to peanuts",
            "User is allergic to Peanuts",
            "User likes jazz",
            "User dislikes tea",
            "User's best friend is Sam",
        ]));
        assert_eq!(remembered.name.as_deref(), Some("Alex"));
        assert_eq!(remembered.allergies, vec!["peanuts"]);
        assert_eq!(remembered.preferences, vec!["jazz"]);
        assert_eq!(remembered.best_friend.as_deref(), Some("Sam"));
    }

    #[test]
    fn food_preferences_are_ordered_first() {
        let prefs = facts(&["jazz", "biryani", "hiking", "Italian food"]);
        assert_eq!(order_preferences(&prefs), vec!["biryani", "Italian food", "jazz", "hiking"]);
        assert_eq!(pick_preferred_item(&prefs), Some("biryani"));
        assert_eq!(pick_preferred_item(&facts(&["jazz"])), Some("jazz"));
        assert_eq!(pick_preferred_item(&[]), None);
    }

    // ── deterministic_reply ──────────────────────────────────────────────────

    #[test]
    fn name_questions() {
        let known = facts(&["User's name is Alex"]);
        assert_eq!(deterministic_reply("What is my name?", &known).unwrap(), "Your name is Alex.");
        assert_eq!(
            deterministic_reply("who am i", &[]).unwrap(),
            "I do not have your name saved yet."
        );
    }

    #[test]
    fn allergy_questions() {
        let known = facts(&["User is allergic to peanuts", "User is allergic to shellfish"]);
        assert_eq!(
            deterministic_reply("What am I allergic to?", &known).unwrap(),
            "You told me you are allergic to peanuts, shellfish."
        );
    }

    #[test]
    fn best_friend_declaration_and_question() {
        assert_eq!(
            deterministic_reply("My bestfriend is Sam", &[]).unwrap(),
            ACKNOWLEDGEMENT
        );
        assert_eq!(
            deterministic_reply("Who is my best friend?", &facts(&["User's best friend is Sam"]))
                .unwrap(),
            "Your best friend is Sam."
        );
    }

    #[test]
    fn preference_question_lists_food_first() {
        let known = facts(&["User likes jazz", "User likes pizza"]);
        assert_eq!(
            deterministic_reply("what do I like?", &known).unwrap(),
            "You told me you like pizza, jazz."
        );
    }

    #[test]
    fn suggestions_use_the_preferred_item() {
        let known = facts(&["User likes jazz", "User likes biryani"]);
        let reply = deterministic_reply("Suggest something", &known).unwrap();
        assert!(reply.starts_with("Since you like biryani, you can try it in two ways tonight"));
    }

    #[test]
    fn food_intent_respects_allergies() {
        let known = facts(&["User likes pasta", "User is allergic to peanuts"]);
        assert_eq!(
            deterministic_reply("dinner ideas?", &known).unwrap(),
            "Since you like pasta, try a flavorful pasta dish made without peanuts."
        );
    }

    #[test]
    fn food_intent_with_only_a_peanut_allergy() {
        let known = facts(&["User is allergic to peanuts"]);
        assert_eq!(
            deterministic_reply("I'm hungry", &known).unwrap(),
            "A peanut-free rice bowl with roasted vegetables could be a good option tonight."
        );
    }

    #[test]
    fn new_facts_are_acknowledged() {
        assert_eq!(deterministic_reply("I love sushi", &[]).unwrap(), ACKNOWLEDGEMENT);
    }

    #[test]
    fn otherwise_the_first_fact_is_recalled() {
        let known = facts(&["User likes jazz"]);
        assert_eq!(
            deterministic_reply("hello there", &known).unwrap(),
            "I remember this about you: User likes jazz."
        );
        assert_eq!(deterministic_reply("hello there", &[]), None);
    }

    // ── prompt ───────────────────────────────────────────────────────────────

    #[test]
    fn prompt_lists_memories_and_recent_history() {
        let history = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ];
        let prompt = build_prompt(&facts(&["User likes jazz"]), &history, 2);
        assert!(prompt.starts_with("Relevant memories about the user:\n- User likes jazz\n\n"));
        assert!(prompt.contains("Recent conversation:\nASSISTANT: reply\nUSER: second\n\n"));
        assert!(!prompt.contains("first"));
    }

    #[test]
    fn prompt_without_memories() {
        let prompt = build_prompt(&[], &[], 8);
        assert!(prompt.contains("- (no relevant memories)"));
    }

    // ── responder ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn disabled_driver_falls_back_to_generic_reply() {
        let responder =
            AssistantResponder::new(Arc::new(LlmDriver::new("http://127.0.0.1:9", "m", None)), 8);
        let history = [ChatMessage::user("hello there")];
        let reply = responder.generate_reply("hello there", &[], &history).await;
        assert_eq!(reply, FALLBACK_REPLY);
    }
}

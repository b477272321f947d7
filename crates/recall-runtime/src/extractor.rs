//! Fact extraction from user utterances.
//!
//! [`FactExtractor`] asks the LLM for `{"facts": [...]}` when a key is
//! configured and falls back to a small set of regex heuristics otherwise.
//! Either way the candidates are canonicalised with [`normalize_facts`]
//! before they reach the memory engine, which still treats them as
//! untrusted free text.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm_driver::LlmDriver;

/// System prompt for LLM-based extraction.
pub const EXTRACTION_PROMPT: &str = "You extract durable personal facts from a user message. \
Return JSON only with shape: {\"facts\": [\"...\"]}. \
Keep each fact short, objective, and in third person. \
Only include info likely useful later (name, preferences, allergies, routines, goals). \
If nothing useful, return {\"facts\": []}.";

/// Produces candidate fact strings from one user utterance.
#[async_trait]
pub trait FactSource: Send + Sync {
    /// Zero or more candidate facts. Never fails; degrade to fewer facts.
    async fn extract_facts(&self, utterance: &str) -> Vec<String>;
}

/// LLM-first extractor with a heuristic fallback.
#[derive(Debug, Clone)]
pub struct FactExtractor {
    driver: Arc<LlmDriver>,
}

impl FactExtractor {
    pub fn new(driver: Arc<LlmDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl FactSource for FactExtractor {
    async fn extract_facts(&self, utterance: &str) -> Vec<String> {
        if self.driver.is_enabled() {
            match self.driver.complete(EXTRACTION_PROMPT, utterance).await {
                Ok(output) => match parse_fact_list(&output) {
                    Some(facts) => return normalize_facts(&facts),
                    None => debug!("extraction reply was not a fact list; using heuristics"),
                },
                Err(e) => warn!(error = %e, "fact extraction request failed; using heuristics"),
            }
        }
        normalize_facts(&fallback_extract(utterance))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM output parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse `{"facts": [...]}` from a model reply.
///
/// A Markdown code fence around the JSON is tolerated. A missing `facts` key
/// is an empty list; anything that is not a JSON object with a list there
/// returns `None`.
pub fn parse_fact_list(output: &str) -> Option<Vec<String>> {
    let body = strip_code_fence(output.trim());
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;
    let Some(facts) = object.get("facts") else {
        return Some(Vec::new());
    };
    let items = facts.as_array()?;
    Some(
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ─────────────────────────────────────────────────────────────────────────────
// Heuristic fallback
// ─────────────────────────────────────────────────────────────────────────────

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex is valid")
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(?:i am|i'm)\s+([A-Za-z]+)\b"));
static ALLERGY_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\ballergic to\s+([^.!?,;]+)"));
static AND_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\band\b"));
static LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(?:i love|i like|i enjoy|i prefer)\s+([^.!?]+)"));
static BEST_FRIEND_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\bmy\s+best\s*friend\s+is\s+([A-Za-z][A-Za-z\s'-]*)"));
static ITEM_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i),| and also | also | plus | & | and "));
static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^(?:the|a|an)\s+"));

fn strip_space_dot(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '.')
}

/// Regex heuristics used when the LLM is unavailable.
///
/// Questions never yield facts.
pub fn fallback_extract(text: &str) -> Vec<String> {
    if text.trim().ends_with('?') {
        return Vec::new();
    }

    let mut facts = Vec::new();

    if let Some(caps) = NAME_RE.captures(text) {
        facts.push(format!("User's name is {}", &caps[1]));
    }

    if let Some(caps) = ALLERGY_RE.captures(text) {
        let value = AND_RE.split(&caps[1]).next().unwrap_or_default().trim();
        if !value.is_empty() {
            facts.push(format!("User is allergic to {value}"));
        }
    }

    for caps in LIKE_RE.captures_iter(text) {
        for item in split_preference_items(&caps[1]) {
            facts.push(format!("User likes {item}"));
        }
    }

    if let Some(caps) = BEST_FRIEND_RE.captures(text) {
        facts.push(format!("User's best friend is {}", caps[1].trim()));
    }

    facts
}

/// Split `"pizza, the pasta and also sushi"` into individual items.
pub fn split_preference_items(raw: &str) -> Vec<String> {
    let cleaned = strip_space_dot(raw);
    if cleaned.is_empty() {
        return Vec::new();
    }
    ITEM_SPLIT_RE
        .split(cleaned)
        .map(|part| ARTICLE_RE.replace(strip_space_dot(part), "").into_owned())
        .filter(|item| item.chars().count() >= 2)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Canonicalisation
// ─────────────────────────────────────────────────────────────────────────────

static COMBO_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)^user is allergic to\s+(.+?)\s+and\s+i\s+(?:love|like)\s+(.+)$")
});
static PREFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^user (?:likes|loves|enjoys|prefers)\s+(.+)$"));
static NAME_FACT_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^user'?s?\s+name\s+is\s+(.+)$"));
static BEST_FRIEND_FACT_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^user'?s?\s+best\s*friend\s+is\s+(.+)$"));

/// Rewrite candidate facts into the phrasing the memory engine classifies.
///
/// * `User is allergic to X and I love Y` → two facts.
/// * `User loves|enjoys|prefers X` → `User likes X`.
/// * `Users name is X` / `User best friend is X` → canonical slot phrasing.
///
/// Duplicates (case-insensitive) are removed, first occurrence wins.
pub fn normalize_facts<S: AsRef<str>>(facts: &[S]) -> Vec<String> {
    let mut normalized = Vec::new();

    for fact in facts {
        let cleaned = fact.as_ref().trim();
        if cleaned.is_empty() {
            continue;
        }

        if let Some(caps) = COMBO_RE.captures(cleaned) {
            let allergy = strip_space_dot(&caps[1]);
            let preference = strip_space_dot(&caps[2]);
            if !allergy.is_empty() {
                normalized.push(format!("User is allergic to {allergy}"));
            }
            if !preference.is_empty() {
                normalized.push(format!("User likes {preference}"));
            }
            continue;
        }

        if let Some(caps) = PREFERENCE_RE.captures(cleaned) {
            let preference = strip_space_dot(&caps[1]);
            if !preference.is_empty() {
                normalized.push(format!("User likes {preference}"));
            }
            continue;
        }

        if let Some(caps) = NAME_FACT_RE.captures(cleaned) {
            normalized.push(format!("User's name is {}", strip_space_dot(&caps[1])));
            continue;
        }

        if let Some(caps) = BEST_FRIEND_FACT_RE.captures(cleaned) {
            normalized.push(format!("User's best friend is {}", strip_space_dot(&caps[1])));
            continue;
        }

        normalized.push(cleaned.to_string());
    }

    let mut seen = HashSet::new();
    normalized.retain(|fact| seen.insert(fact.to_lowercase()));
    normalized
}

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One durable fact about the user, with provenance.
///
/// This is the only persisted record. The on-disk key for
/// `source_message` is `source_user_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Memory {
    /// Declarative sentence, e.g. `"User's name is Alex"`.
    pub fact: String,
    /// ISO-8601 UTC creation time, fixed width so it sorts lexicographically.
    pub created_at: String,
    /// The raw user utterance that produced the fact.
    #[serde(rename = "source_user_message")]
    pub source_message: String,
}

impl Memory {
    /// Construct a [`Memory`] with an explicit timestamp.
    pub fn new(
        fact: impl Into<String>,
        created_at: impl Into<String>,
        source_message: impl Into<String>,
    ) -> Self {
        Self {
            fact: fact.into(),
            created_at: created_at.into(),
            source_message: source_message.into(),
        }
    }

    /// Construct a [`Memory`] stamped with the current UTC time.
    pub fn now(fact: impl Into<String>, source_message: impl Into<String>) -> Self {
        Self::new(fact, now_timestamp(), source_message)
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
///
/// Microsecond precision and the `Z` suffix keep every stamp the same width,
/// so string order equals chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Single-value attributes. At most one memory may occupy each slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Name,
    Birthday,
    Location,
    Occupation,
    BestFriend,
    DogName,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Name => "name",
            Slot::Birthday => "birthday",
            Slot::Location => "location",
            Slot::Occupation => "occupation",
            Slot::BestFriend => "best_friend",
            Slot::DogName => "dog_name",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a preference statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Likes,
    Dislikes,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Likes => "likes",
            Polarity::Dislikes => "dislikes",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified fact payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    /// A single-value attribute such as the user's name.
    Slot { slot: Slot, value: String },
    /// `User likes <item>` / `User dislikes <item>`.
    Preference { polarity: Polarity, item: String },
    /// Anything else; deduplicated by exact case-insensitive match only.
    Plain { text: String },
}

impl Fact {
    /// The slot this fact occupies, if any.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            Fact::Slot { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

/// Render the stored sentence for a preference.
pub fn preference_sentence(polarity: Polarity, item: &str) -> String {
    format!("User {polarity} {item}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_serializes_with_source_user_message_key() {
        let memory = Memory::new("User likes pizza", "2026-01-01T00:00:00.000000Z", "i like pizza");
        let json = serde_json::to_string(&memory).unwrap();
        assert!(json.contains("\"source_user_message\":\"i like pizza\""));
        assert!(json.contains("\"created_at\""));
        assert!(!json.contains("source_message\":"), "field must use the persisted key");
    }

    #[test]
    fn memory_roundtrip() {
        let memory = Memory::now("User's name is Alex", "I'm Alex");
        let json = serde_json::to_string(&memory).unwrap();
        let back: Memory = serde_json::from_str(&json).unwrap();
        assert_eq!(memory, back);
    }

    #[test]
    fn memory_rejects_unknown_fields() {
        let raw = r#"{"fact":"x","created_at":"t","source_user_message":"s","extra":1}"#;
        assert!(serde_json::from_str::<Memory>(raw).is_err());
    }

    #[test]
    fn memory_rejects_missing_fields() {
        let raw = r#"{"fact":"x","created_at":"t"}"#;
        assert!(serde_json::from_str::<Memory>(raw).is_err());
    }

    #[test]
    fn timestamps_are_fixed_width_utc() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000000Z".len());
    }

    #[test]
    fn preference_sentence_uses_polarity_word() {
        assert_eq!(preference_sentence(Polarity::Dislikes, "tea"), "User dislikes tea");
        assert_eq!(preference_sentence(Polarity::Likes, "hiking"), "User likes hiking");
    }

    #[test]
    fn slot_names_are_snake_case() {
        assert_eq!(Slot::BestFriend.to_string(), "best_friend");
        assert_eq!(serde_json::to_string(&Slot::DogName).unwrap(), "\"dog_name\"");
    }

    #[test]
    fn only_slot_facts_report_a_slot() {
        let name = Fact::Slot {
            slot: Slot::Name,
            value: "Alex".into(),
        };
        let plain = Fact::Plain {
            text: "User drinks coffee".into(),
        };
        assert_eq!(name.slot(), Some(Slot::Name));
        assert_eq!(plain.slot(), None);
    }
}

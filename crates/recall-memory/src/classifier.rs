//! Fact Classifier.
//!
//! Maps a raw candidate fact string onto the tagged [`Fact`] variant used by
//! the rest of the engine, or explains why the candidate must be dropped.
//!
//! | pattern (case-insensitive)                           | result                 |
//! |------------------------------------------------------|------------------------|
//! | `user's name is <v>`                                 | `Slot(Name)`           |
//! | `user's birthday is [on] <v>`                        | `Slot(Birthday)`       |
//! | `user lives in <v>` / `user is from <v>`             | `Slot(Location)`       |
//! | `user works as <v>` / `user studies <v>`             | `Slot(Occupation)`     |
//! | `user's best friend is <v>`                          | `Slot(BestFriend)`     |
//! | `user has a dog named <v>` / `user's dog's name is`  | `Slot(DogName)`        |
//! | `user likes <item>` / `user dislikes <item>`         | `Preference`           |
//! | anything else                                        | `Plain`                |
//!
//! # Example
//!
//! ```rust
//! use recall_memory::classifier::classify;
//! use recall_types::{Fact, Polarity, Slot};
//!
//! assert_eq!(
//!     classify("User's name is Alex").unwrap(),
//!     Fact::Slot { slot: Slot::Name, value: "Alex".into() },
//! );
//! assert_eq!(
//!     classify("user dislikes tea.").unwrap(),
//!     Fact::Preference { polarity: Polarity::Dislikes, item: "tea".into() },
//! );
//! assert!(classify("User's name is Learning").is_err());
//! ```

use std::sync::LazyLock;

use recall_types::{Fact, Polarity, Slot};
use regex::Regex;
use thiserror::Error;

use crate::matcher::normalize_item;

/// Slot prefixes, matched in order. Longer variants of the same slot come
/// first so `birthday is on` wins over `birthday is`.
const SLOT_PREFIXES: &[(&str, Slot)] = &[
    ("user's name is ", Slot::Name),
    ("user's birthday is on ", Slot::Birthday),
    ("user's birthday is ", Slot::Birthday),
    ("user lives in ", Slot::Location),
    ("user is from ", Slot::Location),
    ("user works as ", Slot::Occupation),
    ("user studies ", Slot::Occupation),
    ("user's best friend is ", Slot::BestFriend),
    ("user's bestfriend is ", Slot::BestFriend),
    ("user has a dog named ", Slot::DogName),
    ("user's dog's name is ", Slot::DogName),
];

/// Values that the heuristic extractor tends to capture from phrases such as
/// "I'm learning Rust" or "I'm so tired" and that are never real names.
/// Matched against the whole value only.
const NAME_DENYLIST: &[&str] = &[
    "learning", "training", "working", "studying", "going", "trying", "doing",
    "looking", "feeling", "getting", "planning", "thinking", "reading", "coding",
    "not", "here", "fine", "good", "ok", "okay", "sorry", "back", "just", "also",
    "really", "so", "very", "still", "currently", "a", "an", "the", "allergic",
    "from", "hungry", "tired", "happy", "sad", "busy", "new", "sure", "interested",
];

/// Activity words that disqualify a name when they lead a longer value
/// (`training hard`).
const NAME_LEADING_VERBS: &[&str] = &[
    "learning", "training", "working", "studying", "going", "trying", "doing",
    "looking", "feeling", "getting", "planning", "thinking", "reading", "coding",
];

/// Verbs that leave a preference meaningless without an object
/// (`likes to watch`). Verbs that stand alone as activities (`to cook`,
/// `to read`) are not listed.
const OBJECTLESS_VERBS: &[&str] = &[
    "watch", "see", "buy", "wear", "use", "get", "have", "make", "try", "visit",
];

/// Words that cannot end a preference item.
const DANGLING_TAIL: &[&str] = &["to", "of", "with", "and", "or", "the", "a", "an", "for"];

static PREFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^user\s+(likes|dislikes)\s+(.+)$").expect("static regex is valid")
});

/// Why a candidate fact was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("empty fact")]
    Empty,
    #[error("slot {0} has no value")]
    EmptySlot(Slot),
    #[error("'{0}' is not a name")]
    DeniedName(String),
    #[error("preference fragment without an object: '{0}'")]
    Fragment(String),
}

/// Classify a candidate fact.
///
/// Returns the classified [`Fact`], or the [`Rejection`] explaining why the
/// candidate must never be stored.
pub fn classify(raw: &str) -> Result<Fact, Rejection> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(Rejection::Empty);
    }

    if let Some((slot, value)) = slot_prefix(text) {
        let value = clean_payload(value);
        if value.is_empty() {
            return Err(Rejection::EmptySlot(slot));
        }
        if slot == Slot::Name && is_denied_name(value) {
            return Err(Rejection::DeniedName(value.to_string()));
        }
        return Ok(Fact::Slot {
            slot,
            value: value.to_string(),
        });
    }

    if let Some((polarity, item)) = preference_parts(text) {
        let item = clean_payload(item);
        if is_fragment(item) {
            return Err(Rejection::Fragment(item.to_string()));
        }
        return Ok(Fact::Preference {
            polarity,
            item: item.to_string(),
        });
    }

    Ok(Fact::Plain {
        text: text.to_string(),
    })
}

/// Match `text` against the slot prefixes without validating the value.
///
/// Used to locate the occupant of a slot among stored memories.
pub fn slot_prefix(text: &str) -> Option<(Slot, &str)> {
    let text = text.trim_start();
    SLOT_PREFIXES.iter().find_map(|(prefix, slot)| {
        let head = text.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix)
            .then(|| (*slot, &text[prefix.len()..]))
    })
}

/// Split a `user likes|dislikes <item>` sentence into polarity and raw item.
pub fn preference_parts(text: &str) -> Option<(Polarity, &str)> {
    let caps = PREFERENCE_RE.captures(text.trim())?;
    let polarity = if caps[1].eq_ignore_ascii_case("likes") {
        Polarity::Likes
    } else {
        Polarity::Dislikes
    };
    let item = caps.get(2)?.as_str();
    Some((polarity, item))
}

fn clean_payload(value: &str) -> &str {
    value.trim().trim_matches(|c: char| c == '.' || c.is_whitespace())
}

fn is_denied_name(value: &str) -> bool {
    let lower = value.to_lowercase();
    let first = lower.split_whitespace().next().unwrap_or_default();
    NAME_DENYLIST.contains(&lower.as_str()) || NAME_LEADING_VERBS.contains(&first)
}

fn is_fragment(item: &str) -> bool {
    let normalized = normalize_item(item);
    let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();
    match words.as_slice() {
        [] => true,
        ["to"] => true,
        ["to", verb] => OBJECTLESS_VERBS.contains(verb),
        [.., last] => DANGLING_TAIL.contains(last),
    }
}

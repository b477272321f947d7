//! Consolidation rules.
//!
//! Pure functions over the memory collection that keep it consistent:
//!
//! * **Slots** – at most one memory per [`Slot`]; a new value replaces the
//!   old one.
//! * **Preferences** – no two stored preferences name near-duplicate items.
//!   A new statement about a near-duplicate item rewrites the first match in
//!   place under the longest label and deletes any other matches.
//! * **Plain facts** – exact case-insensitive deduplication.
//!
//! [`repair`] replays a loaded collection through the same rules so that
//! stores written before these invariants existed are brought into shape.

use std::collections::HashMap;

use recall_types::{Fact, Memory, Polarity, Slot, preference_sentence};
use tracing::debug;

use crate::classifier::{classify, preference_parts, slot_prefix};
use crate::matcher::{is_near_match, normalize_item};

/// What happened to one candidate fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Appended as a new memory.
    Inserted,
    /// Appended after retiring the previous occupant of its slot.
    SlotReplaced,
    /// Folded into existing near-duplicate preference memories.
    ///
    /// `collapsed` counts the extra matches that were deleted.
    Merged { collapsed: usize },
    /// Exact duplicate of a stored plain fact; nothing changed.
    Duplicate,
}

impl Applied {
    /// Whether the caller should count this as a newly accepted fact.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Applied::Inserted | Applied::SlotReplaced)
    }

    /// Whether the collection was modified.
    pub fn is_change(&self) -> bool {
        !matches!(self, Applied::Duplicate)
    }
}

/// Apply one classified fact to `memories`.
///
/// `incoming` carries the timestamp and provenance of the statement; its
/// `fact` text is stored verbatim for slot and plain facts and rewritten to
/// the canonical sentence for preferences.
pub fn consolidate(memories: &mut Vec<Memory>, fact: &Fact, incoming: Memory) -> Applied {
    match fact {
        Fact::Slot { slot, .. } => replace_slot(memories, *slot, incoming),
        Fact::Preference { polarity, item } => {
            upsert_preference(memories, *polarity, item, incoming)
        }
        Fact::Plain { text } => insert_plain(memories, text, incoming),
    }
}

fn replace_slot(memories: &mut Vec<Memory>, slot: Slot, incoming: Memory) -> Applied {
    let before = memories.len();
    memories.retain(|m| slot_prefix(&m.fact).map(|(s, _)| s) != Some(slot));
    let retired = before - memories.len();
    memories.push(incoming);
    if retired > 0 {
        debug!(%slot, retired, "slot overwritten");
        Applied::SlotReplaced
    } else {
        Applied::Inserted
    }
}

fn upsert_preference(
    memories: &mut Vec<Memory>,
    polarity: Polarity,
    item: &str,
    mut incoming: Memory,
) -> Applied {
    let wanted = normalize_item(item);

    let matches: Vec<(usize, String)> = memories
        .iter()
        .enumerate()
        .filter_map(|(idx, m)| {
            let (_, existing) = preference_parts(&m.fact)?;
            let existing = existing.trim().trim_matches('.').trim();
            let normalized = normalize_item(existing);
            (!normalized.is_empty() && is_near_match(&normalized, &wanted))
                .then(|| (idx, existing.to_string()))
        })
        .collect();

    let Some((first, _)) = matches.first().cloned() else {
        incoming.fact = preference_sentence(polarity, item);
        memories.push(incoming);
        return Applied::Inserted;
    };

    let label = canonical_label(matches.iter().map(|(_, label)| label.as_str()), item);
    incoming.fact = preference_sentence(polarity, &label);
    debug!(%polarity, %label, matched = matches.len(), "preference merged");
    memories[first] = incoming;

    for (idx, _) in matches.iter().skip(1).rev() {
        memories.remove(*idx);
    }
    Applied::Merged {
        collapsed: matches.len() - 1,
    }
}

/// Longest label wins; `new_item` wins ties.
pub fn canonical_label<'a>(existing: impl IntoIterator<Item = &'a str>, new_item: &str) -> String {
    let mut best: Option<&str> = None;
    for label in existing {
        let longer = best.is_none_or(|b| label.chars().count() > b.chars().count());
        if longer {
            best = Some(label);
        }
    }
    match best {
        Some(b) if b.chars().count() > new_item.chars().count() => b.to_string(),
        _ => new_item.to_string(),
    }
}

fn insert_plain(memories: &mut Vec<Memory>, text: &str, incoming: Memory) -> Applied {
    let key = text.to_lowercase();
    if memories.iter().any(|m| m.fact.trim().to_lowercase() == key) {
        return Applied::Duplicate;
    }
    memories.push(incoming);
    Applied::Inserted
}

// ─────────────────────────────────────────────────────────────────────────────
// Load-time repair
// ─────────────────────────────────────────────────────────────────────────────

/// Result of [`repair`].
#[derive(Debug, Clone, Default)]
pub struct RepairOutcome {
    pub memories: Vec<Memory>,
    /// Records dropped as unclassifiable fragments or denylisted values.
    pub dropped: usize,
    /// Slot records retired in favour of a later one.
    pub superseded: usize,
    /// Preference or plain records folded into an earlier one.
    pub merged: usize,
    pub changed: bool,
}

/// Bring a loaded collection in line with the consolidation invariants.
///
/// "Latest" means last in load order. Slot memories keep only their latest
/// occupant (at its own position); preferences are replayed in order through
/// the upsert rule, so a merged record sits where its earliest member was and
/// carries the latest statement's polarity and provenance. Running this on
/// its own output is a no-op.
///
/// Survivors keep their load order; the result is never re-sorted by
/// `created_at`, so a consistent file round-trips unchanged even when its
/// timestamps are out of order.
pub fn repair(loaded: Vec<Memory>) -> RepairOutcome {
    let original = loaded.clone();
    let classified: Vec<_> = loaded.into_iter().map(|m| (classify(&m.fact), m)).collect();

    let mut latest_slot: HashMap<Slot, usize> = HashMap::new();
    for (idx, (fact, _)) in classified.iter().enumerate() {
        if let Some(slot) = fact.as_ref().ok().and_then(Fact::slot) {
            latest_slot.insert(slot, idx);
        }
    }

    let mut outcome = RepairOutcome::default();
    for (idx, (fact, memory)) in classified.into_iter().enumerate() {
        let fact = match fact {
            Ok(fact) => fact,
            Err(reason) => {
                debug!(fact = %memory.fact, %reason, "dropping stored fragment");
                outcome.dropped += 1;
                continue;
            }
        };

        if let Some(slot) = fact.slot() {
            if latest_slot.get(&slot) == Some(&idx) {
                outcome.memories.push(memory);
            } else {
                outcome.superseded += 1;
            }
            continue;
        }

        match consolidate(&mut outcome.memories, &fact, memory) {
            Applied::Merged { collapsed } => outcome.merged += collapsed + 1,
            Applied::Duplicate => outcome.merged += 1,
            Applied::Inserted | Applied::SlotReplaced => {}
        }
    }

    outcome.changed = outcome.memories != original;
    outcome
}

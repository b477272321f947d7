//! Retrieval Ranker.
//!
//! Scores stored memories against a query with term-frequency vectors and
//! cosine similarity. The index is rebuilt from scratch on every query; the
//! per-user collection is small enough (tens to low hundreds of facts) that
//! no persistent term index is kept.
//!
//! # Example
//!
//! ```rust
//! use recall_memory::ranker::rank;
//! use recall_types::Memory;
//!
//! let memories = vec![
//!     Memory::now("User likes pizza", "I like pizza"),
//!     Memory::now("User likes hiking", "I like hiking"),
//! ];
//! let ranked = rank(&memories, "what pizza toppings", 1, 0.0);
//! assert_eq!(ranked[0].memory.fact, "User likes pizza");
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use recall_types::Memory;
use regex::Regex;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9']+").expect("static regex is valid"));

/// Sparse term-frequency vector.
pub type TermVector = HashMap<String, f64>;

/// A memory together with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredMemory<'a> {
    pub memory: &'a Memory,
    pub score: f64,
}

/// Maximal runs of ASCII alphanumerics and apostrophes, lowercased.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// `count(token) / total_tokens` for every distinct token.
pub fn term_frequency(tokens: &[String]) -> TermVector {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_default() += 1;
    }
    let total = tokens.len().max(1) as f64;
    counts
        .into_iter()
        .map(|(token, count)| (token, count as f64 / total))
        .collect()
}

/// Cosine similarity between two sparse vectors.
///
/// Returns `0.0` if either vector is empty or has zero norm.
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .map(|(token, x)| x * b.get(token).copied().unwrap_or(0.0))
        .sum();
    let norm_a = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.values().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Return at most `top_k` memories scoring at least `min_score`, best first.
///
/// Equal scores are ordered by `created_at`, newest first; full ties keep
/// storage order.
pub fn rank<'a>(
    memories: &'a [Memory],
    query: &str,
    top_k: usize,
    min_score: f64,
) -> Vec<ScoredMemory<'a>> {
    let query_vector = term_frequency(&tokenize(query));

    let mut scored: Vec<ScoredMemory<'a>> = memories
        .iter()
        .map(|memory| ScoredMemory {
            memory,
            score: cosine_similarity(&query_vector, &term_frequency(&tokenize(&memory.fact))),
        })
        .filter(|s| s.score >= min_score)
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
    });
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(fact: &str, at: &str) -> Memory {
        Memory::new(fact, at, "")
    }

    fn facts<'a>(ranked: &[ScoredMemory<'a>]) -> Vec<&'a str> {
        ranked.iter().map(|s| s.memory.fact.as_str()).collect()
    }

    // ── tokenize / term_frequency ────────────────────────────────────────────

    #[test]
    fn tokenize_keeps_apostrophes_and_lowercases() {
        assert_eq!(
            tokenize("User's NAME is Alex, right?"),
            vec!["user's", "name", "is", "alex", "right"]
        );
    }

    #[test]
    fn tokenize_splits_on_non_ascii() {
        assert_eq!(tokenize("café au-lait"), vec!["caf", "au", "lait"]);
    }

    #[test]
    fn term_frequency_normalizes_by_token_count() {
        let tf = term_frequency(&tokenize("tea tea coffee milk"));
        assert!((tf["tea"] - 0.5).abs() < 1e-9);
        assert!((tf["coffee"] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn term_frequency_of_nothing_is_empty() {
        assert!(term_frequency(&[]).is_empty());
    }

    // ── cosine_similarity ────────────────────────────────────────────────────

    #[test]
    fn cosine_identical_text_is_one() {
        let v = term_frequency(&tokenize("user likes pizza"));
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_disjoint_text_is_zero() {
        let a = term_frequency(&tokenize("pizza"));
        let b = term_frequency(&tokenize("hiking"));
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_empty_vector_is_zero() {
        let a = term_frequency(&tokenize("pizza"));
        assert_eq!(cosine_similarity(&a, &TermVector::new()), 0.0);
    }

    // ── rank ─────────────────────────────────────────────────────────────────

    #[test]
    fn most_relevant_memory_ranks_first() {
        let memories = vec![mem("User likes pizza", "1"), mem("User likes hiking", "2")];
        let ranked = rank(&memories, "what pizza toppings", 1, 0.0);
        assert_eq!(facts(&ranked), vec!["User likes pizza"]);
        assert!((ranked[0].score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn min_score_filters_out_weak_matches() {
        let memories = vec![mem("User likes pizza", "1"), mem("User likes hiking", "2")];
        let ranked = rank(&memories, "pizza", 5, 0.08);
        assert_eq!(facts(&ranked), vec!["User likes pizza"]);
    }

    #[test]
    fn zero_min_score_keeps_unrelated_memories() {
        let memories = vec![mem("User likes pizza", "1"), mem("User likes hiking", "2")];
        let ranked = rank(&memories, "pizza", 5, 0.0);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[1].score, 0.0);
    }

    #[test]
    fn score_ties_prefer_newer_memories() {
        let memories = vec![
            mem("User likes tea", "2026-01-01T00:00:00.000000Z"),
            mem("User likes jam", "2026-03-01T00:00:00.000000Z"),
            mem("User likes oat", "2026-02-01T00:00:00.000000Z"),
        ];
        let ranked = rank(&memories, "what does the user like", 3, 0.0);
        assert_eq!(facts(&ranked), vec!["User likes jam", "User likes oat", "User likes tea"]);
    }

    #[test]
    fn top_k_caps_results() {
        let memories: Vec<Memory> = (0..10)
            .map(|i| mem(&format!("User likes item{i}"), &format!("{i:02}")))
            .collect();
        assert_eq!(rank(&memories, "user likes", 3, 0.0).len(), 3);
        assert!(rank(&memories, "user likes", 0, 0.0).is_empty());
    }

    #[test]
    fn empty_query_scores_zero() {
        let memories = vec![mem("User likes pizza", "1")];
        assert!(rank(&memories, "?!", 5, 0.01).is_empty());
    }
}

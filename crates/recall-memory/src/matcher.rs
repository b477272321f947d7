//! Near-Duplicate Matcher.
//!
//! Decides whether two preference items name the same thing, so that
//! `"pizz"` and `"pizza"` collapse into one memory. Inputs are expected to
//! have gone through [`normalize_item`] first.
//!
//! [`is_near_match`] applies, in order:
//!
//! 1. exact equality → match;
//! 2. length difference greater than one → no match;
//! 3. substring containment where the shorter side has at least
//!    [`MIN_SUBSTRING_LEN`] characters → match;
//! 4. [`within_one_edit`] → match when at most one character diverges.
//!
//! This is not Levenshtein distance. Short items one substitution apart
//! still merge (`"cats"` ~ `"cars"`); that behaviour is kept on purpose.

/// Shortest side length for which containment counts as a match.
pub const MIN_SUBSTRING_LEN: usize = 4;

/// Lowercase, keep only alphanumerics, spaces and hyphens, collapse runs of
/// whitespace.
pub fn normalize_item(item: &str) -> String {
    let kept: String = item
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether two normalized items denote the same preference.
pub fn is_near_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > 1 {
        return false;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if shorter.len() >= MIN_SUBSTRING_LEN && contains(longer, shorter) {
        return true;
    }

    within_one_edit(&a, &b)
}

/// Single-pass two-cursor scan tolerating one substitution, insertion or
/// deletion.
///
/// On a mismatch the cursor of the longer sequence advances alone (an
/// insertion / deletion); with equal lengths both advance (a substitution).
/// Characters left over after either cursor reaches its end count as further
/// divergences.
pub fn within_one_edit(a: &[char], b: &[char]) -> bool {
    let (mut i, mut j) = (0, 0);
    let mut divergences = 0usize;

    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            i += 1;
            j += 1;
            continue;
        }
        divergences += 1;
        if divergences > 1 {
            return false;
        }
        match a.len().cmp(&b.len()) {
            std::cmp::Ordering::Greater => i += 1,
            std::cmp::Ordering::Less => j += 1,
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }

    divergences + (a.len() - i) + (b.len() - j) <= 1
}

fn contains(haystack: &[char], needle: &[char]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

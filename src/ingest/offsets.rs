//! Offset reconciliation for extracted passages
//!
//! Upstream extractors return passage text with only an approximate start
//! offset. This module recovers the exact character span of a passage within
//! the verbatim source text using tiered exact substring search. No tier
//! raises; failure degrades to the next tier and the final tier is pure
//! arithmetic.
//!
//! All offsets are character offsets, not byte offsets.

use tracing::debug;

/// How far before the hint the windowed search may begin
const SEARCH_BACK_WINDOW: i64 = 200;

/// Prefix length used by the truncated-match tier
const PREFIX_CHARS: usize = 80;

/// Resolve the character span of `passage_text` within `source`.
///
/// Three tiers, first success wins:
/// 1. Exact match, searching forward from `hint_start - 200` (clamped to 0)
///    with no upper bound.
/// 2. Match on the first 80 characters only, from the same window start.
///    The returned end is still `start + full passage length`: the upstream
///    extractor truncates trailing text, and the untruncated passage is
///    assumed to occupy contiguous space after the matched prefix.
/// 3. `(hint_start, hint_start + passage length)` verbatim, with no bounds
///    validation. Callers must treat tier-3 spans as unverified.
///
/// `hint_start` may be any value, including negative or past the end of
/// `source`; an out-of-range hint is not an error.
pub fn resolve_span(source: &str, passage_text: &str, hint_start: i64) -> (i64, i64) {
    let passage_chars = passage_text.chars().count() as i64;
    let window_start = hint_start.saturating_sub(SEARCH_BACK_WINDOW).max(0) as usize;

    if let Some(start) = find_from_char(source, passage_text, window_start) {
        return (start as i64, start as i64 + passage_chars);
    }

    let prefix = char_prefix(passage_text, PREFIX_CHARS);
    if prefix.len() < passage_text.len() {
        if let Some(start) = find_from_char(source, prefix, window_start) {
            return (start as i64, start as i64 + passage_chars);
        }
    }

    debug!(
        hint_start,
        passage_chars, "offset resolution fell back to unverified hint span"
    );
    (hint_start, hint_start + passage_chars)
}

/// Search for `needle` in `haystack` starting no earlier than character
/// offset `from_char`. Returns the match position as a character offset.
fn find_from_char(haystack: &str, needle: &str, from_char: usize) -> Option<usize> {
    let byte_start = if from_char == 0 {
        0
    } else {
        haystack.char_indices().nth(from_char)?.0
    };
    let found = haystack[byte_start..].find(needle)?;
    let abs_byte = byte_start + found;
    Some(haystack[..abs_byte].chars().count())
}

/// The first `n` characters of `s`, or all of `s` if it is shorter.
fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

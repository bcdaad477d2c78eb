//! Deterministic key derivation for the Response Cache:
//! `sha256(thread_id || "\n" || normalise(user_text) || "\n" || intent_tag)`.
//! The cache key intentionally excludes provider — see the Open Question
//! note in DESIGN.md.

use sha2::{Digest, Sha256};

/// Lowercases, collapses whitespace runs, and strips trailing punctuation.
/// Pure and deterministic.
pub fn normalise(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed.trim_end_matches(|c: char| c.is_ascii_punctuation()).to_string()
}

pub fn cache_key(thread_id: &str, user_text: &str, intent_tag: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(thread_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(normalise(user_text).as_bytes());
    hasher.update(b"\n");
    hasher.update(intent_tag.as_bytes());
    format!("{:x}", hasher.finalize())
}

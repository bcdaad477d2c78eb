//! Lightweight PII redaction run over memory fragment text before it is
//! eligible for the shared tier (spec.md §3: "shared-tier fragments must
//! have passed PII redaction"). Not a general-purpose PII scrubber — it
//! catches the obvious cases (emails, long digit runs) a fact extracted
//! from a chat message might carry.

/// Replaces email-like and phone-number-like tokens with placeholders.
pub fn redact_pii(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            if word.contains('@') && word.contains('.') {
                "[redacted-email]".to_string()
            } else if word.chars().filter(|c| c.is_ascii_digit()).count() >= 7 {
                "[redacted-number]".to_string()
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

//! Post-turn first-person self-assertion extraction (spec.md §4.6: `"my
//! name is …"`, `"I'm working on …"`). Pure string matching, no I/O — the
//! same heuristic style as `gw-router::classify`.

/// Checked in order per clause; the first pattern that matches wins, so
/// more specific phrasings (`"i'm working on "`) must precede the shorter
/// ones they contain (`"i'm "`).
const ASSERTION_PATTERNS: &[(&str, &str)] = &[
    ("i'm working on ", "working on"),
    ("i am working on ", "working on"),
    ("my name is ", "name is"),
    ("call me ", "name is"),
    ("i work on ", "working on"),
    ("i am ", "name is"),
    ("i'm ", "name is"),
    ("working on ", "working on"),
];

/// Splits `content` into clauses and returns one fact string per matched
/// self-assertion, e.g. `"my name is Alex, working on a Python project"` →
/// `["name is Alex", "working on a Python project"]`.
pub fn extract_self_assertions(content: &str) -> Vec<String> {
    let mut facts = Vec::new();
    for raw_clause in content.split([',', '.', ';', '\n']) {
        let clause = raw_clause.trim();
        if clause.is_empty() {
            continue;
        }
        let lower = clause.to_lowercase();
        for (pattern, label) in ASSERTION_PATTERNS {
            if let Some(idx) = lower.find(pattern) {
                let rest = clause[idx + pattern.len()..].trim();
                if !rest.is_empty() {
                    facts.push(format!("{label} {rest}"));
                }
                break;
            }
        }
    }
    facts
}

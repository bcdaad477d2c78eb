//! Context assembly for the prompt sent to a provider: profile facts, the
//! thread summary, related cross-thread fragments, and as many recent
//! turns as fit, in that priority order, capped at a fraction of the
//! model's context window.

use crate::schema::{MemoryFragment, Thread};
use crate::tokens;

pub fn context_for_prompt(
    thread: &Thread,
    fragments: &[MemoryFragment],
    window_tokens: usize,
    cap_fraction: f64,
) -> String {
    let budget = ((window_tokens as f64) * cap_fraction) as usize;
    let mut used = 0usize;
    let mut sections = Vec::new();

    if !thread.profile_facts.is_empty() {
        let block = format!("[USER_PROFILE]\n{}", thread.profile_facts.join("\n"));
        let cost = tokens::estimate(&block);
        if used + cost <= budget {
            used += cost;
            sections.push(block);
        }
    }

    if let Some(summary) = &thread.summary {
        let block = format!("[THREAD_SUMMARY]\n{summary}");
        let cost = tokens::estimate(&block);
        if used + cost <= budget {
            used += cost;
            sections.push(block);
        }
    }

    if !fragments.is_empty() {
        let lines: Vec<String> = fragments.iter().map(|f| format!("- {}", f.content)).collect();
        let block = format!("[RELATED_MEMORY]\n{}", lines.join("\n"));
        let cost = tokens::estimate(&block);
        if used + cost <= budget {
            used += cost;
            sections.push(block);
        }
    }

    // Recent turns fill whatever budget remains, newest first so the most
    // relevant context survives truncation, then restored to chronological
    // order before rendering.
    let mut turn_lines = Vec::new();
    for turn in thread.turns.iter().rev() {
        let line = format!("{:?}: {}", turn.role, turn.content);
        let cost = tokens::estimate(&line);
        if used + cost > budget {
            break;
        }
        used += cost;
        turn_lines.push(line);
    }
    turn_lines.reverse();
    if !turn_lines.is_empty() {
        sections.push(format!("[RECENT_TURNS]\n{}", turn_lines.join("\n")));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Role, Turn};

    #[test]
    fn assembles_all_blocks_when_budget_allows() {
        let mut thread = Thread::new("acme");
        thread.profile_facts.push("prefers concise answers".to_string());
        thread.summary = Some("Discussed Rust error handling.".to_string());
        thread.turns.push(Turn::new(Role::User, "What about async?"));

        let ctx = context_for_prompt(&thread, &[], 8000, 0.70);
        assert!(ctx.contains("[USER_PROFILE]"));
        assert!(ctx.contains("[THREAD_SUMMARY]"));
        assert!(ctx.contains("[RECENT_TURNS]"));
    }

    #[test]
    fn drops_oldest_turns_first_under_tight_budget() {
        let mut thread = Thread::new("acme");
        for i in 0..50 {
            thread.turns.push(Turn::new(Role::User, format!("message number {i}")));
        }
        let ctx = context_for_prompt(&thread, &[], 30, 0.70);
        assert!(ctx.contains("message number 49"));
        assert!(!ctx.contains("message number 0\n") && !ctx.starts_with("message number 0"));
    }

    #[test]
    fn empty_thread_yields_empty_context() {
        let thread = Thread::new("acme");
        assert_eq!(context_for_prompt(&thread, &[], 8000, 0.70), "");
    }
}

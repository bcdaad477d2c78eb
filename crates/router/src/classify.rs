//! Pure intent classification. No I/O, no shared state — a function of the
//! utterance and the recent turns only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentTag {
    SocialChat,
    QaRetrieval,
    CodingHelp,
    EditingWriting,
    ReasoningMath,
    AmbiguousOther,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub tag: IntentTag,
    /// e.g. `Some("web_multisearch")` for a time-sensitive `qa_retrieval`.
    pub sub_pipeline: Option<String>,
}

impl Intent {
    fn new(tag: IntentTag) -> Self {
        Self { tag, sub_pipeline: None }
    }

    fn with_sub_pipeline(tag: IntentTag, sub: &str) -> Self {
        Self { tag, sub_pipeline: Some(sub.to_string()) }
    }

    /// Rendered as `"qa_retrieval:web_multisearch"` or `"coding_help"` — the
    /// exact string used in the Response Cache key and in `meta.intent`.
    pub fn as_cache_key_str(&self) -> String {
        let base = match self.tag {
            IntentTag::SocialChat => "social_chat",
            IntentTag::QaRetrieval => "qa_retrieval",
            IntentTag::CodingHelp => "coding_help",
            IntentTag::EditingWriting => "editing_writing",
            IntentTag::ReasoningMath => "reasoning_math",
            IntentTag::AmbiguousOther => "ambiguous_other",
        };
        match &self.sub_pipeline {
            Some(sub) => format!("{base}:{sub}"),
            None => base.to_string(),
        }
    }
}

const GREETING_PATTERNS: &[&str] = &["hi", "hello", "hey", "how are you", "thanks", "thank you"];
const TIME_INDICATORS: &[&str] = &["today", "this week", "yesterday", "two days ago", "latest", "recent", "breaking"];
const CODE_VERBS: &[&str] = &["write", "implement", "debug", "refactor", "explain"];
const PROGRAMMING_MARKERS: &[&str] = &["```", "fn ", "def ", "class ", "function", "rust", "python", "javascript", "code"];
const EDIT_VERBS: &[&str] = &["rewrite", "edit", "polish", "shorten"];
const MATH_MARKERS: &[&str] = &["prove", "calculate", "equation", "derivative", "integral", "theorem", "sum of", "solve for"];
const INTERROGATIVES: &[&str] = &["what", "who", "where", "why", "how"];

/// `classify(utterance, recent_turns) → (intent, confidence)`. Confidence is
/// a bounded match-density heuristic, used only by the Router to decide
/// whether to try a small model first.
pub fn classify(utterance: &str, _recent_turns: &[&str]) -> (Intent, f32) {
    let lower = utterance.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let word_count = words.len().max(1);
    let has_question_mark = utterance.trim_end().ends_with('?');
    let is_interrogative = INTERROGATIVES.iter().any(|w| lower.starts_with(w)) || has_question_mark;

    if !is_interrogative && words.len() <= 6 && GREETING_PATTERNS.iter().any(|p| lower.contains(p)) {
        let matches = count_matches(&lower, GREETING_PATTERNS);
        return (Intent::new(IntentTag::SocialChat), confidence(matches, word_count));
    }

    let time_matches = count_matches(&lower, TIME_INDICATORS);
    if time_matches > 0 && words.len() > 2 {
        return (
            Intent::with_sub_pipeline(IntentTag::QaRetrieval, "web_multisearch"),
            confidence(time_matches, word_count),
        );
    }

    let code_verb_matches = count_matches(&lower, CODE_VERBS);
    let programming_matches = count_matches(&lower, PROGRAMMING_MARKERS);
    if code_verb_matches > 0 && programming_matches > 0 {
        return (
            Intent::new(IntentTag::CodingHelp),
            confidence(code_verb_matches + programming_matches, word_count),
        );
    }

    let edit_matches = count_matches(&lower, EDIT_VERBS);
    if edit_matches > 0 {
        return (Intent::new(IntentTag::EditingWriting), confidence(edit_matches, word_count));
    }

    let math_matches = count_matches(&lower, MATH_MARKERS);
    if math_matches > 0 {
        return (Intent::new(IntentTag::ReasoningMath), confidence(math_matches, word_count));
    }

    if is_interrogative && time_matches == 0 {
        let matches = count_matches(&lower, INTERROGATIVES).max(1);
        return (Intent::new(IntentTag::QaRetrieval), confidence(matches, word_count));
    }

    (Intent::new(IntentTag::AmbiguousOther), 0.3)
}

fn count_matches(haystack: &str, needles: &[&str]) -> usize {
    needles.iter().filter(|n| haystack.contains(*n)).count()
}

fn confidence(matches: usize, word_count: usize) -> f32 {
    ((matches as f32) / (word_count as f32)).clamp(0.0, 1.0).max(0.35)
}

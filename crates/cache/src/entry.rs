//! The value side of a Response Cache entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub text: String,
    pub intent: String,
    pub provider: String,
    pub model: String,
    pub usage: Usage,
    #[serde(default)]
    pub citations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(text: impl Into<String>, intent: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            intent: intent.into(),
            provider: provider.into(),
            model: model.into(),
            usage: Usage::default(),
            citations: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

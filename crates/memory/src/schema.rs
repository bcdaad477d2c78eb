//! Core data types shared by the thread store, the fragment store, and the
//! context builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Set for user turns once the Router has classified them.
    pub intent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            intent: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }
}

/// A conversation. Turns accumulate until the summarisation trigger in
/// `MemoryManager` condenses the oldest batch into `summary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub org_id: String,
    pub turns: Vec<Turn>,
    pub summary: Option<String>,
    /// Durable facts extracted from the conversation ("prefers concise
    /// answers", "works in Rust"), kept separate from `summary` so they
    /// survive every summarisation pass.
    pub profile_facts: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(org_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            org_id: org_id.into(),
            turns: Vec::new(),
            summary: None,
            profile_facts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn non_system_turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role != Role::System).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentTier {
    /// Retrievable by any other thread within the originating organisation
    /// (never across organisations), excluding the thread that produced it.
    /// The default tier; promotion to `Shared` is an explicit gated action.
    Private,
    /// Retrievable the same way as `Private`, additionally surfaced to
    /// retrieval only when the organisation's `allow_shared_memory` policy
    /// is enabled.
    Shared,
}

/// A piece of durable knowledge extracted from a thread, retrievable by
/// other threads once promoted to the shared tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFragment {
    pub id: Uuid,
    pub org_id: String,
    pub origin_thread_id: Uuid,
    pub tier: FragmentTier,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    /// Provenance: which provider/model served the turn this fragment was
    /// extracted alongside.
    pub provider: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl MemoryFragment {
    pub fn new(
        org_id: impl Into<String>,
        origin_thread_id: Uuid,
        content: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id: org_id.into(),
            origin_thread_id,
            tier: FragmentTier::Private,
            content: content.into(),
            embedding: None,
            provider: provider.into(),
            model: model.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MemoryError {
    #[error("thread {0} not found")]
    ThreadNotFound(Uuid),
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

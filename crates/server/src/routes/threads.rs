//! Companion thread endpoints from spec.md §6 ("specified only for
//! completeness of boundary... details out of scope"). `GET` reuses
//! `get_or_create_thread` rather than a separate read-only lookup, so a
//! `GET` on an unknown thread id creates an empty one scoped to the
//! supplied org — acceptable for a companion endpoint whose shape, per the
//! spec, is otherwise unconstrained.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use gw_memory::Thread;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::messages::org_id_from;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub org_id: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub id: Uuid,
    pub org_id: String,
    pub turn_count: usize,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Thread> for ThreadResponse {
    fn from(thread: Thread) -> Self {
        Self {
            id: thread.id,
            org_id: thread.org_id,
            turn_count: thread.turns.len(),
            summary: thread.summary,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        }
    }
}

pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateThreadRequest>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let thread = state.ctx.memory.get_or_create_thread(Uuid::new_v4(), &body.org_id).await?;
    Ok(Json(thread.into()))
}

pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ThreadResponse>, ApiError> {
    let org_id = org_id_from(&headers)?;
    let thread = state.ctx.memory.get_or_create_thread(thread_id, &org_id).await?;
    Ok(Json(thread.into()))
}

//! `POST /threads/{thread_id}/cancel/{request_id}` — spec.md §6, §4.9.
//! Always 204; whether a matching in-flight request was actually found is
//! only logged, not surfaced, since a request that already finished and a
//! request that never existed are indistinguishable to the caller.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::state::AppState;

pub async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Path((thread_id, request_id)): Path<(Uuid, Uuid)>,
) -> StatusCode {
    if !state.cancel_request(thread_id, request_id) {
        tracing::debug!(%thread_id, %request_id, "cancel requested for an unknown or already-finished request");
    }
    StatusCode::NO_CONTENT
}

//! `POST /threads/{thread_id}/messages/stream` — the SSE endpoint, spec.md
//! §4.9/§6. Request validation and cancellation-registry bookkeeping live
//! here; the actual routing/fallback/streaming work is `gw_dispatch::run`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gw_dispatch::{validate, DispatchRequest, Scope, SseEvent};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::sse::to_sse_event;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub role: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub reason: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub use_memory: Option<bool>,
}

pub(crate) fn org_id_from(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-org-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingOrgHeader)
}

fn parse_scope(raw: Option<&str>) -> Scope {
    match raw {
        Some("shared") => Scope::Shared,
        _ => Scope::Private,
    }
}

pub async fn stream_message(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<MessageRequest>,
) -> Result<Response, ApiError> {
    let org_id = org_id_from(&headers)?;
    validate(&body.content)?;

    let request_id = Uuid::new_v4();
    let request = DispatchRequest {
        request_id,
        thread_id,
        org_id,
        content: body.content,
        provider_hint: body.provider,
        model_hint: body.model,
        scope: parse_scope(body.scope.as_deref()),
        use_memory: body.use_memory.unwrap_or(true),
    };

    let cancel = state.begin_request(thread_id, request_id);
    let mut events = gw_dispatch::pipeline::run(state.ctx.clone(), request, cancel).await;

    let cleanup_state = state.clone();
    let stream = async_stream::stream! {
        while let Some(event) = events.recv().await {
            let terminal = matches!(event, SseEvent::Done(_));
            yield Ok::<_, std::convert::Infallible>(to_sse_event(&event));
            if terminal {
                break;
            }
        }
        cleanup_state.end_request(thread_id, request_id);
    };

    let mut response = Sse::new(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store, no-transform"));
    headers.insert(HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no"));
    Ok(response)
}

//! The SSE event vocabulary from spec.md §6, independent of any particular
//! HTTP framework so `gw-dispatch` stays usable without `axum` in tests.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct MetaPayload {
    pub request_id: Uuid,
    pub intent: String,
    pub provider: String,
    pub model: String,
    pub ttft_ms: u64,
    pub cache_hit: bool,
    pub pipeline: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaPayload {
    pub delta: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    Ok,
    Cancelled,
    FallbackExhausted,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DonePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DoneReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum SseEvent {
    Ping,
    Meta(MetaPayload),
    Delta(DeltaPayload),
    Done(DonePayload),
    Error(ErrorPayload),
}

impl SseEvent {
    /// The SSE `event:` field name.
    pub fn name(&self) -> &'static str {
        match self {
            SseEvent::Ping => "ping",
            SseEvent::Meta(_) => "meta",
            SseEvent::Delta(_) => "delta",
            SseEvent::Done(_) => "done",
            SseEvent::Error(_) => "error",
        }
    }

    pub fn done(reason: DoneReason) -> Self {
        SseEvent::Done(DonePayload { reason: Some(reason) })
    }
}

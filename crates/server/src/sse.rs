//! Translates the framework-independent `gw_dispatch::SseEvent` vocabulary
//! into axum's `sse::Event`, the one place this crate knows the wire event
//! names carry the payload as JSON `data:`.

use axum::response::sse::Event;
use gw_dispatch::SseEvent;

pub fn to_sse_event(event: &SseEvent) -> Event {
    Event::default().event(event.name()).data(event_data(event))
}

fn event_data(event: &SseEvent) -> String {
    match event {
        SseEvent::Ping => "{}".to_string(),
        SseEvent::Meta(payload) => serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string()),
        SseEvent::Delta(payload) => serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string()),
        SseEvent::Done(payload) => serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string()),
        SseEvent::Error(payload) => serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_dispatch::{DonePayload, DoneReason, ErrorPayload};

    #[test]
    fn ping_carries_an_empty_object() {
        assert_eq!(event_data(&SseEvent::Ping), "{}");
    }

    #[test]
    fn done_serialises_its_reason() {
        let event = SseEvent::Done(DonePayload { reason: Some(DoneReason::Ok) });
        assert_eq!(event_data(&event), r#"{"reason":"ok"}"#);
    }

    #[test]
    fn error_payload_round_trips_through_json() {
        let event = SseEvent::Error(ErrorPayload { code: "internal".to_string(), message: "boom".to_string() });
        let rendered: serde_json::Value = serde_json::from_str(&event_data(&event)).unwrap();
        assert_eq!(rendered["code"], "internal");
        assert_eq!(rendered["message"], "boom");
    }

    #[test]
    fn to_sse_event_does_not_panic_for_any_variant() {
        let _ = to_sse_event(&SseEvent::Ping);
        let _ = to_sse_event(&SseEvent::Meta(gw_dispatch::MetaPayload {
            request_id: uuid::Uuid::new_v4(),
            intent: "coding_help".to_string(),
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            ttft_ms: 120,
            cache_hit: false,
            pipeline: "direct_llm".to_string(),
        }));
        let _ = to_sse_event(&SseEvent::Delta(gw_dispatch::DeltaPayload { delta: "hi".to_string() }));
        let _ = to_sse_event(&SseEvent::Done(DonePayload { reason: None }));
    }
}

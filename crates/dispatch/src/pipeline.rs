//! The Dispatch Pipeline: the ordered steps of spec.md §4.8 for one
//! incoming streaming request, composing every other component behind
//! `GatewayContext`.

use std::sync::Arc;
use std::time::Instant;

use gw_cache::{cache_key, normalise, CacheEntry};
use gw_llm::{ChatMessage, Chunk, ProviderErrorKind};
use gw_memory::{redact_pii, MemoryFragment, Role, Thread, Turn};
use gw_router::{classify, Pipeline};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::context::GatewayContext;
use crate::event::{DeltaPayload, DoneReason, ErrorPayload, MetaPayload, SseEvent};
use crate::sanitize::sanitize;

const APOLOGY_TEXT: &str = "Sorry, I couldn't reach any provider for this request right now. Please try again shortly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Private,
    Shared,
}

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub request_id: Uuid,
    pub thread_id: Uuid,
    pub org_id: String,
    pub content: String,
    /// Hints from the client; absence means the Router decides.
    pub provider_hint: Option<String>,
    pub model_hint: Option<String>,
    pub scope: Scope,
    pub use_memory: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("content must not be empty")]
    EmptyContent,
}

/// Pre-stream validation the server runs before opening the SSE body (§4.8
/// step 1, the 4xx half of it) — an empty utterance never gets a stream.
pub fn validate(content: &str) -> Result<(), DispatchError> {
    if content.trim().is_empty() {
        return Err(DispatchError::EmptyContent);
    }
    Ok(())
}

/// Runs the full pipeline for one request and returns the channel its SSE
/// events are delivered on. `cancel` is the Request Handle: the server
/// fires it on client disconnect or the explicit cancel endpoint.
pub async fn run(ctx: Arc<GatewayContext>, request: DispatchRequest, cancel: CancellationToken) -> mpsc::Receiver<SseEvent> {
    let (tx, rx) = mpsc::channel(128);
    tokio::spawn(async move {
        // Emitted before any upstream work so clients see bytes fast, per
        // spec.md §4.9.
        if tx.send(SseEvent::Ping).await.is_err() {
            return;
        }
        run_inner(ctx, request, cancel, tx).await;
    });
    rx
}

#[instrument(skip(ctx, request, cancel, tx), fields(thread_id = %request.thread_id, request_id = %request.request_id))]
async fn run_inner(ctx: Arc<GatewayContext>, request: DispatchRequest, cancel: CancellationToken, tx: mpsc::Sender<SseEvent>) {
    let accept = Instant::now();
    let (content, safety_note) = sanitize(&request.content);

    let thread_lock = ctx.thread_lock(request.thread_id);
    let mut thread = {
        let _guard = thread_lock.lock().await;
        match ctx.memory.get_or_create_thread(request.thread_id, &request.org_id).await {
            Ok(thread) => thread,
            Err(err) => {
                let _ = tx
                    .send(SseEvent::Error(ErrorPayload { code: "internal".to_string(), message: err.to_string() }))
                    .await;
                let _ = tx.send(SseEvent::done(DoneReason::Internal)).await;
                return;
            }
        }
    };

    if cancel.is_cancelled() {
        let _ = tx.send(SseEvent::done(DoneReason::Cancelled)).await;
        return;
    }

    let recent: Vec<&str> = thread.turns.iter().rev().take(6).map(|t| t.content.as_str()).collect();
    let (intent, confidence) = classify(&content, &recent);
    let intent_key = intent.as_cache_key_str();

    let response_cache_key = cache_key(&request.thread_id.to_string(), &content, &intent_key);
    if let Some(cached) = ctx.cache.get(&response_cache_key) {
        let ttft_ms = accept.elapsed().as_millis() as u64;
        let _ = tx
            .send(SseEvent::Meta(MetaPayload {
                request_id: request.request_id,
                intent: intent_key.clone(),
                provider: cached.provider.clone(),
                model: cached.model.clone(),
                ttft_ms,
                cache_hit: true,
                pipeline: "cache".to_string(),
            }))
            .await;
        let _ = tx.send(SseEvent::Delta(DeltaPayload { delta: cached.text.clone() })).await;
        persist_turn(
            &ctx,
            &thread_lock,
            &mut thread,
            &content,
            &cached.text,
            &intent_key,
            &cached.provider,
            &cached.model,
            request.scope,
        )
        .await;
        let _ = tx.send(SseEvent::done(DoneReason::Ok)).await;
        return;
    }

    let org_allows_shared_memory = ctx
        .org_registry
        .get(&request.org_id)
        .map(|org| org.allow_shared_memory)
        .unwrap_or(false);

    let fragments = if request.use_memory {
        ctx.memory
            .retrieve_fragments(&request.org_id, request.thread_id, &[], org_allows_shared_memory)
            .await
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    let prompt_context = ctx.memory.build_context(&thread, &fragments, 8_000);

    let mut messages = Vec::new();
    if !prompt_context.is_empty() {
        messages.push(ChatMessage::system(prompt_context));
    }
    if let Some(note) = &safety_note {
        messages.push(ChatMessage::system(note.clone()));
    }
    messages.push(ChatMessage::user(content.clone()));

    let hint = request.provider_hint.clone();
    let (pipeline, chain) = ctx.router.route(&intent, confidence, |provider| {
        hint.as_deref().map(|h| h == provider).unwrap_or(true) && ctx.has_credential(provider)
    });

    let mut served = false;
    for link in &chain {
        if cancel.is_cancelled() {
            let _ = tx.send(SseEvent::done(DoneReason::Cancelled)).await;
            return;
        }
        if link.provider == "apology" {
            continue;
        }
        let Some(adapter) = ctx.adapter(&link.provider) else {
            continue;
        };
        let model = request.model_hint.clone().unwrap_or_else(|| link.model.clone());

        let pacer = ctx.pacers.get(&link.provider);
        let lease = pacer.acquire().await;
        let _queue_wait_ms = lease.queue_wait_ms;

        // (provider, model, canonical prompt, scope) — deliberately excludes
        // thread id so concurrent requests on distinct threads with
        // identical content still coalesce (spec.md §4.4, scenario S5).
        let coalesce_key = format!("{}:{}:{}:{:?}", link.provider, model, normalise(&content), request.scope);
        let messages_for_attempt = messages.clone();
        let adapter_for_attempt = adapter.clone();
        let model_for_attempt = model.clone();
        let mut stream = ctx
            .coalescer
            .run(coalesce_key, move || async move { adapter_for_attempt.stream(&messages_for_attempt, &model_for_attempt).await })
            .await;

        let mut first_chunk_seen = false;
        let mut assistant_text = String::new();
        let mut attempt_failed = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = tx.send(SseEvent::done(DoneReason::Cancelled)).await;
                    return;
                }
                next = stream.recv() => {
                    match next {
                        Some(Ok(Chunk::Meta { provider, model: served_model })) => {
                            if !first_chunk_seen {
                                first_chunk_seen = true;
                                let ttft_ms = accept.elapsed().as_millis() as u64;
                                let _ = tx.send(SseEvent::Meta(MetaPayload {
                                    request_id: request.request_id,
                                    intent: intent_key.clone(),
                                    provider,
                                    model: served_model,
                                    ttft_ms,
                                    cache_hit: false,
                                    pipeline: pipeline_name(pipeline),
                                })).await;
                            }
                        }
                        Some(Ok(Chunk::Delta { text })) => {
                            if !first_chunk_seen {
                                first_chunk_seen = true;
                                let ttft_ms = accept.elapsed().as_millis() as u64;
                                let _ = tx.send(SseEvent::Meta(MetaPayload {
                                    request_id: request.request_id,
                                    intent: intent_key.clone(),
                                    provider: link.provider.clone(),
                                    model: model.clone(),
                                    ttft_ms,
                                    cache_hit: false,
                                    pipeline: pipeline_name(pipeline),
                                })).await;
                            }
                            assistant_text.push_str(&text);
                            if tx.send(SseEvent::Delta(DeltaPayload { delta: text })).await.is_err() {
                                return;
                            }
                        }
                        Some(Ok(Chunk::Usage(_))) => {}
                        Some(Ok(Chunk::Done)) => break,
                        Some(Err(err)) => {
                            match err.kind {
                                ProviderErrorKind::Transient | ProviderErrorKind::PermanentForAttempt if assistant_text.is_empty() => {
                                    pacer.record_rate_limited();
                                    ctx.router.record_failure(&link.provider);
                                    attempt_failed = true;
                                    break;
                                }
                                ProviderErrorKind::SafetyRefusal => {
                                    let _ = tx.send(SseEvent::Delta(DeltaPayload { delta: err.message.clone() })).await;
                                    let _ = tx.send(SseEvent::done(DoneReason::Ok)).await;
                                    persist_turn(
                                        &ctx,
                                        &thread_lock,
                                        &mut thread,
                                        &content,
                                        &err.message,
                                        &intent_key,
                                        &link.provider,
                                        &model,
                                        request.scope,
                                    )
                                    .await;
                                    return;
                                }
                                _ => {
                                    // A mid-stream failure after deltas were already
                                    // emitted cannot silently retry on another
                                    // provider without violating the single-stream
                                    // guarantee (§4.8 ordering guarantees).
                                    if assistant_text.is_empty() {
                                        let _ = tx
                                            .send(SseEvent::Error(ErrorPayload { code: "internal".to_string(), message: err.message.clone() }))
                                            .await;
                                    }
                                    let _ = tx.send(SseEvent::done(DoneReason::Internal)).await;
                                    return;
                                }
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        if attempt_failed {
            continue;
        }

        ctx.router.record_success(&link.provider);
        served = true;
        let _ = tx.send(SseEvent::done(DoneReason::Ok)).await;
        persist_turn(
            &ctx,
            &thread_lock,
            &mut thread,
            &content,
            &assistant_text,
            &intent_key,
            &link.provider,
            &model,
            request.scope,
        )
        .await;

        if !assistant_text.is_empty() {
            let ttl = ctx.config.cache_ttl_for_intent(&intent_key);
            let entry = CacheEntry::new(assistant_text, intent_key.clone(), link.provider.clone(), model);
            ctx.cache.insert(response_cache_key, entry, ttl);
        }
        break;
    }

    if !served {
        let _ = tx.send(SseEvent::Delta(DeltaPayload { delta: APOLOGY_TEXT.to_string() })).await;
        let _ = tx.send(SseEvent::done(DoneReason::FallbackExhausted)).await;
        // No assistant turn is persisted for an exhausted chain: the contract
        // in spec.md §8 invariant 1 only binds `done{reason:"ok"}` streams.
    }
}

fn pipeline_name(pipeline: Pipeline) -> String {
    match pipeline {
        Pipeline::DirectLlm => "direct_llm",
        Pipeline::WebMultisearch => "web_multisearch",
        Pipeline::DirectApology => "direct_apology",
    }
    .to_string()
}

#[allow(clippy::too_many_arguments)]
async fn persist_turn(
    ctx: &Arc<GatewayContext>,
    thread_lock: &Arc<tokio::sync::Mutex<()>>,
    thread: &mut Thread,
    user_content: &str,
    assistant_text: &str,
    intent_key: &str,
    provider: &str,
    model: &str,
    scope: Scope,
) {
    let _guard = thread_lock.lock().await;

    // Extracted before the turns are pushed so the profile-facts update is
    // captured by the same save as the turn append (§4.6 step 9).
    let new_facts = ctx.memory.record_self_assertions(thread, user_content);

    let user_turn = Turn::new(Role::User, user_content).with_intent(intent_key.to_string());
    let assistant_turn = Turn::new(Role::Assistant, assistant_text);
    if ctx.memory.record_turn(thread, user_turn).await.is_ok() {
        let _ = ctx.memory.record_turn(thread, assistant_turn).await;
    }

    if new_facts.is_empty() {
        return;
    }
    let org_allows_shared_memory = ctx
        .org_registry
        .get(&thread.org_id)
        .map(|org| org.allow_shared_memory)
        .unwrap_or(false);
    let requested_shared_scope = scope == Scope::Shared;
    for fact in new_facts {
        let fragment = MemoryFragment::new(&thread.org_id, thread.id, redact_pii(&fact), provider, model);
        let _ = ctx.memory.record_fragment(fragment, requested_shared_scope, org_allows_shared_memory, true).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use gw_config::crypto::{EncryptionKey, ProviderKeyRing};
    use gw_config::org::InMemoryOrgRegistry;
    use gw_config::AppConfig;
    use gw_llm::{ChatCompletion, ProviderAdapter, ProviderError};
    use gw_memory::{InMemoryFragmentStore, InMemoryThreadStore, MemoryManager};

    struct ScriptedAdapter {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        chunks: Vec<Chunk>,
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            self.name
        }

        async fn call(&self, _messages: &[ChatMessage], _model: &str) -> Result<ChatCompletion, ProviderError> {
            unimplemented!("pipeline only exercises stream() in these tests")
        }

        async fn stream(
            &self,
            _messages: &[ChatMessage],
            _model: &str,
        ) -> Result<mpsc::Receiver<Result<Chunk, ProviderError>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(self.chunks.len().max(1));
            let chunks = self.chunks.clone();
            tokio::spawn(async move {
                for chunk in chunks {
                    let _ = tx.send(Ok(chunk)).await;
                }
            });
            Ok(rx)
        }
    }

    fn test_context(calls: Arc<AtomicUsize>) -> Arc<GatewayContext> {
        let memory = MemoryManager::new(
            Arc::new(InMemoryThreadStore::new()),
            Arc::new(InMemoryFragmentStore::new()),
            AppConfig::default().memory,
        );
        let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert(
            "ollama".to_string(),
            Arc::new(ScriptedAdapter {
                name: "ollama",
                calls,
                chunks: vec![
                    Chunk::Meta { provider: "ollama".to_string(), model: "llama3.1:8b".to_string() },
                    Chunk::Delta { text: "hi ".to_string() },
                    Chunk::Delta { text: "there".to_string() },
                    Chunk::Done,
                ],
            }),
        );
        let key = EncryptionKey::derive("test").unwrap();
        let mut ring = ProviderKeyRing::new(key);
        ring.set_credential("ollama", "sk-test").unwrap();

        GatewayContext::new(AppConfig::default(), memory, adapters, ring, Arc::new(InMemoryOrgRegistry::new()))
    }

    fn base_request() -> DispatchRequest {
        DispatchRequest {
            request_id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            org_id: "acme".to_string(),
            content: "hi there".to_string(),
            provider_hint: None,
            model_hint: None,
            scope: Scope::Private,
            use_memory: false,
        }
    }

    #[tokio::test]
    async fn greeting_streams_ping_meta_delta_done() {
        let ctx = test_context(Arc::new(AtomicUsize::new(0)));
        let mut rx = run(ctx, base_request(), CancellationToken::new()).await;

        let ping = rx.recv().await.unwrap();
        assert_eq!(ping.name(), "ping");

        let meta = rx.recv().await.unwrap();
        assert_eq!(meta.name(), "meta");

        let mut text = String::new();
        loop {
            match rx.recv().await.unwrap() {
                SseEvent::Delta(d) => text.push_str(&d.delta),
                SseEvent::Done(d) => {
                    assert_eq!(d.reason, Some(DoneReason::Ok));
                    break;
                }
                other => panic!("unexpected event {}", other.name()),
            }
        }
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn second_identical_request_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = test_context(calls.clone());
        let mut request = base_request();

        let mut first = run(ctx.clone(), request.clone(), CancellationToken::new()).await;
        while let Some(event) = first.recv().await {
            if matches!(event, SseEvent::Done(_)) {
                break;
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        request.request_id = Uuid::new_v4();
        let mut second = run(ctx, request, CancellationToken::new()).await;
        let mut saw_cache_hit = false;
        while let Some(event) = second.recv().await {
            if let SseEvent::Meta(meta) = &event {
                saw_cache_hit = meta.cache_hit;
            }
            if matches!(event, SseEvent::Done(_)) {
                break;
            }
        }
        assert!(saw_cache_hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_person_assertion_populates_profile_facts_and_a_private_fragment() {
        let ctx = test_context(Arc::new(AtomicUsize::new(0)));
        let mut request = base_request();
        request.content = "my name is Alex, working on a Python project".to_string();
        let thread_id = request.thread_id;

        let mut rx = run(ctx.clone(), request, CancellationToken::new()).await;
        while let Some(event) = rx.recv().await {
            if matches!(event, SseEvent::Done(_)) {
                break;
            }
        }

        let thread = ctx.memory.get_or_create_thread(thread_id, "acme").await.unwrap();
        assert!(thread.profile_facts.contains(&"name is Alex".to_string()));
        assert!(thread.profile_facts.contains(&"working on a Python project".to_string()));

        // Recalled from a different thread in the same org, default-private.
        let fragments = ctx.memory.retrieve_fragments("acme", Uuid::new_v4(), &[], false).await.unwrap();
        assert_eq!(fragments.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_coalesce_to_one_adapter_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = test_context(calls.clone());

        let mut handles = Vec::new();
        for _ in 0..5 {
            let mut request = base_request();
            request.thread_id = Uuid::new_v4();
            let mut rx = run(ctx.clone(), request, CancellationToken::new()).await;
            handles.push(tokio::spawn(async move {
                let mut text = String::new();
                while let Some(event) = rx.recv().await {
                    if let SseEvent::Delta(d) = event {
                        text.push_str(&d.delta);
                    }
                }
                text
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "hi there");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_emits_cancelled_done_and_persists_nothing() {
        let ctx = test_context(Arc::new(AtomicUsize::new(0)));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut rx = run(ctx.clone(), base_request(), cancel).await;

        let mut saw_cancelled = false;
        while let Some(event) = rx.recv().await {
            if let SseEvent::Done(d) = event {
                saw_cancelled = d.reason == Some(DoneReason::Cancelled);
            }
        }
        assert!(saw_cancelled);
    }

    #[tokio::test]
    async fn exhausted_chain_emits_apology_and_fallback_exhausted() {
        let memory = MemoryManager::new(
            Arc::new(InMemoryThreadStore::new()),
            Arc::new(InMemoryFragmentStore::new()),
            AppConfig::default().memory,
        );
        let key = EncryptionKey::derive("test").unwrap();
        let ctx = GatewayContext::new(
            AppConfig::default(),
            memory,
            HashMap::new(),
            ProviderKeyRing::new(key),
            Arc::new(InMemoryOrgRegistry::new()),
        );

        let mut rx = run(ctx, base_request(), CancellationToken::new()).await;
        let mut reason = None;
        let mut saw_apology = false;
        while let Some(event) = rx.recv().await {
            match event {
                SseEvent::Delta(d) if d.delta == APOLOGY_TEXT => saw_apology = true,
                SseEvent::Done(d) => reason = d.reason,
                _ => {}
            }
        }
        assert!(saw_apology);
        assert_eq!(reason, Some(DoneReason::FallbackExhausted));
    }
}

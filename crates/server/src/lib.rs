//! The HTTP/SSE boundary: CLI args, provider adapter wiring, startup
//! warm-up, and the axum router. `main.rs` is a thin shell around `run`,
//! the same split `oidc-discovery-server` uses elsewhere in this stack.

pub mod error;
pub mod routes;
pub mod sse;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post, put};
use axum::Router;
use clap::Parser;
use gw_config::crypto::{EncryptionKey, ProviderKeyRing};
use gw_config::org::InMemoryOrgRegistry;
use gw_config::AppConfig;
use gw_dispatch::GatewayContext;
use gw_llm::{ChatMessage, OllamaAdapter, OpenRouterAdapter, ProviderAdapter, WebSearchAdapter};
use gw_memory::{InMemoryFragmentStore, InMemoryThreadStore, MemoryManager};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[clap(author, version, about = "Multi-tenant LLM gateway", long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file; missing file falls back to defaults.
    #[clap(long = "config", env = "GATEWAY_CONFIG", default_value = "config/gateway.toml")]
    pub config_path: String,

    /// Port the HTTP/SSE server binds to.
    #[clap(long = "port", env = "PORT", default_value = "8080")]
    pub port: u16,
}

pub async fn run(args: Args) -> Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load_from(&args.config_path).context("loading gateway config")?;

    let key = match EncryptionKey::from_env() {
        Ok(key) => key,
        Err(_) => {
            tracing::warn!("ENCRYPTION_KEY not set; deriving a development-only key");
            EncryptionKey::derive("gateway-dev-key").context("deriving fallback encryption key")?
        }
    };
    let mut key_ring = ProviderKeyRing::new(key);

    let adapters = build_adapters(&mut key_ring);
    warm_up(&adapters).await;

    let memory = MemoryManager::new(
        Arc::new(InMemoryThreadStore::new()),
        Arc::new(InMemoryFragmentStore::new()),
        config.memory.clone(),
    );

    let ctx = GatewayContext::new(config, memory, adapters, key_ring, Arc::new(InMemoryOrgRegistry::new()));
    let state = AppState::new(ctx);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .context("binding to port")?;

    tracing::info!(port = args.port, "gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    Ok(())
}

/// Reference adapters, keyed by the provider names the Router's fallback
/// chains already name (`default_chain_for` in `gw-router`). A provider is
/// only registered when it has enough configuration to be reachable; the
/// Router's credential gate keeps unconfigured providers out of any chain.
fn build_adapters(key_ring: &mut ProviderKeyRing) -> HashMap<String, Arc<dyn ProviderAdapter>> {
    let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();

    let ollama_base_url = std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
    adapters.insert("ollama".to_string(), Arc::new(OllamaAdapter::new(ollama_base_url)));
    // Ollama runs unauthenticated locally; the gateway still needs the
    // credential gate to pass so the Router will place it in a chain.
    let _ = key_ring.set_credential("ollama", "local");

    if let Ok(api_key) = std::env::var("OPENROUTER_API_KEY") {
        adapters.insert("openrouter".to_string(), Arc::new(OpenRouterAdapter::new(api_key.clone())));
        let _ = key_ring.set_credential("openrouter", &api_key);
    }

    if let Ok(search_base_url) = std::env::var("WEB_SEARCH_BASE_URL") {
        adapters.insert("web_search".to_string(), Arc::new(WebSearchAdapter::new(search_base_url)));
        let _ = key_ring.set_credential("web_search", "local");
    }

    adapters
}

/// Pings every configured provider once at startup so the first real
/// request doesn't pay for a cold connection, per spec.md §4.7. Best
/// effort: a provider that fails to warm up is still routed to later and
/// simply falls back like any other transient failure.
async fn warm_up(adapters: &HashMap<String, Arc<dyn ProviderAdapter>>) {
    for (name, adapter) in adapters {
        let probe = [ChatMessage::user("ping")];
        match adapter.call(&probe, default_warmup_model(name)).await {
            Ok(_) => tracing::info!(provider = %name, "provider warm-up succeeded"),
            Err(err) => tracing::warn!(provider = %name, error = %err, "provider warm-up failed, continuing anyway"),
        }
    }
}

fn default_warmup_model(provider: &str) -> &'static str {
    match provider {
        "openrouter" => "openai/gpt-4o-mini",
        _ => "llama3",
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/threads", post(routes::threads::create_thread))
        .route("/threads/{thread_id}", get(routes::threads::get_thread))
        .route("/threads/{thread_id}/audit", get(routes::audit::get_audit))
        .route("/threads/{thread_id}/messages/stream", post(routes::messages::stream_message))
        .route("/threads/{thread_id}/cancel/{request_id}", post(routes::cancel::cancel_request))
        .route("/providers", get(routes::providers::list_providers))
        .route(
            "/providers/{provider}/credentials",
            put(routes::providers::put_credential).delete(routes::providers::delete_credential),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C signal handler");
    tracing::info!("shutdown signal received, draining in-flight streams");
}

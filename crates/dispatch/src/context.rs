//! `GatewayContext`: the single struct every request task borrows, owning
//! every shared collaborator (config, cache, coalescer, pacers, router,
//! memory, provider adapters, credentials). Constructed once in the
//! server's `main` and shared behind an `Arc` — no per-module singletons.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gw_cache::ResponseCache;
use gw_config::crypto::ProviderKeyRing;
use gw_config::org::OrgRegistry;
use gw_config::AppConfig;
use gw_llm::ProviderAdapter;
use gw_memory::MemoryManager;
use gw_router::Router;
use uuid::Uuid;

use crate::coalesce::Coalescer;
use crate::pacer::PacerRegistry;

pub struct GatewayContext {
    pub config: AppConfig,
    pub cache: ResponseCache,
    pub coalescer: Arc<Coalescer>,
    pub pacers: PacerRegistry,
    pub router: Router,
    pub memory: MemoryManager,
    pub adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    pub key_ring: ProviderKeyRing,
    pub org_registry: Arc<dyn OrgRegistry>,
    thread_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl GatewayContext {
    pub fn new(
        config: AppConfig,
        memory: MemoryManager,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
        key_ring: ProviderKeyRing,
        org_registry: Arc<dyn OrgRegistry>,
    ) -> Arc<Self> {
        let cache = ResponseCache::new(config.cache.max_entries);
        let pacer_defaults = config.clone();
        Arc::new(Self {
            pacers: PacerRegistry::new(move |provider| pacer_defaults.pacer_for_provider(provider)),
            config,
            cache,
            coalescer: Coalescer::new(),
            router: Router::default(),
            memory,
            adapters,
            key_ring,
            org_registry,
            thread_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn adapter(&self, provider: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider).cloned()
    }

    /// Credentials gate routing: the "apology" synthetic provider always
    /// has one since no real call is made for it.
    pub fn has_credential(&self, provider: &str) -> bool {
        provider == "apology" || self.key_ring.has_credential(provider)
    }

    /// Per-thread mutex, created on first use and kept for the life of the
    /// process — serialises bootstrap and persistence for one thread
    /// without blocking unrelated threads, per spec.md §5.
    pub fn thread_lock(&self, thread_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.thread_locks
            .lock()
            .unwrap()
            .entry(thread_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_config::org::InMemoryOrgRegistry;
    use gw_memory::{InMemoryFragmentStore, InMemoryThreadStore};

    fn test_context() -> Arc<GatewayContext> {
        let memory = MemoryManager::new(
            Arc::new(InMemoryThreadStore::new()),
            Arc::new(InMemoryFragmentStore::new()),
            AppConfig::default().memory,
        );
        let key = gw_config::crypto::EncryptionKey::derive("test").unwrap();
        GatewayContext::new(
            AppConfig::default(),
            memory,
            HashMap::new(),
            ProviderKeyRing::new(key),
            Arc::new(InMemoryOrgRegistry::new()),
        )
    }

    #[test]
    fn apology_always_has_a_credential() {
        let ctx = test_context();
        assert!(ctx.has_credential("apology"));
        assert!(!ctx.has_credential("ollama"));
    }

    #[tokio::test]
    async fn thread_lock_is_stable_across_calls() {
        let ctx = test_context();
        let id = Uuid::new_v4();
        let a = ctx.thread_lock(id);
        let b = ctx.thread_lock(id);
        assert!(Arc::ptr_eq(&a, &b));
    }
}

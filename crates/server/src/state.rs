//! The axum-facing application state: the shared `GatewayContext` plus the
//! in-flight request registry the cancel endpoint fires into.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gw_dispatch::GatewayContext;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct AppState {
    pub ctx: Arc<GatewayContext>,
    in_flight: Mutex<HashMap<(Uuid, Uuid), CancellationToken>>,
}

impl AppState {
    pub fn new(ctx: Arc<GatewayContext>) -> Arc<Self> {
        Arc::new(Self { ctx, in_flight: Mutex::new(HashMap::new()) })
    }

    /// Registers a fresh token for one streaming request. The handler holds
    /// the returned clone; this copy stays in the registry until the stream
    /// ends so the cancel endpoint can still find it.
    pub fn begin_request(&self, thread_id: Uuid, request_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        self.in_flight.lock().unwrap().insert((thread_id, request_id), token.clone());
        token
    }

    pub fn end_request(&self, thread_id: Uuid, request_id: Uuid) {
        self.in_flight.lock().unwrap().remove(&(thread_id, request_id));
    }

    /// Fires the token for a request if it is still in flight. Returns
    /// whether a match was found; the endpoint responds 204 either way per
    /// spec.md §6, so this is only used for logging.
    pub fn cancel_request(&self, thread_id: Uuid, request_id: Uuid) -> bool {
        match self.in_flight.lock().unwrap().get(&(thread_id, request_id)) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_config::crypto::{EncryptionKey, ProviderKeyRing};
    use gw_config::org::InMemoryOrgRegistry;
    use gw_config::AppConfig;
    use gw_memory::{InMemoryFragmentStore, InMemoryThreadStore, MemoryManager};

    fn test_state() -> Arc<AppState> {
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
        AppState::new(ctx)
    }

    #[test]
    fn cancel_before_registration_is_a_no_op() {
        let state = test_state();
        assert!(!state.cancel_request(Uuid::new_v4(), Uuid::new_v4()));
    }

    #[test]
    fn registered_token_fires_on_cancel() {
        let state = test_state();
        let thread_id = Uuid::new_v4();
        let request_id = Uuid::new_v4();
        let token = state.begin_request(thread_id, request_id);
        assert!(!token.is_cancelled());

        assert!(state.cancel_request(thread_id, request_id));
        assert!(token.is_cancelled());
    }

    #[test]
    fn ended_request_is_no_longer_cancellable() {
        let state = test_state();
        let thread_id = Uuid::new_v4();
        let request_id = Uuid::new_v4();
        let token = state.begin_request(thread_id, request_id);
        state.end_request(thread_id, request_id);

        assert!(!state.cancel_request(thread_id, request_id));
        assert!(!token.is_cancelled());
    }
}

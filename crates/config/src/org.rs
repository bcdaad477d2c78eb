//! Organisation-scoped settings: per-provider rate caps, token budgets, and
//! the memory-sharing policy gate referenced by `gw-memory`'s promotion
//! rules.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderRateCap {
    pub rps: f64,
    pub daily_token_budget: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgConfig {
    pub org_id: String,
    /// Gate for cross-thread fragment promotion to the shared tier. A
    /// request's explicit `scope: "shared"` flag still has to agree — see
    /// the Open Question resolution in DESIGN.md.
    pub allow_shared_memory: bool,
    pub rate_caps: HashMap<String, ProviderRateCap>,
    pub token_budget_remaining: u64,
}

impl OrgConfig {
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            allow_shared_memory: false,
            rate_caps: HashMap::new(),
            token_budget_remaining: 0,
        }
    }

    pub fn rate_cap_for(&self, provider: &str) -> Option<ProviderRateCap> {
        self.rate_caps.get(provider).copied()
    }
}

/// Organisations are created and managed externally to this gateway (spec.md
/// §3); the gateway only needs a read/write lookup, modelled as a trait so a
/// durable-store-backed implementation can replace the in-memory default
/// without touching callers.
pub trait OrgRegistry: Send + Sync {
    fn get(&self, org_id: &str) -> Option<OrgConfig>;
    fn upsert(&self, org: OrgConfig);
}

#[derive(Default)]
pub struct InMemoryOrgRegistry {
    orgs: RwLock<HashMap<String, OrgConfig>>,
}

impl InMemoryOrgRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrgRegistry for InMemoryOrgRegistry {
    fn get(&self, org_id: &str) -> Option<OrgConfig> {
        self.orgs.read().unwrap().get(org_id).cloned()
    }

    fn upsert(&self, org: OrgConfig) {
        self.orgs.write().unwrap().insert(org.org_id.clone(), org);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_round_trips() {
        let registry = InMemoryOrgRegistry::new();
        assert!(registry.get("acme").is_none());

        let mut org = OrgConfig::new("acme");
        org.allow_shared_memory = true;
        org.rate_caps.insert(
            "openrouter".to_string(),
            ProviderRateCap {
                rps: 10.0,
                daily_token_budget: 1_000_000,
            },
        );
        registry.upsert(org);

        let fetched = registry.get("acme").unwrap();
        assert!(fetched.allow_shared_memory);
        assert_eq!(fetched.rate_cap_for("openrouter").unwrap().rps, 10.0);
        assert!(fetched.rate_cap_for("ollama").is_none());
    }
}

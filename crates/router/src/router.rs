//! `route(intent, org_config, availability, recent_perf) → (pipeline, chain)`
//! — ties the default ladders to the circuit breaker and the caller's
//! credential predicate, and guarantees a non-empty chain.

use crate::chain::{apology_link, default_chain_for, ChainLink, Pipeline};
use crate::circuit::CircuitBreaker;
use crate::classify::Intent;

pub struct Router {
    circuit_breaker: CircuitBreaker,
}

impl Default for Router {
    fn default() -> Self {
        Self { circuit_breaker: CircuitBreaker::default() }
    }
}

impl Router {
    pub fn new(circuit_breaker: CircuitBreaker) -> Self {
        Self { circuit_breaker }
    }

    /// `has_credential` lets the caller answer "does this org have a
    /// working credential for this provider" without the router crate
    /// depending on `gw-config`'s encryption machinery.
    pub fn route(
        &self,
        intent: &Intent,
        confidence: f32,
        has_credential: impl Fn(&str) -> bool,
    ) -> (Pipeline, Vec<ChainLink>) {
        let (pipeline, chain) = default_chain_for(intent, confidence);
        let filtered: Vec<ChainLink> = chain
            .into_iter()
            .filter(|link| has_credential(&link.provider) && !self.circuit_breaker.is_open(&link.provider))
            .collect();

        if filtered.is_empty() {
            (Pipeline::DirectApology, vec![apology_link()])
        } else {
            (pipeline, filtered)
        }
    }

    pub fn record_success(&self, provider: &str) {
        self.circuit_breaker.record_success(provider);
    }

    pub fn record_failure(&self, provider: &str) {
        self.circuit_breaker.record_failure(provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;

    #[test]
    fn filters_providers_without_credentials() {
        let router = Router::default();
        let (intent, confidence) = classify("hi there", &[]);
        let (_, chain) = router.route(&intent, confidence, |provider| provider == "openrouter");
        assert!(chain.iter().all(|link| link.provider == "openrouter"));
    }

    #[test]
    fn falls_back_to_apology_when_everything_filtered_out() {
        let router = Router::default();
        let (intent, confidence) = classify("hi there", &[]);
        let (pipeline, chain) = router.route(&intent, confidence, |_| false);
        assert_eq!(pipeline, Pipeline::DirectApology);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].provider, "apology");
    }

    #[test]
    fn circuit_broken_provider_is_skipped() {
        let router = Router::default();
        for _ in 0..5 {
            router.record_failure("ollama");
        }
        let (intent, confidence) = classify("hi there", &[]);
        let (_, chain) = router.route(&intent, confidence, |_| true);
        assert!(chain.iter().all(|link| link.provider != "ollama"));
    }
}

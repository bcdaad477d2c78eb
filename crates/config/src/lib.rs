//! Gateway-wide configuration: environment/TOML settings, per-organisation
//! provider credentials, and the pacer/timeout/cache defaults the rest of
//! the workspace reads at startup.

pub mod crypto;
pub mod org;

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Streaming pipeline rollout flag plus the two independent toggles
/// described in spec.md §6 ("Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// `DAC_SSE_V2` — enables the streaming pipeline.
    pub enabled: bool,
    /// `COALESCE_ENABLED` — independent toggle for the Coalescer.
    pub coalesce_enabled: bool,
    /// `STREAM_FANOUT_ENABLED` — independent toggle for broadcast fan-out.
    pub stream_fanout_enabled: bool,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            coalesce_enabled: true,
            stream_fanout_enabled: true,
        }
    }
}

/// Defaults applied to a provider's token bucket unless overridden by
/// `<PROVIDER>_RPS` / `<PROVIDER>_CONCURRENCY` / `<PROVIDER>_BURST`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerDefaults {
    pub rps: f64,
    pub concurrency: usize,
    pub burst: f64,
    /// AIMD multiplicative penalty factor applied on a provider rate-limit.
    pub penalty_alpha: f64,
    /// AIMD linear recovery step (rate units per second).
    pub recovery_delta: f64,
    pub min_rps: f64,
}

impl Default for PacerDefaults {
    fn default() -> Self {
        Self {
            rps: 5.0,
            concurrency: 8,
            burst: 10.0,
            penalty_alpha: 0.5,
            recovery_delta: 0.25,
            min_rps: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub per_attempt_secs: u64,
    pub total_request_secs: u64,
    pub cancellation_budget_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            per_attempt_secs: 15,
            total_request_secs: 45,
            cancellation_budget_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
    /// Per-intent TTL overrides (coding_help tends to live longer than
    /// qa_retrieval, per spec.md §4.5).
    pub coding_help_ttl_secs: u64,
    pub qa_retrieval_ttl_secs: u64,
    pub max_entries: usize,
    pub negative_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 3600,
            coding_help_ttl_secs: 6 * 3600,
            qa_retrieval_ttl_secs: 15 * 60,
            max_entries: 10_000,
            negative_ttl_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BackendUrls {
    pub database_url: String,
    pub vector_store_url: String,
    pub cache_backend_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Non-system turns retained per thread before summarisation triggers.
    pub max_turns: usize,
    /// Turns condensed into `summary` when `max_turns` is exceeded.
    pub summarise_batch: usize,
    /// Fraction of a model's context window the assembled prompt may use.
    pub prompt_token_cap_fraction: f64,
    /// Cross-thread fragment candidates considered per retrieval.
    pub fragment_top_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            summarise_batch: 6,
            prompt_token_cap_fraction: 0.70,
            fragment_top_k: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub sse: SseConfig,
    pub pacer: PacerDefaults,
    pub timeouts: TimeoutConfig,
    pub cache: CacheConfig,
    pub memory: MemoryConfig,
    pub backends: BackendUrls,
}

impl AppConfig {
    /// Load from a TOML file if present, falling back to defaults, then
    /// apply environment variable overrides the way `aigent-config` layers
    /// `OLLAMA_BASE_URL` on top of the file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("DAC_SSE_V2") {
            self.sse.enabled = parse_bool(&v, self.sse.enabled);
        }
        if let Ok(v) = env::var("COALESCE_ENABLED") {
            self.sse.coalesce_enabled = parse_bool(&v, self.sse.coalesce_enabled);
        }
        if let Ok(v) = env::var("STREAM_FANOUT_ENABLED") {
            self.sse.stream_fanout_enabled = parse_bool(&v, self.sse.stream_fanout_enabled);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.backends.database_url = v;
        }
        if let Ok(v) = env::var("VECTOR_STORE_URL") {
            self.backends.vector_store_url = v;
        }
        if let Ok(v) = env::var("CACHE_BACKEND_URL") {
            self.backends.cache_backend_url = v;
        }
    }

    /// Per-provider pacer overrides: `<PROVIDER>_RPS`, `<PROVIDER>_CONCURRENCY`,
    /// `<PROVIDER>_BURST`. `provider` is upper-cased to build the env var name.
    pub fn pacer_for_provider(&self, provider: &str) -> PacerDefaults {
        let prefix = provider.to_uppercase();
        let mut cfg = self.pacer;
        if let Some(v) = env::var(format!("{prefix}_RPS")).ok().and_then(|s| s.parse().ok()) {
            cfg.rps = v;
        }
        if let Some(v) = env::var(format!("{prefix}_CONCURRENCY")).ok().and_then(|s| s.parse().ok()) {
            cfg.concurrency = v;
        }
        if let Some(v) = env::var(format!("{prefix}_BURST")).ok().and_then(|s| s.parse().ok()) {
            cfg.burst = v;
        }
        cfg
    }

    /// Intent-sensitive cache TTL, per spec.md §4.5.
    pub fn cache_ttl_for_intent(&self, intent: &str) -> std::time::Duration {
        let secs = if intent.starts_with("coding_help") {
            self.cache.coding_help_ttl_secs
        } else if intent.starts_with("qa_retrieval") {
            self.cache.qa_retrieval_ttl_secs
        } else {
            self.cache.default_ttl_secs
        };
        std::time::Duration::from_secs(secs)
    }
}

fn parse_bool(raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => true,
        "0" | "false" | "off" | "no" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert!(cfg.sse.enabled);
        assert!(cfg.pacer.rps > 0.0);
        assert!(cfg.memory.prompt_token_cap_fraction < 1.0);
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let cfg = AppConfig::load_from("/nonexistent/path/default.toml").unwrap();
        assert_eq!(cfg.cache.default_ttl_secs, 3600);
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        let cfg = AppConfig::default();
        cfg.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.cache.max_entries, cfg.cache.max_entries);
    }

    #[test]
    fn cache_ttl_is_intent_sensitive() {
        let cfg = AppConfig::default();
        assert!(cfg.cache_ttl_for_intent("coding_help") > cfg.cache_ttl_for_intent("qa_retrieval"));
        assert_eq!(cfg.cache_ttl_for_intent("social_chat").as_secs(), cfg.cache.default_ttl_secs);
    }
}

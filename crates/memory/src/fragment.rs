//! Cross-thread memory fragments: storage, similarity retrieval, and the
//! gate that decides whether a fragment may be promoted to the shared tier.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::schema::{FragmentTier, MemoryError, MemoryFragment};

#[async_trait]
pub trait FragmentPersistence: Send + Sync {
    async fn insert(&self, fragment: MemoryFragment) -> Result<(), MemoryError>;
    async fn candidates(&self, org_id: &str, tier: FragmentTier) -> Result<Vec<MemoryFragment>, MemoryError>;
}

#[derive(Default)]
pub struct InMemoryFragmentStore {
    fragments: Mutex<Vec<MemoryFragment>>,
}

impl InMemoryFragmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FragmentPersistence for InMemoryFragmentStore {
    async fn insert(&self, fragment: MemoryFragment) -> Result<(), MemoryError> {
        self.fragments.lock().unwrap().push(fragment);
        Ok(())
    }

    async fn candidates(&self, org_id: &str, tier: FragmentTier) -> Result<Vec<MemoryFragment>, MemoryError> {
        Ok(self
            .fragments
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.org_id == org_id && f.tier == tier)
            .cloned()
            .collect())
    }
}

/// Promotion to the shared tier requires the request's explicit
/// `scope: "shared"` flag, the organisation's `allow_shared_memory` policy,
/// *and* PII redaction — any one missing keeps the fragment private. See
/// the Open Question resolution recorded in DESIGN.md.
pub fn eligible_for_shared_tier(requested_shared_scope: bool, org_allows_shared_memory: bool, pii_redacted: bool) -> bool {
    requested_shared_scope && org_allows_shared_memory && pii_redacted
}

/// Cosine similarity over dense embeddings, used to rank fragment
/// candidates against a query embedding. Returns 0.0 for mismatched or
/// empty vectors rather than panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rank candidates by similarity to `query_embedding` and return the top
/// `k`, highest first.
pub fn rank_by_similarity(candidates: Vec<MemoryFragment>, query_embedding: &[f32], k: usize) -> Vec<MemoryFragment> {
    let mut scored: Vec<(f32, MemoryFragment)> = candidates
        .into_iter()
        .map(|fragment| {
            let score = fragment
                .embedding
                .as_deref()
                .map(|emb| cosine_similarity(emb, query_embedding))
                .unwrap_or(0.0);
            (score, fragment)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(k).map(|(_, f)| f).collect()
}

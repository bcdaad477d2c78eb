//! Orchestrates the thread store, fragment store, and context builder
//! behind a single entry point `GatewayContext` calls into.

use std::sync::Arc;

use gw_config::MemoryConfig;
use tracing::instrument;
use uuid::Uuid;

use crate::extract::extract_self_assertions;
use crate::fragment::{eligible_for_shared_tier, rank_by_similarity, FragmentPersistence};
use crate::retrieval::context_for_prompt;
use crate::schema::{FragmentTier, MemoryError, MemoryFragment, Thread, Turn};
use crate::store::ThreadPersistence;
use crate::tokens::truncate_to_budget;

/// Fixed character budget for the deterministic head/tail summarisation
/// fallback used when no summarisation model is reachable.
const DEGRADED_SUMMARY_CHAR_BUDGET: usize = 600;

pub struct MemoryManager {
    threads: Arc<dyn ThreadPersistence>,
    fragments: Arc<dyn FragmentPersistence>,
    config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(
        threads: Arc<dyn ThreadPersistence>,
        fragments: Arc<dyn FragmentPersistence>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            threads,
            fragments,
            config,
        }
    }

    #[instrument(skip(self), fields(thread_id = %thread_id))]
    pub async fn get_or_create_thread(&self, thread_id: Uuid, org_id: &str) -> Result<Thread, MemoryError> {
        if let Some(thread) = self.threads.load(thread_id).await? {
            return Ok(thread);
        }
        let mut thread = Thread::new(org_id);
        thread.id = thread_id;
        self.threads.save(&thread).await?;
        Ok(thread)
    }

    /// Appends a turn, runs the summarisation trigger, and persists the
    /// thread. Summarisation is turn-count based: once the non-system turn
    /// count exceeds `max_turns`, the oldest `summarise_batch` turns are
    /// condensed.
    #[instrument(skip(self, thread, turn), fields(thread_id = %thread.id))]
    pub async fn record_turn(&self, thread: &mut Thread, turn: Turn) -> Result<(), MemoryError> {
        thread.turns.push(turn);
        self.maybe_summarise(thread);
        thread.updated_at = chrono::Utc::now();
        self.threads.save(thread).await
    }

    fn maybe_summarise(&self, thread: &mut Thread) {
        if thread.non_system_turn_count() <= self.config.max_turns {
            return;
        }
        let batch: Vec<Turn> = thread
            .turns
            .drain(0..self.config.summarise_batch.min(thread.turns.len()))
            .collect();
        let condensed = degraded_summarise(&batch);
        thread.summary = Some(match thread.summary.take() {
            Some(existing) => truncate_to_budget(
                &format!("{existing}\n{condensed}"),
                DEGRADED_SUMMARY_CHAR_BUDGET / 4,
            ),
            None => condensed,
        });
    }

    pub fn build_context(&self, thread: &Thread, fragments: &[MemoryFragment], window_tokens: usize) -> String {
        context_for_prompt(thread, fragments, window_tokens, self.config.prompt_token_cap_fraction)
    }

    /// Extracts first-person self-assertions from `content` and appends any
    /// new ones to `thread.profile_facts`, deduplicating against what's
    /// already recorded. Returns the facts that were newly added, for the
    /// caller to persist as provenanced memory fragments.
    pub fn record_self_assertions(&self, thread: &mut Thread, content: &str) -> Vec<String> {
        let mut added = Vec::new();
        for fact in extract_self_assertions(content) {
            if !thread.profile_facts.contains(&fact) {
                thread.profile_facts.push(fact.clone());
                added.push(fact);
            }
        }
        added
    }

    /// Retrieves the top-k candidate fragments for a retrieval against
    /// `query_embedding`: the requesting organisation's private-tier
    /// fragments are the primary candidate set (§4.6), with shared-tier
    /// fragments added only when `org_allows_shared_memory` is true.
    /// Fragments whose provenance thread is `requesting_thread_id` are
    /// excluded — that thread's own turns are already in `turns[]`.
    pub async fn retrieve_fragments(
        &self,
        org_id: &str,
        requesting_thread_id: Uuid,
        query_embedding: &[f32],
        org_allows_shared_memory: bool,
    ) -> Result<Vec<MemoryFragment>, MemoryError> {
        let mut candidates: Vec<MemoryFragment> = self
            .fragments
            .candidates(org_id, FragmentTier::Private)
            .await?
            .into_iter()
            .filter(|f| f.origin_thread_id != requesting_thread_id)
            .collect();

        if org_allows_shared_memory {
            let shared = self.fragments.candidates(org_id, FragmentTier::Shared).await?;
            candidates.extend(shared.into_iter().filter(|f| f.origin_thread_id != requesting_thread_id));
        }

        Ok(rank_by_similarity(candidates, query_embedding, self.config.fragment_top_k))
    }

    /// Records a fragment, promoting it to the shared tier only if all
    /// three gates in `eligible_for_shared_tier` hold; otherwise it is kept
    /// private to the originating thread.
    pub async fn record_fragment(
        &self,
        mut fragment: MemoryFragment,
        requested_shared_scope: bool,
        org_allows_shared_memory: bool,
        pii_redacted: bool,
    ) -> Result<(), MemoryError> {
        fragment.tier = if eligible_for_shared_tier(requested_shared_scope, org_allows_shared_memory, pii_redacted) {
            FragmentTier::Shared
        } else {
            FragmentTier::Private
        };
        self.fragments.insert(fragment).await
    }
}

/// Deterministic head/tail concatenation used when no summarisation model
/// is reachable, per the turn-count-trigger resolution: keep the gist of
/// the earliest and latest turns in the condensed batch rather than
/// dropping the batch entirely.
fn degraded_summarise(batch: &[Turn]) -> String {
    if batch.is_empty() {
        return String::new();
    }
    let first = &batch[0];
    let last = batch.last().unwrap();
    let joined = format!(
        "{:?}: {} ... {:?}: {}",
        first.role, first.content, last.role, last.content
    );
    truncate_to_budget(&joined, DEGRADED_SUMMARY_CHAR_BUDGET / 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::InMemoryFragmentStore;
    use crate::schema::Role;
    use crate::store::InMemoryThreadStore;

    fn manager() -> MemoryManager {
        MemoryManager::new(
            Arc::new(InMemoryThreadStore::new()),
            Arc::new(InMemoryFragmentStore::new()),
            MemoryConfig {
                max_turns: 4,
                summarise_batch: 2,
                prompt_token_cap_fraction: 0.70,
                fragment_top_k: 4,
            },
        )
    }

    #[tokio::test]
    async fn summarisation_triggers_on_turn_count() {
        let manager = manager();
        let mut thread = Thread::new("acme");
        for i in 0..6 {
            manager
                .record_turn(&mut thread, Turn::new(Role::User, format!("turn {i}")))
                .await
                .unwrap();
        }
        assert!(thread.summary.is_some());
        assert!(thread.non_system_turn_count() <= 4);
    }

    #[tokio::test]
    async fn private_fragment_without_all_three_gates_is_still_retrievable_from_another_thread() {
        let manager = manager();
        let origin_thread = Uuid::new_v4();
        let fragment = MemoryFragment::new("acme", origin_thread, "likes rust", "ollama", "llama3");
        manager
            .record_fragment(fragment, true, false, true)
            .await
            .unwrap();

        // A different thread in the same org still recalls the private fragment...
        let candidates = manager.retrieve_fragments("acme", Uuid::new_v4(), &[], false).await.unwrap();
        assert_eq!(candidates.len(), 1);

        // ...but the thread that produced it does not, since it's already in `turns[]`.
        let from_origin = manager.retrieve_fragments("acme", origin_thread, &[], false).await.unwrap();
        assert!(from_origin.is_empty());
    }

    #[tokio::test]
    async fn fragment_promotes_to_shared_when_all_gates_hold() {
        let manager = manager();
        let origin_thread = Uuid::new_v4();
        let fragment = MemoryFragment::new("acme", origin_thread, "likes rust", "ollama", "llama3");
        manager
            .record_fragment(fragment, true, true, true)
            .await
            .unwrap();

        let candidates = manager.retrieve_fragments("acme", Uuid::new_v4(), &[], true).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tier, FragmentTier::Shared);
    }

    #[tokio::test]
    async fn shared_fragment_is_excluded_unless_org_allows_shared_memory() {
        let manager = manager();
        let origin_thread = Uuid::new_v4();
        let fragment = MemoryFragment::new("acme", origin_thread, "likes rust", "ollama", "llama3");
        manager
            .record_fragment(fragment, true, true, true)
            .await
            .unwrap();

        let candidates = manager.retrieve_fragments("acme", Uuid::new_v4(), &[], false).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn record_self_assertions_deduplicates_against_existing_profile_facts() {
        let manager = manager();
        let mut thread = Thread::new("acme");

        let added = manager.record_self_assertions(&mut thread, "my name is Alex");
        assert_eq!(added, vec!["name is Alex".to_string()]);
        assert_eq!(thread.profile_facts, vec!["name is Alex".to_string()]);

        let added_again = manager.record_self_assertions(&mut thread, "my name is Alex");
        assert!(added_again.is_empty());
        assert_eq!(thread.profile_facts.len(), 1);
    }
}

//! The seam every provider plugs into: a non-streaming `call` and a
//! streaming `stream`, both keyed by an explicit model id so the Router
//! decides provider+model together.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::types::{ChatCompletion, ChatMessage};

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Short identifier used in logs, the cache key, and the pacer's
    /// per-provider token bucket ("ollama", "openrouter", ...).
    fn name(&self) -> &str;

    async fn call(&self, messages: &[ChatMessage], model: &str) -> Result<ChatCompletion, ProviderError>;

    /// Streams `Chunk`s on an mpsc channel. The receiver end is handed to
    /// the Coalescer, which fans it out to every waiting subscriber.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<mpsc::Receiver<Result<Chunk, ProviderError>>, ProviderError>;
}

//! A minimal search provider so the `qa_retrieval:web_multisearch` pipeline
//! has a concrete (search, synthesiser) pair to route to. Not a general
//! chat provider: `call`/`stream` both synthesise a single-turn summary of
//! the search results rather than holding a conversation.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::adapter::ProviderAdapter;
use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::types::{ChatCompletion, ChatMessage};

#[derive(Debug, Clone)]
pub struct WebSearchAdapter {
    client: reqwest::Client,
    search_base_url: String,
}

impl WebSearchAdapter {
    pub fn new(search_base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), search_base_url: search_base_url.into() }
    }

    fn last_user_query(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .rev()
            .find_map(|m| m.content.clone())
            .unwrap_or_default()
    }

    async fn search(&self, query: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(&self.search_base_url)
            .query(&[("q", query)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::transient(format!("web search returned {}", response.status())));
        }
        let body: serde_json::Value = response.json().await.map_err(ProviderError::from)?;
        let results = body
            .get("results")
            .and_then(|r| r.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("snippet").and_then(|s| s.as_str()))
                    .take(5)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        Ok(results)
    }
}

#[async_trait]
impl ProviderAdapter for WebSearchAdapter {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn call(&self, messages: &[ChatMessage], _model: &str) -> Result<ChatCompletion, ProviderError> {
        let query = Self::last_user_query(messages);
        let content = self.search(&query).await?;
        Ok(ChatCompletion {
            content,
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: None,
        })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        _model: &str,
    ) -> Result<mpsc::Receiver<Result<Chunk, ProviderError>>, ProviderError> {
        let query = Self::last_user_query(messages);
        let content = self.search(&query).await?;
        let (tx, rx) = mpsc::channel(4);
        let _ = tx
            .send(Ok(Chunk::Meta { provider: "web_search".to_string(), model: "multisearch".to_string() }))
            .await;
        let _ = tx.send(Ok(Chunk::Delta { text: content })).await;
        let _ = tx.send(Ok(Chunk::Done)).await;
        Ok(rx)
    }
}

//! Local Ollama provider: `/api/chat` with `stream: true|false`, NDJSON
//! framing (one JSON object per line, no `data:` prefix).

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::instrument;

use crate::adapter::ProviderAdapter;
use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::types::{ChatCompletion, ChatMessage, ChatRole, Usage};

#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    fn encode(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                json!({
                    "role": role_str(&m.role),
                    "content": m.content.clone().unwrap_or_default(),
                })
            })
            .collect()
    }
}

fn role_str(role: &ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, messages), fields(provider = "ollama", model = %model))]
    async fn call(&self, messages: &[ChatMessage], model: &str) -> Result<ChatCompletion, ProviderError> {
        let body = json!({
            "model": model,
            "messages": Self::encode(messages),
            "stream": false,
        });
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::transient(format!("ollama returned {}", response.status())));
        }
        let body: serde_json::Value = response.json().await.map_err(ProviderError::from)?;
        let content = body
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(ChatCompletion {
            content,
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: None,
        })
    }

    #[instrument(skip(self, messages), fields(provider = "ollama", model = %model))]
    async fn stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<mpsc::Receiver<Result<Chunk, ProviderError>>, ProviderError> {
        let body = json!({
            "model": model,
            "messages": Self::encode(messages),
            "stream": true,
        });
        let mut response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::transient(format!("ollama returned {}", response.status())));
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let _ = tx.send(Ok(Chunk::Meta { provider: "ollama".to_string(), model: model_owned(&body) })).await;
            let mut buffer = String::new();
            loop {
                let next = response.chunk().await;
                let bytes = match next {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.send(Err(ProviderError::from(err))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }
                    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&line) else {
                        continue;
                    };
                    if let Some(text) = parsed.get("message").and_then(|m| m.get("content")).and_then(|c| c.as_str()) {
                        if !text.is_empty() && tx.send(Ok(Chunk::Delta { text: text.to_string() })).await.is_err() {
                            return;
                        }
                    }
                    if parsed.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
                        let prompt_tokens = parsed.get("prompt_eval_count").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                        let completion_tokens = parsed.get("eval_count").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                        let _ = tx.send(Ok(Chunk::Usage(Usage { prompt_tokens, completion_tokens }))).await;
                        let _ = tx.send(Ok(Chunk::Done)).await;
                        return;
                    }
                }
            }
            let _ = tx.send(Ok(Chunk::Done)).await;
        });
        Ok(rx)
    }
}

fn model_owned(body: &serde_json::Value) -> String {
    body.get("model").and_then(|m| m.as_str()).unwrap_or_default().to_string()
}

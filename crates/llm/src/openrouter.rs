//! OpenRouter / OpenAI-compatible provider: `/chat/completions` with
//! `stream: true|false`, SSE framing (`data: {...}\n\n`, terminated by
//! `data: [DONE]`).

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::instrument;

use crate::adapter::ProviderAdapter;
use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::types::{ChatCompletion, ChatMessage, ChatRole, Usage};

const API_BASE: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone)]
pub struct OpenRouterAdapter {
    client: reqwest::Client,
    api_key: String,
}

impl OpenRouterAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into() }
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
impl ProviderAdapter for OpenRouterAdapter {
    fn name(&self) -> &str {
        "openrouter"
    }

    #[instrument(skip(self, messages), fields(provider = "openrouter", model = %model))]
    async fn call(&self, messages: &[ChatMessage], model: &str) -> Result<ChatCompletion, ProviderError> {
        let body = json!({
            "model": model,
            "messages": Self::encode(messages),
            "stream": false,
        });
        let response = self
            .client
            .post(format!("{API_BASE}/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }
        let body: serde_json::Value = response.json().await.map_err(ProviderError::from)?;
        let choice = body.get("choices").and_then(|c| c.get(0));
        let content = choice
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        let finish_reason = choice
            .and_then(|c| c.get("finish_reason"))
            .and_then(|f| f.as_str())
            .unwrap_or("stop")
            .to_string();
        let usage = body.get("usage").map(|u| Usage {
            prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            completion_tokens: u.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        });
        Ok(ChatCompletion { content, tool_calls: Vec::new(), finish_reason, usage })
    }

    #[instrument(skip(self, messages), fields(provider = "openrouter", model = %model))]
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
        let model_label = model.to_string();
        let mut response = self
            .client
            .post(format!("{API_BASE}/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let _ = tx.send(Ok(Chunk::Meta { provider: "openrouter".to_string(), model: model_label })).await;
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
                    if line.is_empty() || line == "data: [DONE]" {
                        continue;
                    }
                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data) else {
                        continue;
                    };
                    let delta = parsed.get("choices").and_then(|c| c.get(0)).and_then(|c| c.get("delta"));
                    if let Some(text) = delta.and_then(|d| d.get("content")).and_then(|c| c.as_str()) {
                        if !text.is_empty() && tx.send(Ok(Chunk::Delta { text: text.to_string() })).await.is_err() {
                            return;
                        }
                    }
                    if let Some(usage) = parsed.get("usage") {
                        let prompt_tokens = usage.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                        let completion_tokens = usage.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                        let _ = tx.send(Ok(Chunk::Usage(Usage { prompt_tokens, completion_tokens }))).await;
                    }
                }
            }
            let _ = tx.send(Ok(Chunk::Done)).await;
        });
        Ok(rx)
    }
}

fn classify_status(status: reqwest::StatusCode) -> ProviderError {
    if status.as_u16() == 429 || status.is_server_error() {
        ProviderError::transient(format!("openrouter returned {status}"))
    } else if status.as_u16() == 400 {
        ProviderError::permanent_for_attempt(format!("openrouter returned {status}"))
    } else {
        ProviderError::permanent_for_attempt(format!("openrouter returned {status}"))
    }
}

//! Provider adapter abstraction: the `Chunk` wire type, the
//! `ProviderAdapter` trait every backend implements, and the reference
//! adapters (`OllamaAdapter`, `OpenRouterAdapter`, `WebSearchAdapter`).

pub mod adapter;
pub mod chunk;
pub mod error;
pub mod ollama;
pub mod openrouter;
pub mod types;
pub mod websearch;

pub use adapter::ProviderAdapter;
pub use chunk::Chunk;
pub use error::{ProviderError, ProviderErrorKind};
pub use ollama::OllamaAdapter;
pub use openrouter::OpenRouterAdapter;
pub use types::{ChatCompletion, ChatMessage, ChatRole, ToolCall, ToolCallFunction, Usage};
pub use websearch::WebSearchAdapter;

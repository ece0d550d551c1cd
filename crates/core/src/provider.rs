//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a prompt to an LLM and get the raw reply
//! back. It makes no promise about the *shape* of that reply: turning it
//! into a structured result is the normalizer's job.
//!
//! Implementations: OpenAI-compatible endpoints (OpenAI, Gemini).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini", "gemini-1.5-flash")
    pub model: String,

    /// The prompt messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Ask the backend to constrain output to a JSON object
    #[serde(default)]
    pub json_mode: bool,
}

fn default_temperature() -> f32 {
    0.2
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The extractor calls `complete()` without knowing which backend is
/// configured. Any `Err` returned here is an invocation failure and is
/// reported to the caller as such.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "gemini").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

//! Provider trait, the abstraction over language-model backends.
//!
//! A Provider knows how to send a short exchange to a model and get a
//! completion back. The answer selector treats it as an opaque collaborator:
//! prompt construction happens on the caller's side, and every failure is
//! reported as a [`ModelError`].
//!
//! Implementations: OpenAI-compatible endpoints (Ollama, OpenRouter, OpenAI,
//! vLLM, llama.cpp).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::message::Message;

/// Metadata key a provider may set to report its own confidence in `[0, 1]`.
pub const CONFIDENCE_METADATA_KEY: &str = "confidence";

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "llama3.2:1b", "gpt-4o-mini")
    pub model: String,

    /// The exchange messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
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

    /// Provider-specific metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ProviderResponse {
    /// The model's self-reported confidence, if it supplied one.
    ///
    /// Values outside `[0, 1]` or non-numeric values are ignored.
    pub fn reported_confidence(&self) -> Option<f32> {
        self.metadata
            .get(CONFIDENCE_METADATA_KEY)
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
            .filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }
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
/// Every model backend implements this trait. The selector calls `complete()`
/// under its own timeout and never retries.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama", "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ModelError>;

    /// List available models for this provider.
    async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        Ok(Vec::new())
    }

    /// Whether the provider is reachable.
    async fn health_check(&self) -> Result<bool, ModelError> {
        Ok(true)
    }
}

//! Generation wrapper around one bounded-time call to the language model.
//!
//! A single attempt per call: no retries, so worst-case latency is the
//! configured timeout.

use answerdesk_core::error::ModelError;
use answerdesk_core::message::Message;
use answerdesk_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Text produced by the model, plus the confidence it reported, if any.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub reported_confidence: Option<f32>,
}

pub struct Generator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl Generator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: Some(512),
            timeout: Duration::from_secs(20),
        }
    }

    /// Apply the configured temperature, token limit and timeout.
    pub fn from_config(
        config: &answerdesk_config::AppConfig,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Self {
        Self::new(provider, model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_timeout(Duration::from_secs(config.selector.model_timeout_secs))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the exchange and wait at most the configured timeout.
    pub async fn generate(&self, messages: Vec<Message>) -> Result<Generation, ModelError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: vec![],
        };

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            timeout_secs = self.timeout.as_secs_f64(),
            "Requesting generation"
        );

        let completion = self.provider.complete(request);
        let response = match tokio::time::timeout(self.timeout, completion).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    provider = %self.provider.name(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Generation timed out"
                );
                return Err(ModelError::Timeout(format!(
                    "Provider '{}' timed out after {:.1}s",
                    self.provider.name(),
                    self.timeout.as_secs_f64()
                )));
            }
        };

        let text = response.message.content.trim().to_string();
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        Ok(Generation {
            reported_confidence: response.reported_confidence(),
            text,
        })
    }

    /// Whether the provider is reachable.
    pub async fn health_check(&self) -> Result<bool, ModelError> {
        match tokio::time::timeout(self.timeout, self.provider.health_check()).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout("health check timed out".into())),
        }
    }

    /// Whether the provider lists the configured model, or `None` when it
    /// publishes no model list.
    pub async fn model_available(&self) -> Result<Option<bool>, ModelError> {
        let models = match tokio::time::timeout(self.timeout, self.provider.list_models()).await {
            Ok(result) => result?,
            Err(_) => return Err(ModelError::Timeout("model listing timed out".into())),
        };
        if models.is_empty() {
            return Ok(None);
        }
        Ok(Some(models.iter().any(|m| m == &self.model)))
    }
}

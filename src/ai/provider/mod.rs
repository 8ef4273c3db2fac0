//! Generation Provider Abstraction
//!
//! Defines the LlmProvider trait: one prompt in, one block of generated text
//! out. Temperature, output length and model are fixed at construction time.
//!
//! ## Modules
//!
//! - `gemini`: Google Generative Language API
//! - `openai`: OpenAI-compatible Chat Completions API
//! - `chain`: Model fallback chain

mod chain;
mod gemini;
mod openai;

pub use chain::ProviderChain;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::types::{ReportError, Result};

// =============================================================================
// LLM Response with Usage Metrics
// =============================================================================

/// Generated text with usage and timing
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text, trimmed
    pub text: String,
    pub usage: TokenUsage,
    pub timing: ResponseTiming,
    /// Provider and model info
    pub metadata: ResponseMetadata,
}

impl LlmResponse {
    /// Create response with text only (usage unknown)
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
            timing: ResponseTiming::default(),
            metadata: ResponseMetadata::default(),
        }
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Wall-clock time of the provider call in milliseconds
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    pub model: String,
    pub provider: String,
}

/// Shared provider for concurrent access across pipeline stages
pub type SharedProvider = Arc<dyn LlmProvider>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Construction-time settings for one provider instance
///
/// API keys are never serialized and are redacted in debug output. Each
/// provider converts the key to a SecretString internally.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "gemini", "openai"
    pub provider: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl From<&LlmConfig> for ProviderConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

impl ProviderConfig {
    /// Same settings targeting a different model
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text for a prompt
    ///
    /// Fails with `ReportError::Generation` on backend or network failure.
    async fn generate(&self, prompt: &str) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;
}

fn build_single(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config.clone())?)),
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
        _ => Err(ReportError::Config(format!(
            "Unknown provider: {}. Supported: gemini, openai",
            config.provider
        ))),
    }
}

/// Create a shared provider from configuration
///
/// With fallback models configured the result is a `ProviderChain` that tries
/// the primary model first.
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    let primary_config = ProviderConfig::from(config);
    let primary = build_single(&primary_config)?;

    if config.fallback_models.is_empty() {
        return Ok(primary);
    }

    let mut chain = ProviderChain::new().add(primary);
    for model in &config.fallback_models {
        if model == &config.model {
            continue;
        }
        chain = chain.add(build_single(&primary_config.with_model(model))?);
    }
    Ok(Arc::new(chain))
}

//! Model Fallback Chain
//!
//! Tries each provider in order and returns the first success. Providers are
//! typically the same backend configured with successively more capable or
//! older models.
//!
//! ## Strategy
//!
//! 1. Call the next provider
//! 2. On failure, classify and log the error, then move on
//! 3. When every provider has failed, return the last error
//!
//! Retrying a single provider is the retry policy's job, which wraps the
//! whole chain.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::{LlmProvider, LlmResponse, SharedProvider};
use crate::types::{ReportError, Result};

/// Ordered list of providers tried until one succeeds
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<SharedProvider>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider to the end of the chain
    pub fn add(mut self, provider: SharedProvider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl LlmProvider for ProviderChain {
    #[instrument(skip(self, prompt), fields(providers = self.providers.len()))]
    async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        let mut last_error: Option<ReportError> = None;

        for (index, provider) in self.providers.iter().enumerate() {
            debug!(
                provider = provider.name(),
                model = provider.model(),
                position = index,
                "Chain attempt"
            );

            match provider.generate(prompt).await {
                Ok(response) => {
                    if index > 0 {
                        info!(model = provider.model(), "Fallback model succeeded");
                    }
                    return Ok(response);
                }
                Err(err) => {
                    let category = err
                        .category()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "UNKNOWN".to_string());
                    warn!(
                        model = provider.model(),
                        category = %category,
                        error = %err,
                        "Model failed, trying next"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ReportError::Config("No providers configured in chain".to_string())
        }))
    }

    fn name(&self) -> &str {
        "chain"
    }

    fn model(&self) -> &str {
        self.providers.first().map(|p| p.model()).unwrap_or("")
    }

    async fn health_check(&self) -> Result<bool> {
        for provider in &self.providers {
            if provider.health_check().await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

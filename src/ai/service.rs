//! Generation Service
//!
//! The single call site for generative text. Each call goes:
//!
//! ```text
//! cache lookup ─hit──────────────────────────────────────▶ text
//!      │ miss
//!      ▼
//! retry policy ─▶ timeout ─▶ provider ─▶ cache store ─▶ text
//! ```
//!
//! A cache hit short-circuits the retry loop entirely. Cache read or write
//! failures degrade to an uncached call rather than failing the generation.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::metrics::SharedMetrics;
use super::provider::SharedProvider;
use super::retry::RetryPolicy;
use super::timeout::with_timeout;
use crate::cache::SharedCache;
use crate::types::Result;

pub struct GenerationService {
    provider: SharedProvider,
    cache: Option<SharedCache>,
    retry: RetryPolicy,
    metrics: SharedMetrics,
    cache_ttl: Option<Duration>,
    timeout: Duration,
}

impl GenerationService {
    pub fn new(
        provider: SharedProvider,
        retry: RetryPolicy,
        metrics: SharedMetrics,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache: None,
            retry,
            metrics,
            cache_ttl: None,
            timeout,
        }
    }

    /// Route calls through a cache, storing new entries with `ttl` (or the cache default)
    pub fn with_cache(mut self, cache: SharedCache, ttl: Option<Duration>) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Generate text for a prompt. The prompt itself is the cache key.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        if let Some(cache) = &self.cache {
            match cache.get_as::<String>(prompt).await {
                Ok(Some(text)) => {
                    self.metrics.record_cache_hit();
                    debug!(prompt_len = prompt.len(), "Cache hit for prompt");
                    return Ok(text);
                }
                Ok(None) => self.metrics.record_cache_miss(),
                Err(e) => {
                    self.metrics.record_cache_miss();
                    warn!("Cache lookup failed, calling provider: {}", e);
                }
            }
        }

        let provider = &self.provider;
        let timeout = self.timeout;
        let started = Instant::now();
        let outcome = self
            .retry
            .run("generate", move || {
                with_timeout(timeout, provider.generate(prompt), "generate")
            })
            .await;
        self.metrics
            .record_operation("generate", started.elapsed(), outcome.is_ok());
        let response = outcome.inspect_err(|e| self.metrics.record_error(e))?;

        self.metrics.record_generation(&response);
        debug!(
            chars = response.text.len(),
            elapsed_ms = response.timing.total_ms,
            "Generated content"
        );

        if let Some(cache) = &self.cache
            && let Err(e) = cache.set_as(prompt, &response.text, self.cache_ttl).await
        {
            warn!("Failed to cache generation result: {}", e);
        }

        Ok(response.text)
    }
}

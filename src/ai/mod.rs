//! AI Integration Layer
//!
//! Generation providers and the resilience wrapped around them: retry policy,
//! per-call timeouts, caching and run metrics.

pub mod metrics;
pub mod provider;
pub mod retry;
pub mod service;
pub mod timeout;

pub use metrics::{
    MetricsCollector, MetricsSummary, SharedMetrics, StageMetrics, create_shared_metrics,
};
pub use provider::{
    GeminiProvider, LlmProvider, LlmResponse, OpenAiProvider, ProviderChain, ProviderConfig,
    ResponseMetadata, ResponseTiming, SharedProvider, TokenUsage, create_provider,
};
pub use retry::RetryPolicy;
pub use service::GenerationService;
pub use timeout::with_timeout;

//! deepreport - Multi-Stage Research Report Generator
//!
//! Turns a single topic string into a long-form research report by driving an
//! eight-stage pipeline that alternates generative-text calls with web
//! searches, fans per-section work out over a bounded pool, caches expensive
//! calls and retries transient failures.
//!
//! ## Core Features
//!
//! - **Degrading Pipeline**: stage failures are recorded, never fatal
//! - **Bounded Fan-Out**: per-section work on a fixed-size pool
//! - **Two-Tier Cache**: in-process TTL map backed by one file per key digest
//! - **Retry Policy**: exponential backoff with jitter at every external call
//! - **Validation**: grounding, coverage and readability scoring
//!
//! ## Quick Start
//!
//! ```ignore
//! use deepreport::{ConfigLoader, PipelineContext, ResearchPipeline};
//! use deepreport::ai::create_shared_metrics;
//!
//! let config = ConfigLoader::load(None)?;
//! let ctx = PipelineContext::from_config(&config, None, create_shared_metrics())?;
//! let state = ResearchPipeline::new(ctx).run("Solid-state batteries").await;
//! println!("{}", state.compiled_report.unwrap_or_default());
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: generation providers, retry, timeout, metrics
//! - [`search`]: search providers and the cached search service
//! - [`cache`]: two-tier TTL cache
//! - [`extract`]: best-effort parsing of model output
//! - [`pipeline`]: run state, stages, fan-out and orchestrator
//! - [`validation`]: content scoring and report quality checks

pub mod ai;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod extract;
pub mod pipeline;
pub mod search;
pub mod types;
pub mod validation;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, ReportError, Result, ResultExt};

// Cache
pub use cache::{SharedCache, TieredCache};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{
    PipelineContext, ReportExport, ResearchPipeline, RunState, RunStatus, Stage, StageResult,
};

// =============================================================================
// Service Re-exports
// =============================================================================

pub use ai::{
    GenerationService, LlmProvider, LlmResponse, MetricsCollector, RetryPolicy, SharedMetrics,
};
pub use search::{SearchProvider, SearchResult, SearchService};
pub use validation::{ContentValidator, ValidationResult};

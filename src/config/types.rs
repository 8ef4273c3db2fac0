//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/deepreport/) and project (.deepreport/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    cache as cache_constants, llm as llm_constants, report as report_constants,
    retry as retry_constants, search as search_constants, validation as validation_constants,
};
use crate::types::{ReportError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Generation backend settings
    pub llm: LlmConfig,

    /// Search backend settings
    pub search: SearchConfig,

    /// Report shape and concurrency
    pub report: ReportConfig,

    /// Two-tier cache settings
    pub cache: CacheConfig,

    /// Retry policy for external calls
    pub retry: RetryConfig,

    /// Content validation settings
    pub validation: ValidationConfig,

    /// Output and checkpoint locations
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            report: ReportConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            validation: ValidationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ReportError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ReportError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ReportError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.search.timeout_secs == 0 {
            return Err(ReportError::Config(
                "Search timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.search.max_results == 0 {
            return Err(ReportError::Config(
                "Search max_results must be greater than 0".to_string(),
            ));
        }

        if self.report.max_workers == 0 {
            return Err(ReportError::Config(
                "Report max_workers must be greater than 0".to_string(),
            ));
        }

        if self.report.min_section_words > self.report.max_section_words {
            return Err(ReportError::Config(format!(
                "Report min_section_words ({}) exceeds max_section_words ({})",
                self.report.min_section_words, self.report.max_section_words
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(ReportError::Config(
                "Retry max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(ReportError::Config(
                "Cache max_entries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider type: "gemini", "openai"
    pub provider: String,
    /// Primary model identifier
    pub model: String,
    /// Models tried in order when the primary model fails
    pub fallback_models: Vec<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum output tokens
    pub max_tokens: usize,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,
    /// API key, never serialized to output
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("fallback_models", &self.fallback_models)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: llm_constants::DEFAULT_PROVIDER.to_string(),
            model: llm_constants::DEFAULT_MODEL.to_string(),
            fallback_models: llm_constants::FALLBACK_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            temperature: llm_constants::DEFAULT_TEMPERATURE,
            max_tokens: llm_constants::DEFAULT_MAX_TOKENS,
            timeout_secs: llm_constants::DEFAULT_TIMEOUT_SECS,
            api_base: None,
            api_key: None,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Search Configuration
// =============================================================================

/// Search depth requested from the backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    #[default]
    Moderate,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Moderate => "moderate",
            SearchDepth::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for SearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SearchDepth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(SearchDepth::Basic),
            "moderate" => Ok(SearchDepth::Moderate),
            "advanced" => Ok(SearchDepth::Advanced),
            _ => Err(format!(
                "Unknown search depth: {}. Valid values: basic, moderate, advanced",
                s
            )),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Provider type: "tavily"
    pub provider: String,
    /// Results requested per query
    pub max_results: usize,
    /// Search depth
    pub depth: SearchDepth,
    /// Ask the backend for a synthesized answer alongside results
    pub include_answer: bool,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,
    /// API key, never serialized to output
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("provider", &self.provider)
            .field("max_results", &self.max_results)
            .field("depth", &self.depth)
            .field("include_answer", &self.include_answer)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: search_constants::DEFAULT_PROVIDER.to_string(),
            max_results: search_constants::DEFAULT_MAX_RESULTS,
            depth: SearchDepth::default(),
            include_answer: false,
            timeout_secs: search_constants::DEFAULT_TIMEOUT_SECS,
            api_base: None,
            api_key: None,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Report Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Upper bound on sections taken from the outline
    pub max_sections: usize,
    /// Target words per section draft
    pub min_section_words: usize,
    pub max_section_words: usize,
    /// Draft sections concurrently (pool of `max_workers`) instead of one at a time
    pub parallel_processing: bool,
    /// Worker pool size for per-section fan-out
    pub max_workers: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_sections: report_constants::MAX_SECTIONS,
            min_section_words: report_constants::MIN_SECTION_WORDS,
            max_section_words: report_constants::MAX_SECTION_WORDS,
            parallel_processing: true,
            max_workers: report_constants::DEFAULT_MAX_WORKERS,
        }
    }
}

impl ReportConfig {
    /// Effective pool size for section drafting
    pub fn draft_pool_size(&self) -> usize {
        if self.parallel_processing {
            self.max_workers.max(1)
        } else {
            1
        }
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Route external calls through the cache
    pub enabled: bool,
    /// Keep the durable (on-disk) tier
    pub persist: bool,
    /// Durable tier directory (defaults to the global cache directory)
    pub dir: Option<PathBuf>,
    /// Time-to-live for new entries (seconds)
    pub ttl_secs: u64,
    /// Fast tier capacity
    pub max_entries: usize,
    /// Purge expired entries when the CLI starts
    pub sweep_on_start: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persist: true,
            dir: None,
            ttl_secs: cache_constants::DEFAULT_TTL_SECS,
            max_entries: cache_constants::DEFAULT_MAX_ENTRIES,
            sweep_on_start: true,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub base_delay_ms: u64,
    /// Upper bound of the random jitter added to each backoff (milliseconds)
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry_constants::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: retry_constants::DEFAULT_BASE_DELAY_MS,
            jitter_ms: retry_constants::DEFAULT_JITTER_MS,
        }
    }
}

// =============================================================================
// Validation Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Validate drafted sections after the run
    pub enabled: bool,
    /// Report length bounds (characters)
    pub min_length: usize,
    pub max_length: usize,
    /// Keywords the compiled report must mention
    pub required_keywords: Vec<String>,
    /// Keywords the compiled report must not mention
    pub forbidden_keywords: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_length: validation_constants::DEFAULT_MIN_LENGTH,
            max_length: validation_constants::DEFAULT_MAX_LENGTH,
            required_keywords: Vec::new(),
            forbidden_keywords: Vec::new(),
        }
    }
}

// =============================================================================
// Output Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for run checkpoints and metrics exports
    pub data_dir: PathBuf,
    /// Save the final run state under `<data_dir>/runs/`
    pub save_checkpoint: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".deepreport"),
            save_checkpoint: true,
        }
    }
}

impl OutputConfig {
    pub fn runs_dir(&self) -> PathBuf {
        self.data_dir.join("runs")
    }
}

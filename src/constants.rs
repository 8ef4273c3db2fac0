//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Generation backend defaults
pub mod llm {
    /// Default provider name
    pub const DEFAULT_PROVIDER: &str = "gemini";

    /// Default model identifier
    pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

    /// Models tried in order after the primary model fails
    pub const FALLBACK_MODELS: &[&str] = &["gemini-1.5-pro-latest", "gemini-1.0-pro-latest"];

    /// Sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Maximum output tokens per generation
    pub const DEFAULT_MAX_TOKENS: usize = 4000;

    /// Per-call timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
}

/// Search backend defaults
pub mod search {
    /// Default provider name
    pub const DEFAULT_PROVIDER: &str = "tavily";

    /// Results requested per query
    pub const DEFAULT_MAX_RESULTS: usize = 3;

    /// Per-call timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Provider tag stamped on results when the backend does not name itself
    pub const DEFAULT_SOURCE_TAG: &str = "tavily";
}

/// Report shape defaults
pub mod report {
    /// Upper bound on outline sections
    pub const MAX_SECTIONS: usize = 6;

    /// Target words per section draft
    pub const MIN_SECTION_WORDS: usize = 300;
    pub const MAX_SECTION_WORDS: usize = 400;

    /// Worker pool size for per-section fan-out
    pub const DEFAULT_MAX_WORKERS: usize = 4;

    /// Description used when the outline has none for a section
    pub const MISSING_DESCRIPTION: &str = "Description not available";
}

/// Degraded-state placeholders written when a stage fails
pub mod placeholder {
    pub const OUTLINE: &str = "Unable to generate outline at this time.";
    pub const FORMATTED_BODY: &str = "Unable to format sections at this time.";
    pub const INTRODUCTION: &str = "Unable to generate introduction at this time.";
    pub const CONCLUSION: &str = "Unable to generate conclusion at this time.";
    pub const COMPILED_REPORT: &str = "Unable to compile report at this time.";
}

/// Cache layer defaults
pub mod cache {
    /// Maximum entries held by the in-process fast tier
    pub const DEFAULT_MAX_ENTRIES: usize = 1000;

    /// Default time-to-live (seconds)
    pub const DEFAULT_TTL_SECS: u64 = 3600;

    /// File extension of durable-tier entries
    pub const DURABLE_EXTENSION: &str = "json";
}

/// Retry policy defaults
pub mod retry {
    /// Total attempts including the first call
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

    /// Upper bound of the uniform jitter added to each backoff (milliseconds)
    pub const DEFAULT_JITTER_MS: u64 = 1000;
}

/// Validation engine constants
pub mod validation {
    /// Weight of the grounding score in the overall score
    pub const GROUNDING_WEIGHT: f64 = 0.4;

    /// Weight of the coverage score in the overall score
    pub const COVERAGE_WEIGHT: f64 = 0.4;

    /// Weight of the readability score in the overall score
    pub const READABILITY_WEIGHT: f64 = 0.2;

    /// Score assumed when a response carries no score line
    pub const DEFAULT_SCORE: f64 = 0.5;

    /// Report length bounds for the quality check (characters)
    pub const DEFAULT_MIN_LENGTH: usize = 100;
    pub const DEFAULT_MAX_LENGTH: usize = 5000;

    /// Score deducted per quality-check issue
    pub const ISSUE_PENALTY: f64 = 0.1;
}

/// Network constants
pub mod network {
    /// Connection timeout for HTTP clients (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
}

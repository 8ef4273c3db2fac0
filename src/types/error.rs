//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! External call failures carry a category so logs and retry decisions can
//! tell a rate limit from an authentication problem.
//!
//! ## Error Categories
//!
//! - **Transient**: Temporary server issues (retry)
//! - **RateLimit**: API rate limiting (wait and retry)
//! - **Auth**: Authentication failures
//! - **Network**: Connectivity issues (retry with backoff)
//! - **Unavailable**: Backend or model unavailable (fallback to next)
//!
//! Stage-level failures never abort a run: the orchestrator folds them into
//! the run state's error list. Only an unconstructible run state is fatal.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories for routing and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Authentication failed
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Backend or model unavailable - fallback to next
    Unavailable,
    /// Invalid request
    BadRequest,
    /// Temporary server issues
    Transient,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is worth retrying against the same backend
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::Unknown
        )
    }

    /// Check if this category should trigger fallback to the next model
    pub fn should_fallback(&self) -> bool {
        matches!(self, Self::Unavailable | Self::BadRequest)
    }
}

// =============================================================================
// API Error
// =============================================================================

/// External call error with category and provider context
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
        }
    }

    /// Create from simple message (defaults to Unknown category)
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw provider failures onto categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> ApiError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return ApiError::with_provider(ErrorCategory::RateLimit, message, provider);
        }

        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
            || lower.contains("permission denied")
        {
            return ApiError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("timeout")
            || lower.contains("timed out")
        {
            return ApiError::with_provider(ErrorCategory::Network, message, provider);
        }

        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("service unavailable")
            || lower.contains("not found")
        {
            return ApiError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        if lower.contains("400") || lower.contains("bad request") || lower.contains("malformed") {
            return ApiError::with_provider(ErrorCategory::BadRequest, message, provider);
        }

        if lower.contains("temporary") || lower.contains("overloaded") || lower.contains("500") {
            return ApiError::with_provider(ErrorCategory::Transient, message, provider);
        }

        ApiError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> ApiError {
        match status {
            429 => ApiError::with_provider(ErrorCategory::RateLimit, message, provider),
            401 | 403 => ApiError::with_provider(ErrorCategory::Auth, message, provider),
            400 => ApiError::with_provider(ErrorCategory::BadRequest, message, provider),
            500 | 502 | 503 | 504 => {
                ApiError::with_provider(ErrorCategory::Transient, message, provider)
            }
            404 => ApiError::with_provider(ErrorCategory::Unavailable, message, provider),
            _ => ApiError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }

    /// Classify a transport error from reqwest
    pub fn classify_transport(err: &reqwest::Error, provider: &str) -> ApiError {
        if err.is_timeout() || err.is_connect() {
            ApiError::with_provider(ErrorCategory::Network, err.to_string(), provider)
        } else if let Some(status) = err.status() {
            Self::classify_http_status(status.as_u16(), &err.to_string(), provider)
        } else {
            Self::classify(&err.to_string(), provider)
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ReportError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // External Call Errors
    // -------------------------------------------------------------------------
    /// Generation backend failure
    #[error("Generation error: {0}")]
    Generation(ApiError),

    /// Search backend failure
    #[error("Search error: {0}")]
    Search(ApiError),

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    /// Stage failure folded into the run state's error list
    #[error("Stage {stage} ({stage_name}) failed: {message}")]
    Stage {
        stage: u8,
        stage_name: String,
        message: String,
    },

    /// First failing unit of a fan-out
    #[error("Unit '{unit}' failed: {message}")]
    FanOut { unit: String, message: String },

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl ReportError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a generation error from message
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(ApiError::from_message(message))
    }

    /// Create a search error from message
    pub fn search(message: impl Into<String>) -> Self {
        Self::Search(ApiError::from_message(message))
    }

    /// Short label for the error variant, used to group error counts
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Generation(_) => "generation",
            Self::Search(_) => "search",
            Self::Timeout { .. } => "timeout",
            Self::Stage { .. } => "stage",
            Self::FanOut { .. } => "fan_out",
            Self::InvalidTopic(_) => "invalid_topic",
            Self::Config(_) => "config",
            Self::Cache(_) => "cache",
        }
    }

    /// Category of an external call failure, if any
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Generation(e) | Self::Search(e) => Some(e.category),
            Self::Timeout { .. } => Some(ErrorCategory::Network),
            _ => None,
        }
    }

    /// Check if this error should trigger fallback to another model
    pub fn should_fallback(&self) -> bool {
        self.category().is_some_and(|c| c.should_fallback())
    }
}

/// Extension trait for attaching context to foreign errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| {
            ReportError::Io(std::io::Error::other(format!("{}: {}", context.into(), e)))
        })
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| ReportError::Io(std::io::Error::other(format!("{}: {}", f().into(), e))))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH");
        assert_eq!(ErrorCategory::Unavailable.to_string(), "UNAVAILABLE");
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::BadRequest.is_retryable());
    }

    #[test]
    fn test_classify_messages() {
        let err = ErrorClassifier::classify("Rate limit exceeded", "gemini");
        assert_eq!(err.category, ErrorCategory::RateLimit);

        let err = ErrorClassifier::classify("Invalid API key provided", "tavily");
        assert_eq!(err.category, ErrorCategory::Auth);

        let err = ErrorClassifier::classify("Connection timed out after 30s", "gemini");
        assert_eq!(err.category, ErrorCategory::Network);

        let err = ErrorClassifier::classify("Something weird happened", "test");
        assert_eq!(err.category, ErrorCategory::Unknown);
    }

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ErrorClassifier::classify_http_status(429, "Rate limited", "test");
        assert_eq!(rate_limit.category, ErrorCategory::RateLimit);

        let auth = ErrorClassifier::classify_http_status(401, "Unauthorized", "test");
        assert_eq!(auth.category, ErrorCategory::Auth);

        let missing_model = ErrorClassifier::classify_http_status(404, "No such model", "test");
        assert!(missing_model.category.should_fallback());
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::with_provider(ErrorCategory::RateLimit, "Too many requests", "tavily");
        assert_eq!(err.to_string(), "[tavily:RATE_LIMIT] Too many requests");

        let wrapped = ReportError::Search(err);
        assert_eq!(
            wrapped.to_string(),
            "Search error: [tavily:RATE_LIMIT] Too many requests"
        );
    }

    #[test]
    fn test_report_error_category() {
        assert_eq!(
            ReportError::generation("boom").category(),
            Some(ErrorCategory::Unknown)
        );
        assert_eq!(
            ReportError::timeout("generate", Duration::from_secs(1)).category(),
            Some(ErrorCategory::Network)
        );
        assert!(ReportError::Config("bad".into()).category().is_none());
    }

    #[test]
    fn test_report_error_kind() {
        assert_eq!(ReportError::generation("x").kind(), "generation");
        assert_eq!(ReportError::search("x").kind(), "search");
        assert_eq!(
            ReportError::timeout("search", Duration::from_secs(1)).kind(),
            "timeout"
        );
        assert_eq!(ReportError::InvalidTopic(String::new()).kind(), "invalid_topic");
    }

    #[test]
    fn test_result_ext_with_context() {
        let parsed: std::result::Result<u32, std::num::ParseIntError> = "x".parse();
        let err = parsed.with_context("Reading section count").unwrap_err();
        assert!(err.to_string().starts_with("IO error: Reading section count: "));
    }
}

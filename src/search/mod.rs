//! Web Search Layer
//!
//! `SearchProvider` is the backend seam; `SearchService` wraps it with the
//! cache, retry policy and timeout the same way generation calls are wrapped.
//!
//! ## Modules
//!
//! - `tavily`: Tavily search API
//! - `service`: Cached, retried search calls and bounded multi-query search

mod service;
mod tavily;

pub use crate::config::SearchDepth;
pub use service::SearchService;
pub use tavily::TavilyProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::types::{ReportError, Result};

// =============================================================================
// Search Result
// =============================================================================

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// Content snippet
    pub content: String,
    pub url: String,
    /// Originating provider tag
    pub source: String,
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

impl SearchResult {
    /// Canonical evidence rendering used in prompts and validation
    pub fn to_markdown(&self) -> String {
        format!("**{}**\n{}\n({})", self.title, self.content, self.url)
    }
}

/// Render results and join them with blank lines
pub fn join_markdown(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(SearchResult::to_markdown)
        .collect::<Vec<_>>()
        .join("\n\n")
}

// =============================================================================
// Search Provider Trait
// =============================================================================

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Ranked results for a query
    ///
    /// Fails with `ReportError::Search` on backend or network failure.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchResult>>;

    /// Provider name for logging and result tagging
    fn name(&self) -> &str;
}

pub type SharedSearchProvider = Arc<dyn SearchProvider>;

/// Create a shared search provider from configuration
pub fn create_search_provider(config: &SearchConfig) -> Result<SharedSearchProvider> {
    match config.provider.as_str() {
        "tavily" => Ok(Arc::new(TavilyProvider::new(config)?)),
        _ => Err(ReportError::Config(format!(
            "Unknown search provider: {}. Supported: tavily",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            content: "Body text".to_string(),
            url: "https://example.com/a".to_string(),
            source: "tavily".to_string(),
            relevance_score: Some(0.9),
        }
    }

    #[test]
    fn test_markdown_rendering() {
        assert_eq!(
            result("Title").to_markdown(),
            "**Title**\nBody text\n(https://example.com/a)"
        );
    }

    #[test]
    fn test_join_markdown_uses_blank_lines() {
        let joined = join_markdown(&[result("A"), result("B")]);
        assert!(joined.contains("(https://example.com/a)\n\n**B**"));
        assert_eq!(join_markdown(&[]), "");
    }

    #[test]
    fn test_missing_score_deserializes() {
        let parsed: SearchResult = serde_json::from_str(
            r#"{"title":"t","content":"c","url":"u","source":"tavily"}"#,
        )
        .unwrap();
        assert_eq!(parsed.relevance_score, None);
    }

    #[test]
    fn test_unknown_search_provider() {
        let config = SearchConfig {
            provider: "bing".to_string(),
            ..Default::default()
        };
        assert!(create_search_provider(&config).is_err());
    }
}

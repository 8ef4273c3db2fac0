//! Tavily Search Provider

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{SearchDepth, SearchProvider, SearchResult};
use crate::config::SearchConfig;
use crate::constants::network as net_constants;
use crate::types::{ErrorClassifier, ReportError, Result};

const DEFAULT_API_BASE: &str = "https://api.tavily.com";
const PROVIDER_NAME: &str = "tavily";

pub struct TavilyProvider {
    api_key: SecretString,
    api_base: String,
    include_answer: bool,
    client: reqwest::Client,
}

impl std::fmt::Debug for TavilyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("include_answer", &self.include_answer)
            .finish()
    }
}

/// Tavily only distinguishes basic and advanced
fn tavily_depth(depth: SearchDepth) -> &'static str {
    match depth {
        SearchDepth::Basic | SearchDepth::Moderate => "basic",
        SearchDepth::Advanced => "advanced",
    }
}

impl TavilyProvider {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key_str = config
            .api_key
            .clone()
            .or_else(|| std::env::var("TAVILY_API_KEY").ok())
            .ok_or_else(|| {
                ReportError::Config(
                    "Tavily API key not found. Set TAVILY_API_KEY env var or provide in config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        url::Url::parse(&api_base)
            .map_err(|e| ReportError::Config(format!("Invalid Tavily api_base: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| ReportError::search(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key_str),
            api_base: api_base.trim_end_matches('/').to_string(),
            include_answer: config.include_answer,
            client,
        })
    }

    fn build_request<'a>(
        &self,
        query: &'a str,
        max_results: usize,
        depth: SearchDepth,
    ) -> TavilyRequest<'a> {
        TavilyRequest {
            query,
            max_results,
            search_depth: tavily_depth(depth),
            include_answer: self.include_answer,
        }
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchResult>> {
        info!(
            "Searching Tavily for '{}' (max_results: {}, depth: {})",
            truncate_for_log(query),
            max_results,
            depth
        );

        let start_time = Instant::now();
        let url = format!("{}/search", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&self.build_request(query, max_results, depth))
            .send()
            .await
            .map_err(|e| {
                ReportError::Search(ErrorClassifier::classify_transport(&e, PROVIDER_NAME))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Search(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("Tavily API error ({}): {}", status, body),
                PROVIDER_NAME,
            )));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ReportError::search(format!("Failed to parse Tavily response: {}", e)))?;

        let results: Vec<SearchResult> = body
            .results
            .into_iter()
            .map(|hit| SearchResult {
                title: hit.title,
                content: hit.content,
                url: hit.url,
                source: PROVIDER_NAME.to_string(),
                relevance_score: hit.score,
            })
            .collect();

        debug!(
            results = results.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Search completed"
        );

        Ok(results)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

fn truncate_for_log(query: &str) -> String {
    const MAX: usize = 50;
    if query.chars().count() > MAX {
        format!("{}...", query.chars().take(MAX).collect::<String>())
    } else {
        query.to_string()
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
    score: Option<f64>,
}

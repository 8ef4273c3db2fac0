//! Search Service
//!
//! Cached, retried search calls. Cache keys combine the query with its
//! tunable parameters so a change in result count or depth never reuses a
//! stale hit.

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use super::{SearchDepth, SearchResult, SharedSearchProvider};
use crate::ai::metrics::SharedMetrics;
use crate::ai::retry::RetryPolicy;
use crate::ai::timeout::with_timeout;
use crate::cache::SharedCache;
use crate::config::SearchConfig;
use crate::types::Result;

pub struct SearchService {
    provider: SharedSearchProvider,
    cache: Option<SharedCache>,
    retry: RetryPolicy,
    metrics: SharedMetrics,
    max_results: usize,
    depth: SearchDepth,
    timeout: Duration,
    cache_ttl: Option<Duration>,
}

/// Cache key for one search call
pub(crate) fn search_cache_key(query: &str, max_results: usize, depth: SearchDepth) -> String {
    format!("search:{}:{}:{}", query, max_results, depth)
}

impl SearchService {
    pub fn new(
        provider: SharedSearchProvider,
        config: &SearchConfig,
        retry: RetryPolicy,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            provider,
            cache: None,
            retry,
            metrics,
            max_results: config.max_results,
            depth: config.depth,
            timeout: config.timeout(),
            cache_ttl: None,
        }
    }

    pub fn with_cache(mut self, cache: SharedCache, ttl: Option<Duration>) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Search with the configured result count and depth
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.search_with(query, self.max_results, self.depth).await
    }

    pub async fn search_with(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchResult>> {
        let key = search_cache_key(query, max_results, depth);

        if let Some(cache) = &self.cache {
            match cache.get_as::<Vec<SearchResult>>(&key).await {
                Ok(Some(results)) => {
                    self.metrics.record_cache_hit();
                    debug!(query, "Cache hit for search query");
                    return Ok(results);
                }
                Ok(None) => self.metrics.record_cache_miss(),
                Err(e) => {
                    self.metrics.record_cache_miss();
                    warn!("Cache lookup failed, calling search backend: {}", e);
                }
            }
        }

        let provider = &self.provider;
        let timeout = self.timeout;
        let started = Instant::now();
        let outcome = self
            .retry
            .run("search", move || {
                with_timeout(
                    timeout,
                    provider.search(query, max_results, depth),
                    "search",
                )
            })
            .await;
        self.metrics
            .record_operation("search", started.elapsed(), outcome.is_ok());
        let results = outcome.inspect_err(|e| self.metrics.record_error(e))?;

        self.metrics.record_search();

        if let Some(cache) = &self.cache
            && let Err(e) = cache.set_as(&key, &results, self.cache_ttl).await
        {
            warn!("Failed to cache search results: {}", e);
        }

        Ok(results)
    }

    /// Run several searches on a bounded pool, results in query order.
    ///
    /// The first failure is returned once it is reached in order.
    pub async fn search_many(
        &self,
        queries: &[String],
        pool_size: usize,
    ) -> Result<Vec<Vec<SearchResult>>> {
        stream::iter(queries)
            .map(|query| self.search(query))
            .buffered(pool_size.max(1))
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::metrics::create_shared_metrics;
    use crate::cache::TieredCache;
    use crate::search::SearchProvider;
    use crate::types::ReportError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubSearch {
        calls: AtomicU32,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl SearchProvider for StubSearch {
        async fn search(
            &self,
            query: &str,
            max_results: usize,
            _depth: SearchDepth,
        ) -> Result<Vec<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(query) {
                return Err(ReportError::search("backend rejected query"));
            }
            Ok((0..max_results)
                .map(|i| SearchResult {
                    title: format!("{} #{}", query, i),
                    content: "snippet".to_string(),
                    url: format!("https://example.com/{}", i),
                    source: "stub".to_string(),
                    relevance_score: None,
                })
                .collect())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn service(fail_on: Option<&'static str>) -> (SearchService, Arc<StubSearch>) {
        let stub = Arc::new(StubSearch {
            calls: AtomicU32::new(0),
            fail_on,
        });
        let service = SearchService::new(
            stub.clone(),
            &SearchConfig::default(),
            RetryPolicy::immediate(2),
            create_shared_metrics(),
        );
        (service, stub)
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(
            search_cache_key("rust", 3, SearchDepth::Moderate),
            "search:rust:3:moderate"
        );
    }

    #[tokio::test]
    async fn test_cached_search_calls_backend_once() {
        let (service, stub) = service(None);
        let service = service.with_cache(
            Arc::new(TieredCache::new(10, None, Duration::from_secs(60))),
            None,
        );

        let first = service.search("rust").await.unwrap();
        let second = service.search("rust").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

        // Different parameters are a different key
        service
            .search_with("rust", 1, SearchDepth::Advanced)
            .await
            .unwrap();
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_search_many_preserves_order() {
        let (service, _) = service(None);
        let queries: Vec<String> = (0..6).map(|i| format!("q{}", i)).collect();

        let results = service.search_many(&queries, 2).await.unwrap();
        assert_eq!(results.len(), 6);
        for (i, batch) in results.iter().enumerate() {
            assert!(batch[0].title.starts_with(&format!("q{} ", i)));
        }
    }

    #[tokio::test]
    async fn test_search_many_propagates_failure() {
        let (service, stub) = service(Some("bad"));
        let queries = vec!["ok".to_string(), "bad".to_string()];

        assert!(service.search_many(&queries, 2).await.is_err());
        // "bad" was retried once
        assert!(stub.calls.load(Ordering::SeqCst) >= 3);
    }
}

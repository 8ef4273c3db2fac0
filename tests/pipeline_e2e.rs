//! End-to-end pipeline runs against stub backends

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use deepreport::ai::create_shared_metrics;
use deepreport::config::{ReportConfig, SearchConfig};
use deepreport::pipeline::stages::{self, StageOutput};
use deepreport::search::SearchDepth;
use deepreport::{
    GenerationService, LlmProvider, LlmResponse, PipelineContext, ResearchPipeline, Result,
    RetryPolicy, RunState, RunStatus, SearchProvider, SearchResult, SearchService, TieredCache,
};

// =============================================================================
// Stub Backends
// =============================================================================

/// Always answers with the same three-line numbered list
struct FixedListLlm {
    calls: AtomicU32,
}

impl FixedListLlm {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl LlmProvider for FixedListLlm {
    async fn generate(&self, _prompt: &str) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LlmResponse::text_only("1. First\n2. Second\n3. Third"))
    }

    fn name(&self) -> &str {
        "fixed-list"
    }

    fn model(&self) -> &str {
        "fixed-list-model"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Sleeps longer for earlier sections so completion order is reversed
struct SlowFirstLlm;

#[async_trait]
impl LlmProvider for SlowFirstLlm {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        let delay = (1..=5)
            .find(|i| prompt.contains(&format!("Section Title: Section {}", i)))
            .map(|i| 60 - i * 10)
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(LlmResponse::text_only(format!("draft ({} ms)", delay)))
    }

    fn name(&self) -> &str {
        "slow-first"
    }

    fn model(&self) -> &str {
        "slow-first-model"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Always returns one fixed result
struct OneResultSearch;

#[async_trait]
impl SearchProvider for OneResultSearch {
    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
        _depth: SearchDepth,
    ) -> Result<Vec<SearchResult>> {
        Ok(vec![SearchResult {
            title: "Fixed Result".to_string(),
            content: "Fixed content".to_string(),
            url: "https://example.com/fixed".to_string(),
            source: "stub".to_string(),
            relevance_score: Some(1.0),
        }])
    }

    fn name(&self) -> &str {
        "one-result"
    }
}

fn context(
    llm: Arc<dyn LlmProvider>,
    cache: Option<Arc<TieredCache>>,
    report: ReportConfig,
) -> PipelineContext {
    let metrics = create_shared_metrics();
    let mut generator = GenerationService::new(
        llm,
        RetryPolicy::immediate(3),
        metrics.clone(),
        Duration::from_secs(5),
    );
    let mut searcher = SearchService::new(
        Arc::new(OneResultSearch),
        &SearchConfig::default(),
        RetryPolicy::immediate(3),
        metrics.clone(),
    );
    if let Some(cache) = cache {
        generator = generator.with_cache(cache.clone(), None);
        searcher = searcher.with_cache(cache, None);
    }
    PipelineContext::new(Arc::new(generator), Arc::new(searcher), metrics, report)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_fixed_list_backend_completes() {
    let pipeline =
        ResearchPipeline::new(context(FixedListLlm::new(), None, ReportConfig::default()));
    let state = pipeline.run("Test Topic").await;

    assert!(state.status == RunStatus::Completed || state.has_errors());
    assert_eq!(state.plan_queries, vec!["First", "Second", "Third"]);

    let report = state.compiled_report.as_deref().unwrap();
    assert!(!report.is_empty());
    assert!(report.contains("# Test Topic"));
    assert_eq!(state.total_characters, report.chars().count());
}

#[tokio::test]
async fn test_fan_out_collects_every_section() {
    let report = ReportConfig {
        max_workers: 2,
        parallel_processing: true,
        ..ReportConfig::default()
    };
    let ctx = context(Arc::new(SlowFirstLlm), None, report);

    let mut state = RunState::new("Fan-out").unwrap();
    state.section_titles = (1..=5).map(|i| format!("Section {}", i)).collect();

    let output = stages::section_drafts(&ctx, &state).await.unwrap();
    let StageOutput::SectionDrafts(drafts) = output else {
        panic!("unexpected stage output");
    };

    let keys: Vec<&String> = drafts.keys().collect();
    assert_eq!(
        keys,
        vec!["Section 1", "Section 2", "Section 3", "Section 4", "Section 5"]
    );
    assert_eq!(drafts["Section 1"], "draft (50 ms)");
}

#[tokio::test]
async fn test_second_run_served_from_cache() {
    let temp_dir = TempDir::new().unwrap();
    let cache = Arc::new(TieredCache::new(
        100,
        Some(temp_dir.path().join("cache")),
        Duration::from_secs(3600),
    ));
    let llm = FixedListLlm::new();

    let first = ResearchPipeline::new(context(
        llm.clone(),
        Some(cache.clone()),
        ReportConfig::default(),
    ));
    let first_state = first.run("Cached Topic").await;
    let calls_after_first = llm.calls.load(Ordering::SeqCst);
    assert!(calls_after_first > 0);

    let second = ResearchPipeline::new(context(llm.clone(), Some(cache), ReportConfig::default()));
    let second_state = second.run("Cached Topic").await;

    assert_eq!(llm.calls.load(Ordering::SeqCst), calls_after_first);
    assert_eq!(second_state.compiled_report, first_state.compiled_report);
    assert!(second.context().metrics.summary().cache_hits > 0);
}

#[tokio::test]
async fn test_checkpoint_roundtrip_after_run() {
    let temp_dir = TempDir::new().unwrap();
    let pipeline =
        ResearchPipeline::new(context(FixedListLlm::new(), None, ReportConfig::default()));
    let state = pipeline.run("Checkpointed Topic").await;

    let path = state.checkpoint_path(temp_dir.path());
    state.save(&path).await.unwrap();

    assert_eq!(RunState::load(&path).await.unwrap(), state);
}

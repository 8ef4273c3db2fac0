//! Research Report Pipeline
//!
//! Eight stages move a [`RunState`] from `initialized` to `completed`:
//!
//! ```text
//! ┌──────────────┐   ┌─────────┐   ┌────────────────┐   ┌──────────────────┐
//! │ Plan queries │──▶│ Outline │──▶│ Section queries│──▶│ Section research │
//! └──────────────┘   └─────────┘   └────────────────┘   └──────────────────┘
//!                                                                │
//! ┌─────────┐   ┌────────────────┐   ┌────────┐   ┌──────────────▼───┐
//! │ Compile │◀──│ Final sections │◀──│ Format │◀──│ Section drafts   │
//! └─────────┘   └────────────────┘   └────────┘   └──────────────────┘
//! ```
//!
//! Stages return a [`StageResult`]; the orchestrator folds each one into the
//! state. A failed stage records its error, resets the fields it owns to safe
//! defaults and leaves the status where it was. The next stage still runs on
//! the degraded state, so a run always ends with a compiled document.

pub mod export;
pub mod fanout;
pub mod prompts;
pub mod stages;
pub mod state;

pub use export::{ExportMetrics, ReportExport};
pub use fanout::fan_out;
pub use stages::{Stage, StageFailure, StageOutput, StageResult};
pub use state::{RunState, RunStatus, slugify};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use crate::ai::metrics::SharedMetrics;
use crate::ai::provider::create_provider;
use crate::ai::retry::RetryPolicy;
use crate::ai::service::GenerationService;
use crate::cache::SharedCache;
use crate::config::{Config, ReportConfig};
use crate::search::{SearchService, create_search_provider};
use crate::types::{ReportError, Result};

// =============================================================================
// Pipeline Context
// =============================================================================

/// Services shared by every stage of one run
pub struct PipelineContext {
    pub generator: Arc<GenerationService>,
    pub searcher: Arc<SearchService>,
    pub metrics: SharedMetrics,
    pub report: ReportConfig,
}

impl PipelineContext {
    pub fn new(
        generator: Arc<GenerationService>,
        searcher: Arc<SearchService>,
        metrics: SharedMetrics,
        report: ReportConfig,
    ) -> Self {
        Self {
            generator,
            searcher,
            metrics,
            report,
        }
    }

    /// Build providers and services from configuration
    ///
    /// Both services share `cache` when one is given.
    pub fn from_config(
        config: &Config,
        cache: Option<SharedCache>,
        metrics: SharedMetrics,
    ) -> Result<Self> {
        let retry = RetryPolicy::from_config(&config.retry);

        let provider = create_provider(&config.llm)?;
        let mut generator =
            GenerationService::new(provider, retry, metrics.clone(), config.llm.timeout());

        let search_provider = create_search_provider(&config.search)?;
        let mut searcher =
            SearchService::new(search_provider, &config.search, retry, metrics.clone());

        if let Some(cache) = cache {
            generator = generator.with_cache(cache.clone(), None);
            searcher = searcher.with_cache(cache, None);
        }

        info!(
            model = generator.model(),
            workers = config.report.max_workers,
            "Pipeline context ready"
        );

        Ok(Self::new(
            Arc::new(generator),
            Arc::new(searcher),
            metrics,
            config.report.clone(),
        ))
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct ResearchPipeline {
    ctx: PipelineContext,
}

impl ResearchPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Run every stage for `topic` and return the terminal state
    ///
    /// Never fails: stage errors are folded into `error_messages`. A topic
    /// that cannot start a run yields an error-only state.
    #[instrument(skip(self), fields(run_id = %self.ctx.metrics.run_id()))]
    pub async fn run(&self, topic: &str) -> RunState {
        let started = Instant::now();

        let mut state = match RunState::new(topic) {
            Ok(state) => state,
            Err(e) => {
                error!("Pipeline execution failed: {}", e);
                let mut state =
                    RunState::error_only(topic, format!("Pipeline execution failed: {}", e));
                state.processing_time = started.elapsed().as_secs_f64();
                return state;
            }
        };

        info!("Starting research pipeline for topic: {}", state.topic);

        for stage in Stage::ALL {
            self.run_stage(stage, &mut state).await;
        }

        state.processing_time = started.elapsed().as_secs_f64();

        if state.has_errors() {
            warn!(
                errors = state.error_messages.len(),
                "Pipeline finished with errors in {:.2}s",
                state.processing_time
            );
        } else {
            info!(
                "Pipeline completed successfully in {:.2}s",
                state.processing_time
            );
        }

        state
    }

    /// Execute one stage and fold its result into the state
    ///
    /// Returns whether the stage succeeded.
    pub async fn run_stage(&self, stage: Stage, state: &mut RunState) -> bool {
        info!("{}", stage);
        let started = Instant::now();

        let result = self.execute(stage, state).await;
        let elapsed = started.elapsed();

        let succeeded = fold(stage, result, state);
        self.ctx.metrics.record_stage(stage.name(), elapsed, succeeded);
        log_outcome(stage, succeeded, elapsed);
        succeeded
    }

    async fn execute(&self, stage: Stage, state: &RunState) -> StageResult {
        let ctx = &self.ctx;
        match stage {
            Stage::PlanQueries => stages::plan_queries(ctx, state).await,
            Stage::Outline => stages::outline(ctx, state).await,
            Stage::SectionQueries => stages::section_queries(ctx, state).await,
            Stage::SectionResearch => stages::section_research(ctx, state).await,
            Stage::SectionDrafts => stages::section_drafts(ctx, state).await,
            Stage::Format => stages::format_sections(state),
            Stage::FinalSections => stages::final_sections(ctx, state).await,
            Stage::Compile => stages::compile(state),
        }
    }
}

/// Fold a stage result into the state
///
/// Success applies the output and advances the status. Failure resets the
/// stage's fields to their defaults and appends the error message.
pub fn fold(stage: Stage, result: StageResult, state: &mut RunState) -> bool {
    match result {
        Ok(output) => {
            output.apply(state);
            state.advance(stage.target_status());
            true
        }
        Err(failure) => {
            let message = failure.to_string();
            error!(error = %ReportError::from(failure), "{}", message);
            stage.apply_defaults(state);
            state.record_error(message);
            false
        }
    }
}

fn log_outcome(stage: Stage, succeeded: bool, elapsed: Duration) {
    if succeeded {
        info!(
            stage = stage.number(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage complete"
        );
    } else {
        warn!(
            stage = stage.number(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage degraded"
        );
    }
}

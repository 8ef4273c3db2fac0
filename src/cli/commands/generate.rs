//! Generate Command
//!
//! Runs the research pipeline for one topic, then optionally validates the
//! drafted sections, saves a checkpoint and writes the export artifact.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::cache::open_cache;
use crate::ai::metrics::create_shared_metrics;
use crate::cli::ui::Output;
use crate::config::Config;
use crate::pipeline::{PipelineContext, ReportExport, ResearchPipeline, RunState, RunStatus};
use crate::types::{Result, ResultExt};
use crate::validation::{
    ContentValidator, QualityScorer, StructuralScorer, ValidationCriteria, check_report_quality,
};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub topic: String,
    /// Write the export JSON here instead of printing the report
    pub output: Option<PathBuf>,
    pub validate: bool,
    /// Print and save the run metrics summary
    pub show_metrics: bool,
}

/// Run the pipeline and report the outcome
///
/// Returns the terminal run state; the caller decides the exit code.
pub async fn run(config: &Config, options: GenerateOptions) -> Result<RunState> {
    let out = Output::new();
    out.header(&format!("Researching: {}", options.topic));

    let cache = open_cache(config).await;
    let metrics = create_shared_metrics();
    let ctx = PipelineContext::from_config(config, cache, metrics.clone())?;
    let pipeline = ResearchPipeline::new(ctx);

    let state = pipeline.run(&options.topic).await;
    if state.status != RunStatus::Completed {
        return Ok(state);
    }

    if config.output.save_checkpoint {
        let path = state.checkpoint_path(&config.output.runs_dir());
        match state.save(&path).await {
            Ok(()) => debug!("Checkpoint saved to {}", path.display()),
            Err(e) => warn!("Failed to save checkpoint: {}", e),
        }
    }

    let mut export = ReportExport::from_state(&state);

    if options.validate && config.validation.enabled {
        let validator = ContentValidator::new(pipeline.context().generator.clone());
        let sections = validator
            .validate_sections(&state, config.report.max_workers)
            .await;
        info!("Validated {} sections", sections.len());

        let scorer = StructuralScorer;
        debug!(scorer = scorer.name(), "Scoring report quality");
        let quality = check_report_quality(
            state.compiled_report.as_deref().unwrap_or_default(),
            &ValidationCriteria::from(&config.validation),
            &scorer,
        );
        for issue in &quality.issues {
            out.warning(issue);
        }

        export = export.with_validation(sections).with_quality(quality);
    }

    let summary = metrics.summary();
    export = export.with_system_metrics(summary.clone());

    out.success("Research report completed");
    out.field("Topic", &state.topic);
    out.field("Characters", state.total_characters);
    out.field("Processing time", format!("{:.2}s", state.processing_time));
    out.field("Sections", state.section_titles.len());
    for message in &state.error_messages {
        out.warning(message);
    }

    match &options.output {
        Some(path) => {
            export.write(path).await?;
            out.info(&format!("Report saved to: {}", path.display()));
        }
        None => out.document(state.compiled_report.as_deref().unwrap_or_default()),
    }

    if options.show_metrics {
        out.section("Metrics");
        println!("{}", summary.display());

        let path = config
            .output
            .data_dir
            .join(format!("metrics_{}.json", Utc::now().format("%Y%m%d_%H%M%S")));
        tokio::fs::create_dir_all(&config.output.data_dir)
            .await
            .with_context("Creating data directory")?;
        let content = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(&path, content)
            .await
            .with_context_fn(|| format!("Writing metrics to {}", path.display()))?;
        out.info(&format!("Metrics exported to: {}", path.display()));
    }

    Ok(state)
}

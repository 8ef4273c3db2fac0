//! Pipeline Stages
//!
//! Each stage reads the run state and returns a `StageResult`: the output it
//! produced, or a structured failure. Stages never mutate the state; the
//! orchestrator folds outputs and failures into it.
//!
//! | # | Stage | External calls |
//! |---|-------|----------------|
//! | 1 | Plan queries | 1 generation |
//! | 2 | Outline | 1 search per planning query, 1 generation |
//! | 3 | Section queries | 1 generation per section (fan-out) |
//! | 4 | Section research | 1 search per section query (fan-out) |
//! | 5 | Section drafts | 1 generation per section (fan-out) |
//! | 6 | Format | none |
//! | 7 | Final sections | 2 generations |
//! | 8 | Compile | none |

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use super::PipelineContext;
use super::fanout::fan_out;
use super::prompts;
use super::state::{RunState, RunStatus};
use crate::constants::placeholder;
use crate::extract;
use crate::search::SearchResult;
use crate::types::ReportError;

// =============================================================================
// Stage Identity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PlanQueries = 1,
    Outline = 2,
    SectionQueries = 3,
    SectionResearch = 4,
    SectionDrafts = 5,
    Format = 6,
    FinalSections = 7,
    Compile = 8,
}

impl Stage {
    /// Execution order
    pub const ALL: [Stage; 8] = [
        Self::PlanQueries,
        Self::Outline,
        Self::SectionQueries,
        Self::SectionResearch,
        Self::SectionDrafts,
        Self::Format,
        Self::FinalSections,
        Self::Compile,
    ];

    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PlanQueries => "Generating planning queries",
            Self::Outline => "Generating report outline",
            Self::SectionQueries => "Generating section-specific queries",
            Self::SectionResearch => "Performing web searches",
            Self::SectionDrafts => "Writing section drafts",
            Self::Format => "Formatting sections",
            Self::FinalSections => "Writing final sections",
            Self::Compile => "Compiling final report",
        }
    }

    /// Status reached when this stage succeeds
    pub fn target_status(&self) -> RunStatus {
        match self {
            Self::PlanQueries => RunStatus::PlanningQueriesGenerated,
            Self::Outline => RunStatus::OutlineGenerated,
            Self::SectionQueries => RunStatus::SectionQueriesGenerated,
            Self::SectionResearch => RunStatus::ResearchCompleted,
            Self::SectionDrafts => RunStatus::DraftsCompleted,
            Self::Format => RunStatus::SectionsFormatted,
            Self::FinalSections => RunStatus::FinalSectionsCompleted,
            Self::Compile => RunStatus::Completed,
        }
    }

    /// Leading text of the error message recorded on failure
    pub fn failure_context(&self) -> &'static str {
        match self {
            Self::PlanQueries => "Planning query generation failed",
            Self::Outline => "Report outline generation failed",
            Self::SectionQueries => "Section query generation failed",
            Self::SectionResearch => "Web research failed",
            Self::SectionDrafts => "Section draft writing failed",
            Self::Format => "Section formatting failed",
            Self::FinalSections => "Final section writing failed",
            Self::Compile => "Report compilation failed",
        }
    }

    /// Reset the fields this stage owns to their safe defaults
    pub fn apply_defaults(&self, state: &mut RunState) {
        match self {
            Self::PlanQueries => state.plan_queries.clear(),
            Self::Outline => {
                state.report_outline = Some(placeholder::OUTLINE.to_string());
                state.section_titles.clear();
            }
            Self::SectionQueries => state.section_queries.clear(),
            Self::SectionResearch => state.section_research.clear(),
            Self::SectionDrafts => state.section_drafts.clear(),
            Self::Format => state.formatted_body = Some(placeholder::FORMATTED_BODY.to_string()),
            Self::FinalSections => {
                state.intro = Some(placeholder::INTRODUCTION.to_string());
                state.conclusion = Some(placeholder::CONCLUSION.to_string());
            }
            Self::Compile => {
                let report = placeholder::COMPILED_REPORT.to_string();
                state.total_characters = report.chars().count();
                state.compiled_report = Some(report);
            }
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stage {}: {}", self.number(), self.name())
    }
}

// =============================================================================
// Stage Result
// =============================================================================

/// Output of a successful stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    PlanningQueries(Vec<String>),
    Outline {
        outline: String,
        titles: Vec<String>,
    },
    SectionQueries(BTreeMap<String, Vec<String>>),
    SectionResearch(BTreeMap<String, Vec<String>>),
    SectionDrafts(BTreeMap<String, String>),
    FormattedBody(String),
    FinalSections {
        intro: String,
        conclusion: String,
    },
    Compiled(String),
}

impl StageOutput {
    /// Write this output into the state
    ///
    /// Section maps are filtered to titles the outline declared.
    pub fn apply(self, state: &mut RunState) {
        match self {
            Self::PlanningQueries(queries) => state.plan_queries = queries,
            Self::Outline { outline, titles } => {
                state.report_outline = Some(outline);
                state.section_titles = titles;
            }
            Self::SectionQueries(map) => state.section_queries = known_sections(state, map),
            Self::SectionResearch(map) => state.section_research = known_sections(state, map),
            Self::SectionDrafts(map) => state.section_drafts = known_sections(state, map),
            Self::FormattedBody(body) => state.formatted_body = Some(body),
            Self::FinalSections { intro, conclusion } => {
                state.intro = Some(intro);
                state.conclusion = Some(conclusion);
            }
            Self::Compiled(report) => {
                state.total_characters = report.chars().count();
                state.compiled_report = Some(report);
            }
        }
    }
}

fn known_sections<T>(state: &RunState, map: BTreeMap<String, T>) -> BTreeMap<String, T> {
    map.into_iter()
        .filter(|(title, _)| {
            let known = state.section_titles.contains(title);
            if !known {
                debug!(section = %title, "Dropping result for undeclared section");
            }
            known
        })
        .collect()
}

/// Structured reason a stage produced no output
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub stage: Stage,
    pub context: &'static str,
    pub cause: String,
}

impl StageFailure {
    pub fn new(stage: Stage, cause: impl std::fmt::Display) -> Self {
        Self {
            stage,
            context: stage.failure_context(),
            cause: cause.to_string(),
        }
    }

    fn with_context(mut self, context: &'static str) -> Self {
        self.context = context;
        self
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.cause)
    }
}

impl From<StageFailure> for ReportError {
    fn from(failure: StageFailure) -> Self {
        ReportError::Stage {
            stage: failure.stage.number(),
            stage_name: failure.stage.name().to_string(),
            message: failure.cause,
        }
    }
}

pub type StageResult = std::result::Result<StageOutput, StageFailure>;

fn render(results: Vec<Vec<SearchResult>>) -> Vec<String> {
    results
        .iter()
        .flatten()
        .map(SearchResult::to_markdown)
        .collect()
}

// =============================================================================
// Stages
// =============================================================================

/// Stage 1: research questions for the topic
#[instrument(skip_all, fields(topic = %state.topic))]
pub async fn plan_queries(ctx: &PipelineContext, state: &RunState) -> StageResult {
    let stage = Stage::PlanQueries;
    let response = ctx
        .generator
        .generate(&prompts::planning_queries(&state.topic))
        .await
        .map_err(|e| StageFailure::new(stage, e))?;

    let queries = extract::parse_list_items(&response);
    info!("Generated {} planning queries", queries.len());
    Ok(StageOutput::PlanningQueries(queries))
}

/// Stage 2: search every planning query, then outline the report
#[instrument(skip_all, fields(queries = state.plan_queries.len()))]
pub async fn outline(ctx: &PipelineContext, state: &RunState) -> StageResult {
    let stage = Stage::Outline;
    let results = ctx
        .searcher
        .search_many(&state.plan_queries, ctx.report.max_workers)
        .await
        .map_err(|e| StageFailure::new(stage, e))?;

    let documents = render(results);
    info!("Collected {} planning search results", documents.len());

    let prompt = prompts::report_outline(&state.topic, &documents.join("\n\n"), &ctx.report);
    let outline = ctx
        .generator
        .generate(&prompt)
        .await
        .map_err(|e| StageFailure::new(stage, e))?;

    let mut titles = extract::parse_section_titles(&outline);
    if titles.len() > ctx.report.max_sections {
        debug!(
            parsed = titles.len(),
            kept = ctx.report.max_sections,
            "Outline has more sections than allowed"
        );
        titles.truncate(ctx.report.max_sections);
    }
    info!("Generated report outline with {} sections", titles.len());

    Ok(StageOutput::Outline { outline, titles })
}

/// Stage 3: exploratory queries for every section
#[instrument(skip_all, fields(sections = state.section_titles.len()))]
pub async fn section_queries(ctx: &PipelineContext, state: &RunState) -> StageResult {
    let topic = state.topic.as_str();
    let queries = fan_out(
        state.section_titles.clone(),
        ctx.report.max_workers,
        |section: String| async move {
            let response = ctx
                .generator
                .generate(&prompts::section_queries(topic, &section))
                .await?;
            let queries = extract::parse_list_items(&response);
            debug!(section = %section, queries = queries.len(), "Generated section queries");
            Ok(queries)
        },
    )
    .await
    .map_err(|e| StageFailure::new(Stage::SectionQueries, e))?;

    let total: usize = queries.values().map(Vec::len).sum();
    info!("Generated {} total section-specific queries", total);
    Ok(StageOutput::SectionQueries(queries))
}

/// Stage 4: search every section query, sections in parallel
#[instrument(skip_all, fields(sections = state.section_queries.len()))]
pub async fn section_research(ctx: &PipelineContext, state: &RunState) -> StageResult {
    let units: Vec<String> = state
        .section_titles
        .iter()
        .filter(|title| state.section_queries.contains_key(*title))
        .cloned()
        .collect();

    let research = fan_out(units, ctx.report.max_workers, |section: String| async move {
        let queries = state
            .section_queries
            .get(&section)
            .map(Vec::as_slice)
            .unwrap_or_default();
        // Sections already run in parallel; searches within one stay sequential
        let results = ctx.searcher.search_many(queries, 1).await?;
        let documents = render(results);
        debug!(section = %section, documents = documents.len(), "Collected section research");
        Ok(documents)
    })
    .await
    .map_err(|e| StageFailure::new(Stage::SectionResearch, e))?;

    let total: usize = research.values().map(Vec::len).sum();
    info!("Completed web searches, collected {} total results", total);
    Ok(StageOutput::SectionResearch(research))
}

/// Stage 5: draft every section from its research
#[instrument(skip_all, fields(sections = state.section_titles.len()))]
pub async fn section_drafts(ctx: &PipelineContext, state: &RunState) -> StageResult {
    let pool_size = ctx.report.draft_pool_size();
    let outline = state.report_outline.as_deref().unwrap_or_default();

    let drafts = fan_out(
        state.section_titles.clone(),
        pool_size,
        |section: String| async move {
            let description = extract::find_section_description(outline, &section);
            let documents = state
                .section_research
                .get(&section)
                .map(|docs| docs.join("\n\n"))
                .unwrap_or_default();

            let prompt = prompts::section_draft(&section, &description, &documents, &ctx.report);
            let draft = ctx.generator.generate(&prompt).await?;
            info!(section = %section, chars = draft.len(), "Completed section draft");
            Ok(draft)
        },
    )
    .await
    .map_err(|e| {
        let failure = StageFailure::new(Stage::SectionDrafts, e);
        if pool_size > 1 {
            failure.with_context("Parallel section writing failed")
        } else {
            failure
        }
    })?;

    let total: usize = drafts.values().map(String::len).sum();
    info!("Completed section drafts, generated {} total characters", total);
    Ok(StageOutput::SectionDrafts(drafts))
}

/// Stage 6: join drafts under section headings in outline order
pub fn format_sections(state: &RunState) -> StageResult {
    let body = state
        .section_titles
        .iter()
        .map(|title| {
            let draft = state
                .section_drafts
                .get(title)
                .map(String::as_str)
                .unwrap_or_default();
            format!("## {}\n\n{}", title, draft)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    info!("Formatted body text, {} characters", body.len());
    Ok(StageOutput::FormattedBody(body))
}

/// Stage 7: introduction, then conclusion
#[instrument(skip_all, fields(topic = %state.topic))]
pub async fn final_sections(ctx: &PipelineContext, state: &RunState) -> StageResult {
    let stage = Stage::FinalSections;
    let body = state.formatted_body.as_deref().unwrap_or_default();

    let intro = ctx
        .generator
        .generate(&prompts::introduction(&state.topic, body))
        .await
        .map_err(|e| StageFailure::new(stage, e))?;

    let conclusion = ctx
        .generator
        .generate(&prompts::conclusion(&state.topic, body))
        .await
        .map_err(|e| StageFailure::new(stage, e))?;

    info!(
        "Completed final sections, intro: {} chars, conclusion: {} chars",
        intro.len(),
        conclusion.len()
    );
    Ok(StageOutput::FinalSections { intro, conclusion })
}

/// Stage 8: title, introduction, body and conclusion in one document
pub fn compile(state: &RunState) -> StageResult {
    let stage = Stage::Compile;
    let intro = state
        .intro
        .as_deref()
        .ok_or_else(|| StageFailure::new(stage, "introduction is missing"))?;
    let body = state
        .formatted_body
        .as_deref()
        .ok_or_else(|| StageFailure::new(stage, "formatted body is missing"))?;
    let conclusion = state
        .conclusion
        .as_deref()
        .ok_or_else(|| StageFailure::new(stage, "conclusion is missing"))?;

    let report = [
        format!("# {}", state.topic),
        format!("\n## Introduction\n{}", intro),
        body.to_string(),
        format!("\n## Conclusion\n{}", conclusion),
    ]
    .join("\n\n");

    info!("Compiled final report, {} characters", report.chars().count());
    Ok(StageOutput::Compiled(report))
}

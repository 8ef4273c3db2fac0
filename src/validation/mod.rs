//! Content Validation Engine
//!
//! Scores generated text on three independent dimensions by asking the
//! generation backend to assess it:
//!
//! - **Grounding**: claims supported by the supplied source documents
//! - **Coverage**: intended queries actually addressed
//! - **Readability**: clarity, structure and tone
//!
//! Validation never fails its caller. A dimension whose call fails scores
//! `0.0` and carries one `Validation error: ...` issue instead.

pub mod quality;

pub use quality::{
    QualityReport, QualityScorer, StructuralScorer, ValidationCriteria, check_report_quality,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::ai::service::GenerationService;
use crate::constants::validation as validation_constants;
use crate::extract::{ParsedAssessment, parse_score_and_issues};
use crate::pipeline::fan_out;
use crate::pipeline::state::RunState;
use crate::types::ReportError;

// =============================================================================
// Validation Result
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub section_title: String,
    pub grounding_score: f64,
    pub coverage_score: f64,
    pub readability_score: f64,
    #[serde(default)]
    pub hallucinated_claims: Vec<String>,
    #[serde(default)]
    pub coverage_gaps: Vec<String>,
    #[serde(default)]
    pub readability_issues: Vec<String>,
    #[serde(default)]
    pub overall_score: f64,
}

impl ValidationResult {
    fn titled(title: &str) -> Self {
        Self {
            section_title: title.to_string(),
            ..Self::default()
        }
    }

    /// Weighted sum of the three dimensions, clamped to `[0, 1]`
    pub fn calculate_overall_score(&mut self) -> f64 {
        let score = self.grounding_score * validation_constants::GROUNDING_WEIGHT
            + self.coverage_score * validation_constants::COVERAGE_WEIGHT
            + self.readability_score * validation_constants::READABILITY_WEIGHT;
        self.overall_score = score.clamp(0.0, 1.0);
        self.overall_score
    }

    pub fn issue_count(&self) -> usize {
        self.hallucinated_claims.len() + self.coverage_gaps.len() + self.readability_issues.len()
    }
}

// =============================================================================
// Prompts
// =============================================================================

fn grounding_prompt(content: &str, sources: &str) -> String {
    format!(
        r#"Analyze the following content for factual grounding in the provided sources.

Content to validate:
{content}

Source documents:
{sources}

Evaluate:
1. Are claims in the content supported by the sources?
2. Are there any unsupported or potentially false claims?
3. Is the content accurately representing the source information?

Provide a score from 0-1 and list any hallucinated claims."#
    )
}

fn coverage_prompt(content: &str, queries: &str) -> String {
    format!(
        r#"Evaluate how well the content covers the intended queries.

Content:
{content}

Intended queries:
{queries}

Assess:
1. Does the content address all the queries?
2. Are there any gaps in coverage?
3. Is the depth of coverage appropriate?

Provide a score from 0-1 and list any coverage gaps."#
    )
}

fn readability_prompt(content: &str) -> String {
    format!(
        r#"Assess the readability and quality of the content.

Content:
{content}

Evaluate:
1. Is the writing clear and coherent?
2. Is the grammar and structure correct?
3. Is the tone appropriate for the audience?
4. Is the content well-organized?

Provide a score from 0-1 and list any issues."#
    )
}

// =============================================================================
// Content Validator
// =============================================================================

pub struct ContentValidator {
    generator: Arc<GenerationService>,
}

impl ContentValidator {
    pub fn new(generator: Arc<GenerationService>) -> Self {
        Self { generator }
    }

    /// Ask for an assessment; a failed call becomes a zero score
    async fn assess(&self, dimension: &str, prompt: &str) -> ParsedAssessment {
        match self.generator.generate(prompt).await {
            Ok(response) => parse_score_and_issues(&response),
            Err(e) => failed_assessment(dimension, &e),
        }
    }

    /// Grounding of `content` in rendered source documents
    pub async fn validate_grounding(&self, content: &str, sources: &[String]) -> ValidationResult {
        let prompt = grounding_prompt(content, &sources.join("\n\n"));
        let assessment = self.assess("Grounding", &prompt).await;

        ValidationResult {
            grounding_score: assessment.score,
            hallucinated_claims: assessment.issues,
            ..ValidationResult::titled("Grounding Validation")
        }
    }

    /// Coverage of the intended `queries` by `content`
    pub async fn validate_coverage(&self, content: &str, queries: &[String]) -> ValidationResult {
        let queries_text = queries
            .iter()
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n");
        let assessment = self
            .assess("Coverage", &coverage_prompt(content, &queries_text))
            .await;

        ValidationResult {
            coverage_score: assessment.score,
            coverage_gaps: assessment.issues,
            ..ValidationResult::titled("Coverage Validation")
        }
    }

    pub async fn validate_readability(&self, content: &str) -> ValidationResult {
        let assessment = self
            .assess("Readability", &readability_prompt(content))
            .await;

        ValidationResult {
            readability_score: assessment.score,
            readability_issues: assessment.issues,
            ..ValidationResult::titled("Readability Validation")
        }
    }

    /// All three dimensions plus the weighted overall score
    pub async fn validate_comprehensive(
        &self,
        content: &str,
        sources: &[String],
        queries: &[String],
    ) -> ValidationResult {
        let grounding = self.validate_grounding(content, sources).await;
        let coverage = self.validate_coverage(content, queries).await;
        let readability = self.validate_readability(content).await;

        let mut combined = ValidationResult {
            grounding_score: grounding.grounding_score,
            coverage_score: coverage.coverage_score,
            readability_score: readability.readability_score,
            hallucinated_claims: grounding.hallucinated_claims,
            coverage_gaps: coverage.coverage_gaps,
            readability_issues: readability.readability_issues,
            ..ValidationResult::titled("Comprehensive Validation")
        };
        combined.calculate_overall_score();
        combined
    }

    /// Validate every drafted section against its research and queries
    pub async fn validate_sections(
        &self,
        state: &RunState,
        pool_size: usize,
    ) -> BTreeMap<String, ValidationResult> {
        let units: Vec<String> = state
            .ordered_drafts()
            .map(|(title, _)| title.to_string())
            .collect();

        let outcome = fan_out(units, pool_size, |section: String| async move {
            let draft = state
                .section_drafts
                .get(&section)
                .map(String::as_str)
                .unwrap_or_default();
            let sources = state
                .section_research
                .get(&section)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let queries = state
                .section_queries
                .get(&section)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let result = self.validate_comprehensive(draft, sources, queries).await;
            debug!(
                section = %section,
                overall = result.overall_score,
                issues = result.issue_count(),
                "Section validated"
            );
            Ok::<_, ReportError>(result)
        })
        .await;

        outcome.unwrap_or_else(|e| {
            warn!("Section validation incomplete: {}", e);
            BTreeMap::new()
        })
    }
}

fn failed_assessment(dimension: &str, e: &ReportError) -> ParsedAssessment {
    error!("{} validation failed: {}", dimension, e);
    ParsedAssessment {
        score: 0.0,
        issues: vec![format!("Validation error: {}", e)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::metrics::create_shared_metrics;
    use crate::ai::provider::{LlmProvider, LlmResponse};
    use crate::ai::retry::RetryPolicy;
    use crate::types::Result;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::time::Duration;

    /// Fails any prompt containing `fail_on`, otherwise returns `reply`
    struct Assessor {
        reply: &'static str,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl LlmProvider for Assessor {
        async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
            if let Some(marker) = self.fail_on
                && prompt.contains(marker)
            {
                return Err(ReportError::generation("model overloaded"));
            }
            Ok(LlmResponse::text_only(self.reply))
        }

        fn name(&self) -> &str {
            "assessor"
        }

        fn model(&self) -> &str {
            "assessor-model"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn validator(reply: &'static str, fail_on: Option<&'static str>) -> ContentValidator {
        let generator = GenerationService::new(
            Arc::new(Assessor { reply, fail_on }),
            RetryPolicy::immediate(1),
            create_shared_metrics(),
            Duration::from_secs(5),
        );
        ContentValidator::new(Arc::new(generator))
    }

    #[tokio::test]
    async fn test_comprehensive_weights() {
        let validator = validator("Score: 0.5\nIssue: vague wording", None);
        let result = validator
            .validate_comprehensive("text", &["**s**\nc\n(u)".into()], &["q".into()])
            .await;

        assert_eq!(result.section_title, "Comprehensive Validation");
        assert!((result.overall_score - 0.5).abs() < 1e-9);
        assert_eq!(result.hallucinated_claims, vec!["vague wording"]);
        assert_eq!(result.coverage_gaps, vec!["vague wording"]);
        assert_eq!(result.readability_issues, vec!["vague wording"]);
    }

    #[tokio::test]
    async fn test_failed_dimension_scores_zero() {
        let validator = validator("Score: 1.0", Some("intended queries"));
        let coverage = validator.validate_coverage("text", &["q".into()]).await;

        assert_eq!(coverage.section_title, "Coverage Validation");
        assert_eq!(coverage.coverage_score, 0.0);
        assert_eq!(coverage.coverage_gaps.len(), 1);
        assert!(coverage.coverage_gaps[0].starts_with("Validation error:"));

        let combined = validator
            .validate_comprehensive("text", &[], &["q".into()])
            .await;
        // grounding 1.0 * 0.4 + coverage 0 + readability 1.0 * 0.2
        assert!((combined.overall_score - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_validate_sections_keys_by_title() {
        let validator = validator("Rating: 80", None);
        let mut state = RunState::new("t").unwrap();
        state.section_titles = vec!["A".into(), "B".into(), "C".into()];
        state.section_drafts.insert("A".into(), "draft a".into());
        state.section_drafts.insert("C".into(), "draft c".into());

        let results = validator.validate_sections(&state, 2).await;
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["A", "C"]);
        assert!((results["A"].readability_score - 0.8).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_overall_score_in_unit_interval(
            g in 0.0f64..=1.0,
            c in 0.0f64..=1.0,
            r in 0.0f64..=1.0,
        ) {
            let mut result = ValidationResult {
                grounding_score: g,
                coverage_score: c,
                readability_score: r,
                ..ValidationResult::default()
            };
            let overall = result.calculate_overall_score();
            prop_assert!((0.0..=1.0).contains(&overall));
        }
    }
}

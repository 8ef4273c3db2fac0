//! Report Quality Check
//!
//! Rule-based checks on the compiled report (length bounds, required and
//! forbidden keywords) plus a pluggable heuristic score. The heuristic is not
//! calibrated against human judgment; swap in another [`QualityScorer`] to
//! change it.

use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::constants::validation as validation_constants;

// =============================================================================
// Scorers
// =============================================================================

/// Heuristic quality score in `[0, 1]` for a piece of text
pub trait QualityScorer: Send + Sync {
    fn score(&self, content: &str) -> f64;

    fn name(&self) -> &str;
}

/// Length plus structural markers: paragraph breaks, headings, citations
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralScorer;

impl StructuralScorer {
    /// Characters at which the length component saturates
    const FULL_LENGTH: f64 = 1000.0;
}

impl QualityScorer for StructuralScorer {
    fn score(&self, content: &str) -> f64 {
        let length = (content.chars().count() as f64 / Self::FULL_LENGTH).min(1.0);

        let mut structure: f64 = 0.5;
        if content.contains("\n\n") {
            structure += 0.2;
        }
        if content.contains("##") {
            structure += 0.2;
        }
        if content.contains('(') && content.contains(')') {
            structure += 0.1;
        }

        ((length + structure) / 2.0).clamp(0.0, 1.0)
    }

    fn name(&self) -> &str {
        "structural"
    }
}

// =============================================================================
// Criteria and Report
// =============================================================================

#[derive(Debug, Clone)]
pub struct ValidationCriteria {
    pub min_length: usize,
    pub max_length: usize,
    pub required_keywords: Vec<String>,
    pub forbidden_keywords: Vec<String>,
}

impl Default for ValidationCriteria {
    fn default() -> Self {
        Self::from(&ValidationConfig::default())
    }
}

impl From<&ValidationConfig> for ValidationCriteria {
    fn from(config: &ValidationConfig) -> Self {
        Self {
            min_length: config.min_length,
            max_length: config.max_length,
            required_keywords: config.required_keywords.clone(),
            forbidden_keywords: config.forbidden_keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub length_ok: bool,
    pub content_length: usize,
    pub word_count: usize,
    pub issues: Vec<String>,
    /// `1 - 0.1 * issues`, floored at zero
    pub quality_score: f64,
    pub heuristic_score: f64,
}

/// Check a compiled report against the criteria
pub fn check_report_quality(
    content: &str,
    criteria: &ValidationCriteria,
    scorer: &dyn QualityScorer,
) -> QualityReport {
    let length = content.chars().count();
    let lower = content.to_lowercase();
    let mut issues = Vec::new();

    if length < criteria.min_length {
        issues.push(format!(
            "Content too short: {} chars (min: {})",
            length, criteria.min_length
        ));
    }
    if length > criteria.max_length {
        issues.push(format!(
            "Content too long: {} chars (max: {})",
            length, criteria.max_length
        ));
    }

    let missing: Vec<&str> = criteria
        .required_keywords
        .iter()
        .filter(|k| !lower.contains(&k.to_lowercase()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        issues.push(format!("Missing required keywords: {:?}", missing));
    }

    let forbidden: Vec<&str> = criteria
        .forbidden_keywords
        .iter()
        .filter(|k| lower.contains(&k.to_lowercase()))
        .map(String::as_str)
        .collect();
    if !forbidden.is_empty() {
        issues.push(format!("Found forbidden keywords: {:?}", forbidden));
    }

    let quality_score =
        (1.0 - issues.len() as f64 * validation_constants::ISSUE_PENALTY).max(0.0);

    QualityReport {
        length_ok: (criteria.min_length..=criteria.max_length).contains(&length),
        content_length: length,
        word_count: content.split_whitespace().count(),
        issues,
        quality_score,
        heuristic_score: scorer.score(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer(f64);

    impl QualityScorer for FixedScorer {
        fn score(&self, _content: &str) -> f64 {
            self.0
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_structural_scorer() {
        let scorer = StructuralScorer;
        assert!((scorer.score("") - 0.25).abs() < 1e-9);

        let rich = format!("## Heading\n\n{} (source)", "x".repeat(1200));
        assert!((scorer.score(&rich) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_clean_report_has_no_issues() {
        let content = "Solar capacity grew quickly. ".repeat(10);
        let report =
            check_report_quality(&content, &ValidationCriteria::default(), &FixedScorer(0.7));

        assert!(report.length_ok);
        assert!(report.issues.is_empty());
        assert_eq!(report.quality_score, 1.0);
        assert_eq!(report.word_count, 40);
        assert_eq!(report.heuristic_score, 0.7);
    }

    #[test]
    fn test_issue_messages_and_penalty() {
        let criteria = ValidationCriteria {
            min_length: 50,
            max_length: 100,
            required_keywords: vec!["Solar".into(), "wind".into()],
            forbidden_keywords: vec!["lorem".into()],
        };
        let report = check_report_quality("solar LOREM", &criteria, &StructuralScorer);

        assert!(!report.length_ok);
        assert_eq!(
            report.issues,
            vec![
                "Content too short: 11 chars (min: 50)",
                "Missing required keywords: [\"wind\"]",
                "Found forbidden keywords: [\"lorem\"]",
            ]
        );
        assert!((report.quality_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_too_long_report() {
        let criteria = ValidationCriteria {
            min_length: 0,
            max_length: 5,
            required_keywords: Vec::new(),
            forbidden_keywords: Vec::new(),
        };
        let report = check_report_quality("too long text", &criteria, &StructuralScorer);
        assert_eq!(report.issues, vec!["Content too long: 13 chars (max: 5)"]);
        assert!((report.quality_score - 0.9).abs() < 1e-9);
    }
}

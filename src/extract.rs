//! Best-Effort Text Extraction
//!
//! Heuristic parsers that pull structure out of free-form model output.
//! None of these functions fail: malformed input yields an empty list or the
//! documented fallback value, and callers treat a poor parse as a data-quality
//! problem rather than an error.
//!
//! | Function | Fallback |
//! |---|---|
//! | [`parse_list_items`] | empty list |
//! | [`parse_section_titles`] | empty list |
//! | [`find_section_description`] | `"Description not available"` |
//! | [`parse_score_and_issues`] | score `0.5`, no issues |

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{report as report_constants, validation as validation_constants};

static NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").ok());

/// Characters removed from the front of a list line
const ENUMERATION_CHARS: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', '-', ')', ' ', '\t',
];

/// Extract list entries from a numbered or bulleted response.
///
/// A line qualifies when, after trimming, it starts with a digit or a dash.
/// Leading enumeration characters are stripped; lines that are empty after
/// stripping are dropped.
pub fn parse_list_items(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            line.chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit() || c == '-')
        })
        .map(|line| line.trim_start_matches(ENUMERATION_CHARS).trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Title declared on an outline name line, if the line is one
fn name_line_title(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let rest = trimmed
        .strip_prefix("- **Name:**")
        .or_else(|| trimmed.strip_prefix("- Name:"))?;

    let title = rest
        .trim()
        .trim_matches('*')
        .trim()
        .trim_end_matches(|c: char| c == ':' || c.is_whitespace());

    (!title.is_empty()).then(|| title.to_string())
}

/// Extract section titles from a structured outline.
///
/// Titles come from lines of the form `- **Name:** Title` (or `- Name: Title`).
/// Other lines are ignored. Duplicate titles keep their first position only.
pub fn parse_section_titles(outline: &str) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for title in outline.lines().filter_map(name_line_title) {
        if !titles.contains(&title) {
            titles.push(title);
        }
    }
    titles
}

/// Find the description that follows a section's name line in the outline.
///
/// The line after the matching name line must read `- Description: ...`
/// (asterisks ignored). Falls back to `"Description not available"`.
pub fn find_section_description(outline: &str, title: &str) -> String {
    let lines: Vec<&str> = outline.lines().collect();

    let Some(index) = lines
        .iter()
        .position(|line| name_line_title(line).as_deref() == Some(title))
    else {
        return report_constants::MISSING_DESCRIPTION.to_string();
    };

    lines
        .get(index + 1)
        .map(|next| next.replace('*', ""))
        .filter(|next| next.trim().starts_with("- Description"))
        .and_then(|next| {
            next.split_once(':')
                .map(|(_, description)| description.trim().to_string())
        })
        .filter(|description| !description.is_empty())
        .unwrap_or_else(|| report_constants::MISSING_DESCRIPTION.to_string())
}

/// Score and flagged issues parsed from a validation response
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAssessment {
    /// In `[0, 1]`
    pub score: f64,
    pub issues: Vec<String>,
}

/// Extract a 0-1 score and issue strings from a validation response.
///
/// The score is the first number on the first line mentioning "score" or
/// "rating"; values above 1 are read as percentages. Lines mentioning
/// "issue", "problem" or "gap" contribute the text after their first colon.
pub fn parse_score_and_issues(response: &str) -> ParsedAssessment {
    let mut score: Option<f64> = None;
    let mut issues = Vec::new();

    for line in response.lines() {
        let lower = line.to_lowercase();

        if lower.contains("score") || lower.contains("rating") {
            if score.is_none() {
                score = first_number(line).map(normalize_score);
            }
            continue;
        }

        if (lower.contains("issue") || lower.contains("problem") || lower.contains("gap"))
            && let Some((_, rest)) = line.split_once(':')
        {
            let issue = rest.trim();
            if !issue.is_empty() {
                issues.push(issue.to_string());
            }
        }
    }

    ParsedAssessment {
        score: score.unwrap_or(validation_constants::DEFAULT_SCORE),
        issues,
    }
}

fn first_number(line: &str) -> Option<f64> {
    NUMBER
        .as_ref()?
        .find(line)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn normalize_score(raw: f64) -> f64 {
    let score = if raw > 1.0 { raw / 100.0 } else { raw };
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_numbered_list() {
        let text = "Here are the questions:\n\
                    1. What is Rust?\n\
                    2) Why async?\n\
                    - How does tokio schedule tasks?\n\
                    \n\
                    Some closing remark";
        assert_eq!(
            parse_list_items(text),
            vec![
                "What is Rust?",
                "Why async?",
                "How does tokio schedule tasks?"
            ]
        );
    }

    #[test]
    fn test_parse_list_drops_bare_markers() {
        assert!(parse_list_items("1.\n-\n---").is_empty());
        assert!(parse_list_items("").is_empty());
    }

    #[test]
    fn test_parse_section_titles_both_forms() {
        let outline = "\
Report outline:
   - **Name:** Market Overview:
   - **Description:** Size and growth of the market.
   - **Research:** True
   - Name: Key Players
   - Description: Who leads the market.
   - **Name:** Market Overview
   Not a title line";

        assert_eq!(
            parse_section_titles(outline),
            vec!["Market Overview", "Key Players"]
        );
    }

    #[test]
    fn test_find_section_description() {
        let outline = "\
- **Name:** Market Overview
- **Description:** Size and growth: past and future.
- Name: Key Players
- Research: True";

        assert_eq!(
            find_section_description(outline, "Market Overview"),
            "Size and growth: past and future."
        );
        assert_eq!(
            find_section_description(outline, "Key Players"),
            "Description not available"
        );
        assert_eq!(
            find_section_description(outline, "Absent"),
            "Description not available"
        );
    }

    #[test]
    fn test_parse_score_variants() {
        let parsed = parse_score_and_issues("Score: 0.85\nIssue: unsupported claim about revenue");
        assert!((parsed.score - 0.85).abs() < 1e-9);
        assert_eq!(parsed.issues, vec!["unsupported claim about revenue"]);

        let percent = parse_score_and_issues("Overall rating: 72/100");
        assert!((percent.score - 0.72).abs() < 1e-9);

        let first_wins = parse_score_and_issues("Score: 0.4\nFinal score: 0.9");
        assert!((first_wins.score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_parse_score_defaults() {
        let parsed = parse_score_and_issues("Looks fine overall.\nGap without colon");
        assert_eq!(parsed.score, 0.5);
        assert!(parsed.issues.is_empty());

        let huge = parse_score_and_issues("Score: 950");
        assert_eq!(huge.score, 1.0);
    }

    #[test]
    fn test_coverage_gap_lines() {
        let parsed = parse_score_and_issues(
            "Coverage score: 0.6\n- Gap: pricing is not discussed\n- Problem: no sources for 2023",
        );
        assert_eq!(
            parsed.issues,
            vec!["pricing is not discussed", "no sources for 2023"]
        );
    }

    proptest! {
        #[test]
        fn prop_score_always_in_unit_interval(text in "\\PC{0,400}") {
            let parsed = parse_score_and_issues(&text);
            prop_assert!((0.0..=1.0).contains(&parsed.score));
        }

        #[test]
        fn prop_list_items_never_empty_strings(text in "[0-9.\\- a-z\\n]{0,300}") {
            for item in parse_list_items(&text) {
                prop_assert!(!item.is_empty());
            }
        }

        #[test]
        fn prop_titles_are_trimmed(text in "(- \\*\\*Name:\\*\\* [a-zA-Z :]{0,20}\\n){0,8}") {
            for title in parse_section_titles(&text) {
                prop_assert_eq!(title.trim(), title.as_str());
                prop_assert!(!title.ends_with(':'));
            }
        }
    }
}

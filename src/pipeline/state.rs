//! Run State
//!
//! The single aggregate threaded through every stage. Only the orchestrator
//! mutates it; stages receive it by reference and return their output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ReportError, Result};

/// Run status in strict forward order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Initialized,
    PlanningQueriesGenerated,
    OutlineGenerated,
    SectionQueriesGenerated,
    ResearchCompleted,
    DraftsCompleted,
    SectionsFormatted,
    FinalSectionsCompleted,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::PlanningQueriesGenerated => "planning_queries_generated",
            Self::OutlineGenerated => "outline_generated",
            Self::SectionQueriesGenerated => "section_queries_generated",
            Self::ResearchCompleted => "research_completed",
            Self::DraftsCompleted => "drafts_completed",
            Self::SectionsFormatted => "sections_formatted",
            Self::FinalSectionsCompleted => "final_sections_completed",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,

    // Planning
    #[serde(default)]
    pub plan_queries: Vec<String>,
    #[serde(default)]
    pub report_outline: Option<String>,
    /// Derived once from the outline, never changed afterwards
    #[serde(default)]
    pub section_titles: Vec<String>,

    // Research
    #[serde(default)]
    pub section_queries: BTreeMap<String, Vec<String>>,
    /// Markdown-rendered search results per section
    #[serde(default)]
    pub section_research: BTreeMap<String, Vec<String>>,

    // Writing
    #[serde(default)]
    pub section_drafts: BTreeMap<String, String>,
    #[serde(default)]
    pub formatted_body: Option<String>,
    #[serde(default)]
    pub intro: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub compiled_report: Option<String>,

    // Tracking
    #[serde(default)]
    pub total_characters: usize,
    /// Seconds from pipeline entry to the end of the final stage
    #[serde(default)]
    pub processing_time: f64,
    /// Append-only
    #[serde(default)]
    pub error_messages: Vec<String>,
}

impl RunState {
    /// Fresh state for a topic. A blank topic cannot start a run.
    pub fn new(topic: &str) -> Result<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ReportError::InvalidTopic(
                "topic must not be empty".to_string(),
            ));
        }
        Ok(Self::blank(topic))
    }

    fn blank(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            created_at: Utc::now(),
            status: RunStatus::Initialized,
            plan_queries: Vec::new(),
            report_outline: None,
            section_titles: Vec::new(),
            section_queries: BTreeMap::new(),
            section_research: BTreeMap::new(),
            section_drafts: BTreeMap::new(),
            formatted_body: None,
            intro: None,
            conclusion: None,
            compiled_report: None,
            total_characters: 0,
            processing_time: 0.0,
            error_messages: Vec::new(),
        }
    }

    /// Terminal state for a run that could not start
    pub fn error_only(topic: &str, message: impl Into<String>) -> Self {
        let mut state = Self::blank(topic);
        state.error_messages.push(message.into());
        state
    }

    /// Move status forward. Requests to stay or go back are ignored.
    pub fn advance(&mut self, to: RunStatus) -> bool {
        if to > self.status {
            self.status = to;
            true
        } else {
            debug!(current = %self.status, requested = %to, "Ignoring non-forward status change");
            false
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error_messages.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.error_messages.is_empty()
    }

    /// Section titles paired with their draft, in outline order
    pub fn ordered_drafts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.section_titles.iter().filter_map(|title| {
            self.section_drafts
                .get(title)
                .map(|draft| (title.as_str(), draft.as_str()))
        })
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        debug!("Run state saved to {}", path.display());
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// `<dir>/<topic-slug>-<timestamp>.json`
    pub fn checkpoint_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!(
            "{}-{}.json",
            slugify(&self.topic),
            self.created_at.format("%Y%m%dT%H%M%S")
        ))
    }
}

/// Lowercase ASCII slug with single dashes, at most 50 characters
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.chars().take(50).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "report".to_string()
    } else {
        slug.to_string()
    }
}

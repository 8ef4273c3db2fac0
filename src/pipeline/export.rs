//! Exported Report Artifact
//!
//! The JSON document written by `generate -o`. It always carries the error
//! list so a consumer can tell a clean run from a degraded one even when the
//! status reads `completed`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::state::{RunState, RunStatus};
use crate::ai::metrics::MetricsSummary;
use crate::types::{Result, ResultExt};
use crate::validation::{QualityReport, ValidationResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetrics {
    pub total_characters: usize,
    /// Seconds
    pub processing_time: f64,
    pub sections: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportExport {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    pub report: Option<String>,
    pub metrics: ExportMetrics,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_metrics: Option<MetricsSummary>,
    /// Per-section validation, keyed by section title
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validation: BTreeMap<String, ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
}

impl ReportExport {
    pub fn from_state(state: &RunState) -> Self {
        Self {
            topic: state.topic.clone(),
            timestamp: Utc::now(),
            status: state.status,
            report: state.compiled_report.clone(),
            metrics: ExportMetrics {
                total_characters: state.total_characters,
                processing_time: state.processing_time,
                sections: state.section_titles.len(),
                errors: state.error_messages.len(),
            },
            errors: state.error_messages.clone(),
            system_metrics: None,
            validation: BTreeMap::new(),
            quality: None,
        }
    }

    pub fn with_system_metrics(mut self, summary: MetricsSummary) -> Self {
        self.system_metrics = Some(summary);
        self
    }

    pub fn with_validation(mut self, results: BTreeMap<String, ValidationResult>) -> Self {
        self.validation = results;
        self
    }

    pub fn with_quality(mut self, report: QualityReport) -> Self {
        self.quality = Some(report);
        self
    }

    /// Write as pretty JSON, creating parent directories
    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context_fn(|| format!("Creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context_fn(|| format!("Writing report to {}", path.display()))?;
        info!("Report saved to: {}", path.display());
        Ok(())
    }
}

// src/cli/report.rs — Merge workflow output and projection into one report

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::tier::ConsultationPlan;
use crate::core::sentinel;
use crate::core::types::{BusinessContext, VisualizationArtifact, WorkflowState};
use crate::projection::{ChartData, ProjectionSeries};
use crate::provider::TokenUsage;

pub const NO_STRATEGY: &str = "No strategy was generated.";

#[derive(Debug, Clone, Serialize)]
pub struct ConsultationReport {
    pub id: String,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
    pub business: BusinessContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    pub plan_used: ConsultationPlan,
    pub refined_strategy: String,
    pub critique_score: Option<u8>,
    pub visualization: Option<VisualizationArtifact>,
    pub visualization_data: ChartData,
    pub break_even_month: Option<usize>,
    pub refinement_count: u32,
    pub target_revenue: Option<f64>,
    pub processing_time_secs: u64,
    pub model_used: String,
    pub token_usage: TokenUsage,
}

/// Caller-side facts the workflow state does not carry.
pub struct ReportMeta {
    pub plan: ConsultationPlan,
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub target_revenue: Option<f64>,
    pub elapsed: Duration,
    pub model_used: String,
}

impl ConsultationReport {
    pub fn build(state: WorkflowState, projection: &ProjectionSeries, meta: ReportMeta) -> Self {
        let created_at = Utc::now();
        let short = uuid::Uuid::new_v4().simple().to_string();
        let refined_strategy = state
            .refined_strategy
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_STRATEGY)
            .to_string();

        if sentinel::is_sentinel(&refined_strategy) {
            tracing::warn!(
                correlation_id = %state.correlation_id,
                "Report carries placeholder strategy: {}",
                refined_strategy
            );
        }

        Self {
            id: format!("c-{}-{}", created_at.timestamp(), &short[..8]),
            correlation_id: state.correlation_id,
            created_at,
            business: state.business,
            business_name: meta.business_name,
            industry: meta.industry,
            plan_used: meta.plan,
            refined_strategy,
            critique_score: state.critique_score,
            visualization: state.visualization,
            visualization_data: projection.chart_data(),
            break_even_month: projection.break_even_month(),
            refinement_count: state.current_round,
            target_revenue: meta.target_revenue,
            processing_time_secs: meta.elapsed.as_secs(),
            model_used: meta.model_used,
            token_usage: state.token_usage,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write `<dir>/<id>.json`, creating `dir` if needed.
    pub fn save(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", self.id));
        std::fs::write(&path, self.to_json()?)?;
        Ok(path)
    }
}

// src/cli/input.rs — Business profile files (TOML or JSON)

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::core::types::{BusinessContext, BusinessStage};
use crate::infra::errors::ConsultError;

/// Raw profile as written by the user, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsultationInput {
    pub business_type: String,
    pub business_stage: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub team_size: Option<u32>,
    #[serde(default)]
    pub monthly_revenue: Option<f64>,
    #[serde(default)]
    pub monthly_expenses: Option<f64>,
    pub main_goal: String,
    #[serde(default)]
    pub other_goals: Vec<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub target_revenue: Option<f64>,
}

impl ConsultationInput {
    /// Parse by extension: `.json` as JSON, anything else as TOML.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading business profile {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let input = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON profile {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("parsing TOML profile {}", path.display()))?
        };
        Ok(input)
    }

    /// Validated context for the workflow.
    pub fn business(&self) -> Result<BusinessContext, ConsultError> {
        let stage: BusinessStage = self.business_stage.parse()?;
        BusinessContext {
            business_type: self.business_type.clone(),
            business_stage: stage,
            location: self.location.clone(),
            team_size: self.team_size,
            monthly_revenue: self.monthly_revenue,
            monthly_expenses: self.monthly_expenses,
            main_goal: self.main_goal.clone(),
            other_goals: self.other_goals.clone(),
        }
        .validate()
    }

    /// Lines appended to the seed message under `Additional context:`.
    pub fn extra_context(&self, target: Option<f64>) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(name) = non_blank(&self.business_name) {
            lines.push(format!("Business name: {name}"));
        }
        if let Some(industry) = non_blank(&self.industry) {
            lines.push(format!("Industry: {industry}"));
        }
        if let Some(t) = target.filter(|t| t.is_finite() && *t > 0.0) {
            lines.push(format!("Target monthly revenue: {}", format_usd(t)));
        }
        lines
    }
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `$12,345.60` style formatting.
pub fn format_usd(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{:02}", cents % 100)
}

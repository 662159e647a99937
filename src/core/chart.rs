// src/core/chart.rs — Declarative chart specs parsed from visualizer output

use serde::{Deserialize, Serialize};

use super::types::VisualizationArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Area,
    Pie,
    Waterfall,
    Funnel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub values: Vec<f64>,
}

/// A chart description. Data only; nothing in it is ever executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
}

impl ChartSpec {
    /// Non-empty series, each with one value per label (when labels are given).
    pub fn is_well_formed(&self) -> bool {
        !self.series.is_empty()
            && self.series.iter().all(|s| {
                !s.values.is_empty()
                    && s.values.iter().all(|v| v.is_finite())
                    && (self.labels.is_empty() || s.values.len() == self.labels.len())
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ChartSpec>),
    One(ChartSpec),
}

/// Remove a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `python`, ...) on the opening line
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Classify raw visualizer output.
///
/// Blank output is `Unavailable`; well-formed specs become `Charts`;
/// anything else is kept verbatim (fence-stripped) as `Raw`.
pub fn parse_visualization(output: &str) -> VisualizationArtifact {
    let cleaned = strip_code_fences(output);
    if cleaned.is_empty() {
        return VisualizationArtifact::Unavailable;
    }

    let specs = match serde_json::from_str::<OneOrMany>(cleaned) {
        Ok(OneOrMany::Many(specs)) => specs,
        Ok(OneOrMany::One(spec)) => vec![spec],
        Err(e) => {
            tracing::debug!("Visualizer output is not a chart spec: {}", e);
            return VisualizationArtifact::Raw(cleaned.to_string());
        }
    };

    if !specs.is_empty() && specs.iter().all(ChartSpec::is_well_formed) {
        VisualizationArtifact::Charts(specs)
    } else {
        VisualizationArtifact::Raw(cleaned.to_string())
    }
}

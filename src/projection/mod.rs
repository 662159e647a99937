// src/projection/mod.rs — Deterministic 12-month revenue and cash-flow projection

pub mod chart_data;

use serde::Serialize;

use crate::core::types::BusinessContext;

pub use chart_data::ChartData;

pub const DEFAULT_MONTHS: usize = 12;
/// Target used when there is no revenue and no target.
pub const DEFAULT_TARGET: f64 = 25_000.0;
/// Target multiplier over current revenue when no target is given.
pub const DEFAULT_TARGET_MULTIPLIER: f64 = 1.5;
/// Floor for the projection's starting revenue.
pub const MIN_START: f64 = 1_000.0;
pub const MIN_GROWTH: f64 = 1.01;
pub const MAX_GROWTH: f64 = 1.25;
/// Expense reduction reached by the final month.
pub const EXPENSE_IMPROVEMENT: f64 = 0.10;

/// Unrounded values behind one emitted point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    pub projected: f64,
    pub current: f64,
    pub inflow: f64,
    pub outflow: f64,
    pub net: f64,
    pub cumulative: f64,
}

/// One month, monetary values rounded to whole units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub month: String,
    pub projected: f64,
    pub current: f64,
    pub inflow: f64,
    pub outflow: f64,
    pub net: f64,
    /// Sum of unrounded nets, rounded once.
    pub cumulative: f64,
    #[serde(skip)]
    raw: RawPoint,
}

impl ProjectionPoint {
    fn from_raw(month: usize, raw: RawPoint) -> Self {
        Self {
            month: format!("M{month}"),
            projected: round_money(raw.projected),
            current: round_money(raw.current),
            inflow: round_money(raw.inflow),
            outflow: round_money(raw.outflow),
            net: round_money(raw.net),
            cumulative: round_money(raw.cumulative),
            raw,
        }
    }

    pub fn raw(&self) -> &RawPoint {
        &self.raw
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionSeries {
    pub start: f64,
    pub end: f64,
    pub target: f64,
    pub growth_factor: f64,
    pub points: Vec<ProjectionPoint>,
}

impl ProjectionSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 1-based month where cumulative net first reaches zero or above.
    pub fn break_even_month(&self) -> Option<usize> {
        self.points
            .iter()
            .position(|p| p.raw.cumulative >= 0.0)
            .map(|i| i + 1)
    }

    pub fn chart_data(&self) -> ChartData {
        ChartData::from_series(self)
    }
}

/// Half away from zero, without a negative zero.
fn round_money(value: f64) -> f64 {
    let rounded = value.round();
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0)
}

/// Per-month compound factor from `start` to `end`, clamped to [1.01, 1.25].
pub fn growth_factor(start: f64, end: f64, months: usize) -> f64 {
    let steps = months.saturating_sub(1).max(1) as f64;
    let raw = (end / start).powf(1.0 / steps);
    if raw.is_nan() {
        return MIN_GROWTH;
    }
    raw.clamp(MIN_GROWTH, MAX_GROWTH)
}

/// Target a projection aims for when the caller gives none (or a non-positive one).
pub fn effective_target(current_revenue: f64, target: Option<f64>) -> f64 {
    match target.filter(|t| t.is_finite() && *t > 0.0) {
        Some(t) => t,
        None if current_revenue <= 0.0 => DEFAULT_TARGET,
        None => current_revenue * DEFAULT_TARGET_MULTIPLIER,
    }
}

/// Project revenue, expenses and cumulative net over `months` months.
///
/// Never projects downward, and a pure function of its inputs. `months = 0`
/// yields an empty series.
pub fn project(context: &BusinessContext, target: Option<f64>, months: usize) -> ProjectionSeries {
    let current_revenue = non_negative(context.monthly_revenue);
    let expenses = non_negative(context.monthly_expenses);

    let target = effective_target(current_revenue, target);
    let start = current_revenue.max(MIN_START);
    let end = target.max(start);
    let growth = growth_factor(start, end, months);
    let steps = months.saturating_sub(1).max(1) as f64;
    let baseline = if current_revenue > 0.0 { current_revenue } else { start };

    let mut cumulative = 0.0;
    let points = (1..=months)
        .map(|m| {
            let elapsed = (m - 1) as f64;
            let projected = start * growth.powf(elapsed);
            let outflow = expenses * (1.0 - EXPENSE_IMPROVEMENT * elapsed / steps);
            let net = projected - outflow;
            cumulative += net;
            ProjectionPoint::from_raw(
                m,
                RawPoint {
                    projected,
                    current: baseline,
                    inflow: projected,
                    outflow,
                    net,
                    cumulative,
                },
            )
        })
        .collect();

    ProjectionSeries {
        start,
        end,
        target,
        growth_factor: growth,
        points,
    }
}

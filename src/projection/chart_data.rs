// src/projection/chart_data.rs — Dashboard chart groups derived from a projection

use serde::Serialize;

use super::ProjectionSeries;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePoint {
    pub month: String,
    pub projected: f64,
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashflowPoint {
    pub month: String,
    pub inflow: f64,
    pub outflow: f64,
    pub net: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakEvenPoint {
    pub month: String,
    pub cumulative: f64,
    /// Reference line, always zero.
    pub break_even_point: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub revenue_projection: Vec<RevenuePoint>,
    pub cashflow_data: Vec<CashflowPoint>,
    pub break_even_timeline: Vec<BreakEvenPoint>,
}

impl ChartData {
    pub fn from_series(series: &ProjectionSeries) -> Self {
        let points = &series.points;
        Self {
            revenue_projection: points
                .iter()
                .map(|p| RevenuePoint {
                    month: p.month.clone(),
                    projected: p.projected,
                    current: p.current,
                })
                .collect(),
            cashflow_data: points
                .iter()
                .map(|p| CashflowPoint {
                    month: p.month.clone(),
                    inflow: p.inflow,
                    outflow: p.outflow,
                    net: p.net,
                })
                .collect(),
            break_even_timeline: points
                .iter()
                .map(|p| BreakEvenPoint {
                    month: p.month.clone(),
                    cumulative: p.cumulative,
                    break_even_point: 0.0,
                })
                .collect(),
        }
    }
}

//! Chart Data - Aligned series for the comparative charts
//!
//! The renderer only draws; everything it needs (axis order, zero fill,
//! scaling, unit costs) is prepared here.

use crate::categories::StandardCategory;
use crate::extractor::Breakdown;
use crate::profile::ProcessProfile;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Display scale for cost axes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitScale {
    #[default]
    #[serde(rename = "€")]
    Unit,
    #[serde(rename = "k€")]
    Thousand,
    #[serde(rename = "m€")]
    Million,
}

impl UnitScale {
    pub fn factor(&self) -> f64 {
        match self {
            UnitScale::Unit => 1.0,
            UnitScale::Thousand => 1e-3,
            UnitScale::Million => 1e-6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitScale::Unit => "€",
            UnitScale::Thousand => "k€",
            UnitScale::Million => "m€",
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        value * self.factor()
    }

    /// Axis label with the unit appended, dropping a stale "(€)" suffix
    pub fn axis_label(&self, base: &str) -> String {
        format!("{} ({})", base.replace("(€)", "").trim(), self.label())
    }
}

impl fmt::Display for UnitScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for UnitScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "€" | "1" | "unit" => Ok(UnitScale::Unit),
            "k€" | "k" | "thousand" => Ok(UnitScale::Thousand),
            "m€" | "m" | "million" => Ok(UnitScale::Million),
            other => Err(format!("unknown unit scale '{}' (expected €, k€ or m€)", other)),
        }
    }
}

/// Grouped bars for one breakdown across scenarios
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BreakdownComparison {
    pub title: String,
    pub scenarios: Vec<String>,
    /// Union of item names, largest total first
    pub items: Vec<String>,
    /// One row per scenario, aligned with `items`
    pub values: Vec<Vec<f64>>,
}

impl BreakdownComparison {
    pub fn build(title: &str, breakdowns: &[(&str, &Breakdown)]) -> Self {
        let scenarios: Vec<String> = breakdowns.iter().map(|(name, _)| name.to_string()).collect();

        let encountered: Vec<&str> = breakdowns
            .iter()
            .flat_map(|(_, b)| b.names())
            .unique()
            .collect();
        let totals: HashMap<&str, f64> = encountered
            .iter()
            .map(|item| {
                let total = breakdowns
                    .iter()
                    .map(|(_, b)| b.get(item).unwrap_or(0.0))
                    .sum::<f64>();
                (*item, total)
            })
            .collect();
        let items: Vec<String> = encountered
            .iter()
            .sorted_by(|a, b| totals[*b].total_cmp(&totals[*a]))
            .map(|s| s.to_string())
            .collect();

        let values = breakdowns
            .iter()
            .map(|(_, b)| items.iter().map(|i| b.get(i).unwrap_or(0.0)).collect::<Vec<f64>>())
            .collect();

        Self {
            title: title.to_string(),
            scenarios,
            items,
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn scaled(&self, scale: UnitScale) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|row| row.iter().map(|v| scale.apply(*v)).collect::<Vec<f64>>())
                .collect(),
            ..self.clone()
        }
    }
}

/// The four comparative charts built from process profiles
pub fn profile_comparisons(profiles: &[ProcessProfile]) -> Vec<BreakdownComparison> {
    type Getter = fn(&ProcessProfile) -> &Breakdown;
    let charts: [(&str, Getter); 4] = [
        ("Operating Costs", |p| &p.operating_costs),
        ("Material Costs", |p| &p.material_costs),
        ("Consumable Costs", |p| &p.consumable_costs),
        ("Utility Costs", |p| &p.utility_costs),
    ];

    charts
        .iter()
        .map(|(title, getter)| {
            let series: Vec<(&str, &Breakdown)> = profiles
                .iter()
                .map(|p| (p.name.as_str(), getter(p)))
                .collect();
            BreakdownComparison::build(title, &series)
        })
        .collect()
}

/// Unit production cost of one scenario, split by standard category
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitCostBar {
    pub scenario: String,
    pub currency: String,
    /// Aligned with `StandardCategory::ALL`
    pub segments: Vec<f64>,
    pub total: f64,
}

/// Stacked unit production cost chart data
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitCostStack {
    pub categories: Vec<StandardCategory>,
    pub bars: Vec<UnitCostBar>,
}

impl UnitCostStack {
    /// Annual operating cost per category divided by the annual production
    /// rate; a zero rate gives zero unit costs.
    pub fn build(profiles: &[ProcessProfile]) -> Self {
        let bars = profiles
            .iter()
            .map(|p| {
                let per_unit = |cost: f64| {
                    if p.annual_rate != 0.0 {
                        cost / p.annual_rate
                    } else {
                        0.0
                    }
                };
                let segments = StandardCategory::ALL
                    .iter()
                    .map(|c| per_unit(p.operating_costs.get(c.label()).unwrap_or(0.0)))
                    .collect();
                UnitCostBar {
                    scenario: p.name.clone(),
                    currency: p.currency.clone(),
                    segments,
                    total: per_unit(p.operating_costs.total()),
                }
            })
            .collect();

        Self {
            categories: StandardCategory::ALL.to_vec(),
            bars,
        }
    }
}

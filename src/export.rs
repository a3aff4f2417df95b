//! Export - Comparison tables as JSON or long-format CSV
//!
//! JSON keeps the nested `scenario → section → category` shape used for
//! caching; CSV goes through a polars DataFrame with one row per value.

use crate::aggregator::ComparisonTable;
use crate::chart_data::BreakdownComparison;
use crate::error::{ExtractError, Result};
use polars::prelude::*;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Output encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn read_comparison(path: &Path) -> Result<ComparisonTable> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// One row per (scenario, section, category) in table order
pub fn comparison_to_dataframe(table: &ComparisonTable) -> Result<DataFrame> {
    let capacity = table.scenarios.len() * table.sections.len() * table.categories.len();
    let mut scenarios = Vec::with_capacity(capacity);
    let mut sections = Vec::with_capacity(capacity);
    let mut categories = Vec::with_capacity(capacity);
    let mut values = Vec::with_capacity(capacity);

    for scenario in &table.scenarios {
        for section in &table.sections {
            for category in &table.categories {
                scenarios.push(scenario.as_str());
                sections.push(section.as_str());
                categories.push(category.label());
                values.push(table.value(scenario, section, *category));
            }
        }
    }

    let df = DataFrame::new(vec![
        Series::new("scenario", scenarios),
        Series::new("section", sections),
        Series::new("category", categories),
        Series::new("value", values),
    ])?;
    Ok(df)
}

/// One row per (scenario, item)
pub fn breakdown_to_dataframe(chart: &BreakdownComparison) -> Result<DataFrame> {
    let mut scenarios = Vec::new();
    let mut items = Vec::new();
    let mut values = Vec::new();

    for (scenario, row) in chart.scenarios.iter().zip(&chart.values) {
        for (item, value) in chart.items.iter().zip(row) {
            scenarios.push(scenario.as_str());
            items.push(item.as_str());
            values.push(*value);
        }
    }

    let df = DataFrame::new(vec![
        Series::new("scenario", scenarios),
        Series::new("item", items),
        Series::new("value", values),
    ])?;
    Ok(df)
}

pub fn dataframe_to_csv(df: &mut DataFrame) -> Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buf).include_header(true).finish(df)?;
    String::from_utf8(buf).map_err(|e| ExtractError::Export(e.to_string()))
}

pub fn comparison_to_csv(table: &ComparisonTable) -> Result<String> {
    let mut df = comparison_to_dataframe(table)?;
    dataframe_to_csv(&mut df)
}

/// Write the table to `path` in the chosen format
pub fn write_comparison(table: &ComparisonTable, path: &Path, format: ExportFormat) -> Result<()> {
    let body = match format {
        ExportFormat::Json => to_json(table)?,
        ExportFormat::Csv => comparison_to_csv(table)?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)?;
    info!("Comparison table written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::StandardCategory;
    use crate::extractor::{Breakdown, Dimension};
    use std::collections::BTreeMap;

    fn small_table() -> ComparisonTable {
        let mut per_category = BTreeMap::new();
        for c in StandardCategory::ALL {
            per_category.insert(c, 0.0);
        }
        per_category.insert(StandardCategory::Labor, 1000.0);
        let mut per_section = BTreeMap::new();
        per_section.insert("Fermentation".to_string(), per_category);
        let mut values = BTreeMap::new();
        values.insert("Baseline".to_string(), per_section);

        ComparisonTable {
            dimension: Dimension::Yearly,
            scenarios: vec!["Baseline".to_string()],
            sections: vec!["Fermentation".to_string()],
            categories: StandardCategory::ALL.to_vec(),
            values,
        }
    }

    #[test]
    fn test_dataframe_has_one_row_per_value() {
        let df = comparison_to_dataframe(&small_table()).unwrap();
        assert_eq!(df.height(), 7);
        assert_eq!(df.get_column_names(), vec!["scenario", "section", "category", "value"]);
    }

    #[test]
    fn test_csv_output() {
        let csv = comparison_to_csv(&small_table()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("scenario,section,category,value"));
        assert!(csv.contains("Baseline,Fermentation,Labor (OPEX),1000"));
    }

    #[test]
    fn test_json_uses_category_labels() {
        let json = to_json(&small_table()).unwrap();
        assert!(json.contains("\"Facility-dependent (CAPEX)\""));
        assert!(json.contains("\"dimension\": \"yearly\""));
        let back: ComparisonTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, small_table());
    }

    #[test]
    fn test_breakdown_frame() {
        let b: Breakdown = vec![("Glucose", 2.0)].into_iter().collect();
        let chart = BreakdownComparison::build("Material Costs", &[("A", &b), ("B", &b)]);
        let df = breakdown_to_dataframe(&chart).unwrap();
        assert_eq!(df.height(), 2);
    }
}

//! Process Profile - Per-scenario facts for comparative charts
//!
//! Besides the per-section costs, the comparative charts need the report's
//! currency, base year, annual production rate and the four cost breakdowns.

use crate::config::{BreakdownSpecs, CellRef};
use crate::extractor::{Breakdown, BreakdownSpec, CostExtractor};
use crate::grid::CellGrid;
use crate::number_format::{self, NumberFormat};
use crate::sections::LABEL_COLUMN;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

pub const DEFAULT_CURRENCY: &str = "$";
pub const DEFAULT_BASE_YEAR: i32 = 2024;

lazy_static! {
    static ref BASE_YEAR: Regex = Regex::new(r"(\d{4}).*?prices").expect("valid base year pattern");
    static ref TIMESTAMP_PREFIX: Regex = Regex::new(r"^\d+-").expect("valid timestamp pattern");
}

/// Standardized data of one scenario
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessProfile {
    pub name: String,
    pub currency: String,
    pub year: i32,
    pub number_format: NumberFormat,
    /// Main product throughput per year
    pub annual_rate: f64,
    pub operating_costs: Breakdown,
    pub material_costs: Breakdown,
    pub consumable_costs: Breakdown,
    pub utility_costs: Breakdown,
}

/// Header cells that carry report-level facts
#[derive(Clone, Debug)]
pub struct ProfileExtractor<'a> {
    extractor: &'a CostExtractor,
    breakdowns: BreakdownSpecs,
    currency_cell: CellRef,
    annual_rate_cell: CellRef,
}

impl<'a> ProfileExtractor<'a> {
    pub fn new(extractor: &'a CostExtractor) -> Self {
        Self {
            extractor,
            breakdowns: BreakdownSpecs::default(),
            currency_cell: CellRef::new(1, 3),
            annual_rate_cell: CellRef::new(6, 2),
        }
    }

    pub fn with_breakdowns(mut self, breakdowns: BreakdownSpecs) -> Self {
        self.breakdowns = breakdowns;
        self
    }

    pub fn with_header_cells(mut self, currency: CellRef, annual_rate: CellRef) -> Self {
        self.currency_cell = currency;
        self.annual_rate_cell = annual_rate;
        self
    }

    pub fn extract(&self, name: &str, grid: &CellGrid) -> ProcessProfile {
        let format = number_format::detect(grid);
        let breakdown =
            |spec: &BreakdownSpec| self.extractor.extract_breakdown_with_format(grid, spec, format);

        ProcessProfile {
            name: name.to_string(),
            currency: self.detect_currency(grid),
            year: detect_base_year(grid),
            number_format: format,
            annual_rate: self.annual_rate(grid, format),
            operating_costs: breakdown(&self.breakdowns.operating),
            material_costs: breakdown(&self.breakdowns.materials),
            consumable_costs: breakdown(&self.breakdowns.consumables),
            utility_costs: breakdown(&self.breakdowns.utilities),
        }
    }

    /// Euro exports are normalised to the symbol; anything else loses its spaces
    pub fn detect_currency(&self, grid: &CellGrid) -> String {
        match grid.value_at(self.currency_cell.row, self.currency_cell.column) {
            Some(raw) => {
                let currency = raw.trim();
                if currency.contains("EUR") || currency.contains('€') {
                    "€".to_string()
                } else {
                    currency.replace(' ', "")
                }
            }
            None => DEFAULT_CURRENCY.to_string(),
        }
    }

    fn annual_rate(&self, grid: &CellGrid, format: NumberFormat) -> f64 {
        number_format::parse_cell_or_default(
            grid.cell_at(self.annual_rate_cell.row, self.annual_rate_cell.column),
            format,
            "annual rate",
        )
        .value
    }
}

/// First "<year> ... prices" label in column 1
pub fn detect_base_year(grid: &CellGrid) -> i32 {
    grid.column(LABEL_COLUMN)
        .find_map(|cell| {
            BASE_YEAR
                .captures(&cell.value)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
        .unwrap_or(DEFAULT_BASE_YEAR)
}

/// Scenario name from a file path: the stem without a leading
/// `<digits>-` upload timestamp.
pub fn scenario_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    TIMESTAMP_PREFIX.replace(&stem, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;

    fn header_grid(currency: &str, rate: &str) -> CellGrid {
        CellGrid::new(
            vec![
                Cell::new(1, 1, "ECONOMIC EVALUATION REPORT"),
                Cell::new(1, 3, currency),
                Cell::new(2, 1, "1. EXECUTIVE SUMMARY (2023 prices)"),
                Cell::new(6, 1, "Main Product Rate"),
                Cell::new(6, 2, rate),
                Cell::new(9, 4, "1.000,00"),
                Cell::new(10, 1, "ANNUAL OPERATING COST (2023 prices) - PROCESS SUMMARY"),
                Cell::new(11, 1, "Cost Item"),
                Cell::new(12, 1, "Raw Materials"),
                Cell::new(12, 2, "12.500,00"),
                Cell::new(13, 1, "Labor-Dependent"),
                Cell::new(13, 2, "2.000,00"),
                Cell::new(14, 1, "TOTAL"),
                Cell::new(14, 2, "14.500,00"),
                Cell::new(15, 1, "10. PROFITABILITY ANALYSIS"),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_profile_from_eu_report() {
        let extractor = CostExtractor::new();
        let grid = header_grid("EUR ", "1.250,5");
        let profile = ProfileExtractor::new(&extractor).extract("Baseline", &grid);

        assert_eq!(profile.currency, "€");
        assert_eq!(profile.year, 2023);
        assert_eq!(profile.number_format, NumberFormat::Eu);
        assert_eq!(profile.annual_rate, 1250.5);
        assert_eq!(
            profile.operating_costs.names(),
            vec!["Raw materials (OPEX)", "Labor (OPEX)"]
        );
        assert_eq!(profile.operating_costs.get("Labor (OPEX)"), Some(2000.0));
        assert!(profile.material_costs.is_empty());
    }

    #[test]
    fn test_currency_fallbacks() {
        let extractor = CostExtractor::new();
        let profile_extractor = ProfileExtractor::new(&extractor);
        assert_eq!(profile_extractor.detect_currency(&header_grid("US $", "1")), "US$");
        let bare = CellGrid::new(vec![Cell::new(2, 1, "x")], None).unwrap();
        assert_eq!(profile_extractor.detect_currency(&bare), "$");
        assert_eq!(detect_base_year(&bare), DEFAULT_BASE_YEAR);
    }

    #[test]
    fn test_unparseable_rate_is_zero() {
        let extractor = CostExtractor::new();
        let profile = ProfileExtractor::new(&extractor).extract("x", &header_grid("$", "-"));
        assert_eq!(profile.annual_rate, 0.0);
    }

    #[test]
    fn test_scenario_name_strips_timestamp() {
        assert_eq!(
            scenario_name_from_path(Path::new("/tmp/1729777526733-mAb-fed-batch.json")),
            "mAb-fed-batch"
        );
        assert_eq!(scenario_name_from_path(Path::new("baseline.xlsx")), "baseline");
        assert_eq!(scenario_name_from_path(Path::new("v2-final.json")), "v2-final");
    }
}

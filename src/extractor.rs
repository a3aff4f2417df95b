//! Cost Extractor - Section costs and breakdown tables from one grid
//!
//! Two extraction modes:
//! - `extract`: standard category costs per process section, for one dimension
//! - `extract_breakdown`: one report block (operating, materials, ...) as an
//!   ordered item → cost map

use crate::categories::{CategoryClassifier, ItemRenamer, StandardCategory};
use crate::grid::CellGrid;
use crate::number_format::{self, ExtractedValue, NumberFormat};
use crate::sections::{Section, SectionLocator, LABEL_COLUMN};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Which cost metric to read
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Annual cost ($/year)
    Yearly,
    /// Cost per unit of main product ($/kg MP)
    PerUnit,
    /// Share of the total (%)
    Percentage,
}

impl Default for Dimension {
    fn default() -> Self {
        Dimension::Yearly
    }
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Yearly, Dimension::PerUnit, Dimension::Percentage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Yearly => "yearly",
            Dimension::PerUnit => "per_unit",
            Dimension::Percentage => "percentage",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "yearly" | "annual" => Ok(Dimension::Yearly),
            "per_unit" | "unit" => Ok(Dimension::PerUnit),
            "percentage" | "percent" | "%" => Ok(Dimension::Percentage),
            other => Err(format!("unknown dimension '{}'", other)),
        }
    }
}

/// Column holding each dimension's value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionColumns {
    pub yearly: u32,
    pub per_unit: u32,
    pub percentage: u32,
}

impl Default for DimensionColumns {
    fn default() -> Self {
        Self {
            yearly: 4,
            per_unit: 2,
            percentage: 5,
        }
    }
}

impl DimensionColumns {
    pub fn column(&self, dimension: Dimension) -> u32 {
        match dimension {
            Dimension::Yearly => self.yearly,
            Dimension::PerUnit => self.per_unit,
            Dimension::Percentage => self.percentage,
        }
    }
}

/// Category costs of one section
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectionCosts {
    pub name: String,
    pub costs: BTreeMap<StandardCategory, ExtractedValue>,
}

impl SectionCosts {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            costs: StandardCategory::ALL
                .iter()
                .map(|c| (*c, ExtractedValue::absent()))
                .collect(),
        }
    }

    pub fn value(&self, category: StandardCategory) -> f64 {
        self.costs.get(&category).map(|v| v.value).unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.costs.values().map(|v| v.value).sum()
    }
}

/// A labelled cost row the classifier could not place
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnmappedLabel {
    pub section: String,
    pub row: u32,
    pub label: String,
    pub suggestion: Option<String>,
}

/// A category row whose value cell did not parse
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvalidValue {
    pub section: String,
    pub category: StandardCategory,
    pub row: u32,
    pub raw: Option<String>,
}

/// Data-quality notes gathered during one extraction
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExtractionAudit {
    pub unmapped: Vec<UnmappedLabel>,
    pub invalid_values: Vec<InvalidValue>,
}

impl ExtractionAudit {
    pub fn is_clean(&self) -> bool {
        self.unmapped.is_empty() && self.invalid_values.is_empty()
    }
}

/// Costs of one scenario for one dimension
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioCostTable {
    pub dimension: Dimension,
    pub number_format: NumberFormat,
    sections: Vec<SectionCosts>,
    pub audit: ExtractionAudit,
}

impl ScenarioCostTable {
    pub fn empty(dimension: Dimension, number_format: NumberFormat) -> Self {
        Self {
            dimension,
            number_format,
            sections: Vec::new(),
            audit: ExtractionAudit::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections in discovery order
    pub fn sections(&self) -> &[SectionCosts] {
        &self.sections
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn section(&self, name: &str) -> Option<&SectionCosts> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Cost of a (section, category) pair; 0.0 when absent
    pub fn value(&self, section: &str, category: StandardCategory) -> f64 {
        self.section(section).map(|s| s.value(category)).unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.sections.iter().map(SectionCosts::total).sum()
    }

    /// (section, category) pairs that hold a fallback zero
    pub fn defaulted_fields(&self) -> Vec<(&str, StandardCategory)> {
        self.sections
            .iter()
            .flat_map(|s| {
                s.costs
                    .iter()
                    .filter(|(_, v)| v.defaulted)
                    .map(move |(c, _)| (s.name.as_str(), *c))
            })
            .collect()
    }

    fn section_mut(&mut self, name: &str) -> &mut SectionCosts {
        match self.sections.iter().position(|s| s.name == name) {
            Some(i) => &mut self.sections[i],
            None => {
                self.sections.push(SectionCosts::new(name));
                let last = self.sections.len() - 1;
                &mut self.sections[last]
            }
        }
    }
}

/// Bounds and value column of one breakdown block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownSpec {
    pub start_marker: String,
    #[serde(default)]
    pub end_marker: Option<String>,
    pub value_column: u32,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl BreakdownSpec {
    pub fn new(start_marker: &str, end_marker: Option<&str>, value_column: u32) -> Self {
        Self {
            start_marker: start_marker.to_string(),
            end_marker: end_marker.map(str::to_string),
            value_column,
            exclude_patterns: Vec::new(),
        }
    }

    pub fn excluding(mut self, patterns: &[&str]) -> Self {
        self.exclude_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// Ordered item → cost map; serializes as a JSON object
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Breakdown {
    items: Vec<(String, f64)>,
}

impl Breakdown {
    /// Insert or overwrite, keeping the position of the first insert
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.items.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.items.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.items.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.items.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(|(_, v)| v).sum()
    }
}

impl Serialize for Breakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.items.iter().map(|(n, v)| (n, v)))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Breakdown {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut breakdown = Breakdown::default();
        for (name, value) in iter {
            breakdown.insert(name, value);
        }
        breakdown
    }
}

/// Cost Extractor
#[derive(Clone, Debug)]
pub struct CostExtractor {
    columns: DimensionColumns,
    classifier: CategoryClassifier,
    locator: SectionLocator,
    renamer: ItemRenamer,
    suggestion_threshold: f64,
}

impl Default for CostExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CostExtractor {
    pub fn new() -> Self {
        Self {
            columns: DimensionColumns::default(),
            classifier: CategoryClassifier::default(),
            locator: SectionLocator::default(),
            renamer: ItemRenamer::default(),
            suggestion_threshold: 0.85,
        }
    }

    pub fn with_columns(mut self, columns: DimensionColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_classifier(mut self, classifier: CategoryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_locator(mut self, locator: SectionLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_renamer(mut self, renamer: ItemRenamer) -> Self {
        self.renamer = renamer;
        self
    }

    pub fn with_suggestion_threshold(mut self, threshold: f64) -> Self {
        self.suggestion_threshold = threshold;
        self
    }

    pub fn locator(&self) -> &SectionLocator {
        &self.locator
    }

    pub fn columns(&self) -> &DimensionColumns {
        &self.columns
    }

    /// Locate sections, find their cost blocks, then extract
    pub fn extract_grid(&self, grid: &CellGrid, dimension: Dimension) -> ScenarioCostTable {
        let sections = self.locator.locate(grid);
        let blocks = self.cost_blocks(grid, &sections);
        self.extract(grid, &blocks, dimension)
    }

    /// Row spans headed by a repeat of a section name, bounded by the
    /// labels this extractor can classify.
    pub fn cost_blocks(&self, grid: &CellGrid, sections: &[Section]) -> Vec<Section> {
        self.locator.labelled_blocks(grid, sections, |label| {
            self.classifier.category_of(label).is_some()
        })
    }

    /// Category costs per section for one dimension.
    ///
    /// Only column-1 labels inside each span are read. Every section starts
    /// with all seven categories at zero. A category row seen twice keeps the
    /// later value, unless the later cell does not parse.
    pub fn extract(
        &self,
        grid: &CellGrid,
        sections: &[Section],
        dimension: Dimension,
    ) -> ScenarioCostTable {
        let format = number_format::detect(grid);
        let mut table = ScenarioCostTable::empty(dimension, format);

        if sections.is_empty() {
            warn!("No process sections found in data");
            return table;
        }

        for section in sections {
            table.section_mut(&section.name);
        }

        let value_column = self.columns.column(dimension);
        info!(
            "Extracting {} costs from column {} for {} section span(s) ({} format)",
            dimension,
            value_column,
            sections.len(),
            format
        );

        let mut labels: Vec<_> = grid.column(LABEL_COLUMN).collect();
        labels.sort_by_key(|c| c.row);

        for section in sections {
            for cell in labels.iter().filter(|c| section.contains_row(c.row)) {
                let label = cell.text();
                if label.is_empty() || sections.iter().any(|s| s.name == label) {
                    continue;
                }
                let value_cell = grid.cell_at(cell.row, value_column);

                let Some(category) = self.classifier.category_of(label) else {
                    if value_cell.is_some() {
                        table.audit.unmapped.push(UnmappedLabel {
                            section: section.name.clone(),
                            row: cell.row,
                            label: label.to_string(),
                            suggestion: self
                                .classifier
                                .nearest_alias(label, self.suggestion_threshold)
                                .map(|(alias, _)| alias),
                        });
                    }
                    continue;
                };

                let context = format!("{} in {}", category, section.name);
                let extracted = number_format::parse_cell_or_default(value_cell, format, &context);
                if extracted.defaulted {
                    table.audit.invalid_values.push(InvalidValue {
                        section: section.name.clone(),
                        category,
                        row: cell.row,
                        raw: value_cell.map(|c| c.value.clone()),
                    });
                }

                let slot = table
                    .section_mut(&section.name)
                    .costs
                    .entry(category)
                    .or_default();
                if extracted.defaulted && !slot.defaulted {
                    continue;
                }
                *slot = extracted;
                debug!(
                    "Extracted cost - Section: {}, Category: {}, Value: {}",
                    section.name, category, extracted.value
                );
            }
        }

        if !table.audit.unmapped.is_empty() {
            warn!(
                "{} cost row(s) with unrecognised labels were skipped",
                table.audit.unmapped.len()
            );
        }
        table
    }

    /// Item costs of one report block.
    ///
    /// Rows strictly between the block's caption row and the end marker row
    /// are read. Blank names, "TOTAL" and excluded names are skipped; only
    /// strictly positive values are kept.
    pub fn extract_breakdown(&self, grid: &CellGrid, spec: &BreakdownSpec) -> Breakdown {
        let format = number_format::detect(grid);
        self.extract_breakdown_with_format(grid, spec, format)
    }

    pub fn extract_breakdown_with_format(
        &self,
        grid: &CellGrid,
        spec: &BreakdownSpec,
        format: NumberFormat,
    ) -> Breakdown {
        let mut breakdown = Breakdown::default();

        let Some(start_row) = grid
            .column(LABEL_COLUMN)
            .find(|c| c.value.contains(&spec.start_marker))
            .map(|c| c.row)
        else {
            debug!("Breakdown marker '{}' not found", spec.start_marker);
            return breakdown;
        };

        let Some(header_row) = grid
            .column(LABEL_COLUMN)
            .find(|c| c.row > start_row)
            .map(|c| c.row)
        else {
            return breakdown;
        };

        let end_row = spec.end_marker.as_deref().and_then(|marker| {
            grid.column(LABEL_COLUMN)
                .find(|c| c.row > header_row && c.value.contains(marker))
                .map(|c| c.row)
        });

        for cell in grid.column(LABEL_COLUMN) {
            if cell.row <= header_row || end_row.is_some_and(|end| cell.row >= end) {
                continue;
            }
            let name = cell.text();
            if name.is_empty()
                || name == "TOTAL"
                || spec.exclude_patterns.iter().any(|p| name.contains(p.as_str()))
            {
                continue;
            }

            let Some(value_cell) = grid.cell_at(cell.row, spec.value_column) else {
                continue;
            };
            match number_format::parse_cell(value_cell, format) {
                Some(cost) if cost > 0.0 => {
                    breakdown.insert(self.renamer.rename(name), cost);
                }
                Some(_) => {}
                None => debug!("Skipping non-numeric '{}' for {}", value_cell.value, name),
            }
        }

        breakdown
    }
}

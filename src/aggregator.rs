//! Multi-Scenario Aggregator - Merges per-scenario costs into one table
//!
//! Each scenario is extracted on its own; the only shared step is the final
//! merge, which unions the sections, orders them by total cost and fills
//! every missing (scenario, section, category) with zero.

use crate::categories::StandardCategory;
use crate::error::{ExtractError, Result};
use crate::extractor::{CostExtractor, Dimension, ExtractionAudit, ScenarioCostTable};
use crate::grid::{CellGrid, GridLoader};
use crate::profile::scenario_name_from_path;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One input file and its optional user label
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub path: PathBuf,
    pub label: Option<String>,
}

impl ScenarioInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label: None,
        }
    }

    pub fn labelled(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: Some(label.into()),
        }
    }

    /// The label, or the file name without its upload timestamp
    pub fn scenario_name(&self) -> String {
        match &self.label {
            Some(label) if !label.trim().is_empty() => label.trim().to_string(),
            _ => scenario_name_from_path(&self.path),
        }
    }
}

/// Pair files with labels. Labels are optional, but when given there must be
/// exactly one per file.
pub fn pair_inputs(files: &[PathBuf], labels: &[String]) -> Result<Vec<ScenarioInput>> {
    if files.is_empty() {
        return Err(ExtractError::Usage("at least one input file is required".to_string()));
    }
    if !labels.is_empty() && labels.len() != files.len() {
        return Err(ExtractError::Usage(format!(
            "Number of scenario names ({}) must match number of files ({})",
            labels.len(),
            files.len()
        )));
    }

    Ok(files
        .iter()
        .enumerate()
        .map(|(i, path)| ScenarioInput {
            path: path.clone(),
            label: labels.get(i).cloned(),
        })
        .collect())
}

/// A scenario whose file loaded
#[derive(Clone, Debug)]
pub struct LoadedScenario {
    pub name: String,
    pub path: PathBuf,
    pub grid: CellGrid,
}

/// A scenario that was skipped
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScenarioFailure {
    pub name: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Hands out scenario names, suffixing repeats with ` (2)`, ` (3)`, ...
#[derive(Default)]
struct UniqueNames {
    seen: HashMap<String, usize>,
}

impl UniqueNames {
    fn claim(&mut self, base: String) -> String {
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            return base;
        }
        let mut suffix = *count;
        let mut name = format!("{} ({})", base, suffix);
        while self.seen.contains_key(&name) {
            suffix += 1;
            name = format!("{} ({})", base, suffix);
        }
        warn!("Duplicate scenario name '{}', renaming to '{}'", base, name);
        self.seen.insert(name.clone(), 1);
        name
    }
}

/// Load every input; failures are collected, not raised.
///
/// Names are made unique by suffixing repeats with ` (2)`, ` (3)`, ...
pub fn load_scenarios(
    inputs: &[ScenarioInput],
    loader: &dyn GridLoader,
) -> (Vec<LoadedScenario>, Vec<ScenarioFailure>) {
    let mut loaded = Vec::new();
    let mut failures = Vec::new();
    let mut names = UniqueNames::default();

    for input in inputs {
        let name = names.claim(input.scenario_name());

        match loader.load(&input.path) {
            Ok(grid) => {
                info!("Loaded data for scenario: {}", name);
                loaded.push(LoadedScenario {
                    name,
                    path: input.path.clone(),
                    grid,
                });
            }
            Err(e) => {
                warn!("Error processing {}: {}", input.path.display(), e);
                failures.push(ScenarioFailure {
                    name,
                    path: input.path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    (loaded, failures)
}

/// Cross-scenario cost table handed to chart rendering
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub dimension: Dimension,
    /// Input order
    pub scenarios: Vec<String>,
    /// Descending by total cost; ties keep first-encounter order
    pub sections: Vec<String>,
    /// Always the seven standard categories, canonical order
    pub categories: Vec<StandardCategory>,
    /// scenario → section → category → cost, fully populated
    pub values: BTreeMap<String, BTreeMap<String, BTreeMap<StandardCategory, f64>>>,
}

impl ComparisonTable {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Cost of one cell of the table; 0.0 for anything unknown
    pub fn value(&self, scenario: &str, section: &str, category: StandardCategory) -> f64 {
        self.values
            .get(scenario)
            .and_then(|s| s.get(section))
            .and_then(|c| c.get(&category))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn section_total(&self, section: &str) -> f64 {
        self.scenarios
            .iter()
            .map(|scenario| {
                self.categories
                    .iter()
                    .map(|c| self.value(scenario, section, *c))
                    .sum::<f64>()
            })
            .sum()
    }

    pub fn scenario_total(&self, scenario: &str) -> f64 {
        self.sections
            .iter()
            .flat_map(|section| self.categories.iter().map(move |c| (section, c)))
            .map(|(section, c)| self.value(scenario, section, *c))
            .sum()
    }

    /// Values of one stacked layer, aligned with `sections`
    pub fn series(&self, scenario: &str, category: StandardCategory) -> Vec<f64> {
        self.sections
            .iter()
            .map(|section| self.value(scenario, section, category))
            .collect()
    }
}

/// Per-scenario outcome of a file-based run
#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub path: PathBuf,
    pub sections_found: usize,
    pub defaulted_fields: usize,
    pub audit: ExtractionAudit,
}

/// Result of `aggregate_files`
#[derive(Clone, Debug, Serialize)]
pub struct AggregationOutcome {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub table: ComparisonTable,
    pub scenarios: Vec<ScenarioReport>,
    pub failures: Vec<ScenarioFailure>,
}

impl AggregationOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Multi-Scenario Aggregator
pub struct MultiScenarioAggregator {
    extractor: CostExtractor,
    dimension: Dimension,
}

impl Default for MultiScenarioAggregator {
    fn default() -> Self {
        Self::new(CostExtractor::new())
    }
}

impl MultiScenarioAggregator {
    pub fn new(extractor: CostExtractor) -> Self {
        Self {
            extractor,
            dimension: Dimension::Yearly,
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn extractor(&self) -> &CostExtractor {
        &self.extractor
    }

    /// Extract every scenario independently
    pub fn extract_all(&self, named_grids: &[(String, CellGrid)]) -> Vec<(String, ScenarioCostTable)> {
        named_grids
            .iter()
            .map(|(name, grid)| {
                info!("Processing data for: {}", name);
                (name.clone(), self.extractor.extract_grid(grid, self.dimension))
            })
            .collect()
    }

    pub fn aggregate(&self, named_grids: &[(String, CellGrid)]) -> ComparisonTable {
        let tables = self.extract_all(named_grids);
        merge(self.dimension, &tables)
    }

    /// Load, extract and merge a list of files.
    ///
    /// Files that fail to load are reported in the outcome and skipped. Only
    /// when nothing loads is the run an error.
    pub fn aggregate_files(
        &self,
        inputs: &[ScenarioInput],
        loader: &dyn GridLoader,
    ) -> Result<AggregationOutcome> {
        let (loaded, failures) = load_scenarios(inputs, loader);
        if loaded.is_empty() {
            return Err(ExtractError::NoUsableScenarios(inputs.len()));
        }

        let named: Vec<(String, CellGrid)> = loaded
            .iter()
            .map(|s| (s.name.clone(), s.grid.clone()))
            .collect();
        let tables = self.extract_all(&named);

        let scenarios = loaded
            .iter()
            .zip(&tables)
            .map(|(scenario, (_, table))| ScenarioReport {
                name: scenario.name.clone(),
                path: scenario.path.clone(),
                sections_found: table.sections().len(),
                defaulted_fields: table.defaulted_fields().len(),
                audit: table.audit.clone(),
            })
            .collect();

        let table = merge(self.dimension, &tables);
        info!(
            "Aggregated {} scenario(s) into {} section(s), {} failed",
            table.scenarios.len(),
            table.sections.len(),
            failures.len()
        );

        Ok(AggregationOutcome {
            run_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            table,
            scenarios,
            failures,
        })
    }
}

/// Merge extracted scenarios into a comparison table
pub fn merge(dimension: Dimension, tables: &[(String, ScenarioCostTable)]) -> ComparisonTable {
    let categories = StandardCategory::ALL.to_vec();
    let mut names = UniqueNames::default();
    let scenarios: Vec<String> = tables.iter().map(|(name, _)| names.claim(name.clone())).collect();

    let encountered: Vec<String> = tables
        .iter()
        .flat_map(|(_, table)| table.section_names())
        .unique()
        .map(str::to_string)
        .collect();

    let totals: HashMap<&str, f64> = encountered
        .iter()
        .map(|section| {
            let total = tables
                .iter()
                .filter_map(|(_, table)| table.section(section))
                .map(|costs| categories.iter().map(|c| costs.value(*c)).sum::<f64>())
                .sum::<f64>();
            (section.as_str(), total)
        })
        .collect();

    let sections: Vec<String> = encountered
        .iter()
        .sorted_by(|a, b| totals[b.as_str()].total_cmp(&totals[a.as_str()]))
        .cloned()
        .collect();
    debug!("All sections after sorting: {:?}", sections);

    let values = scenarios
        .iter()
        .zip(tables)
        .map(|(name, (_, table))| {
            let per_section = sections
                .iter()
                .map(|section| {
                    let per_category = categories
                        .iter()
                        .map(|c| (*c, table.value(section, *c)))
                        .collect::<BTreeMap<_, _>>();
                    (section.clone(), per_category)
                })
                .collect::<BTreeMap<_, _>>();
            (name.clone(), per_section)
        })
        .collect();

    ComparisonTable {
        dimension,
        scenarios,
        sections,
        categories,
        values,
    }
}

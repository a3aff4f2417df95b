use crate::categories::{CategoryClassifier, ItemRenamer, StandardCategory, SubstringRule};
use crate::error::{ExtractError, Result};
use crate::extractor::{BreakdownSpec, CostExtractor, Dimension, DimensionColumns};
use crate::grid::loader::{AutoLoader, DEFAULT_PAGE_KEY};
use crate::profile::ProfileExtractor;
use crate::sections::{SectionLocator, SectionMarkers};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "EER_COSTS_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// The four report blocks read into a process profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakdownSpecs {
    pub operating: BreakdownSpec,
    pub materials: BreakdownSpec,
    pub consumables: BreakdownSpec,
    pub utilities: BreakdownSpec,
}

impl Default for BreakdownSpecs {
    fn default() -> Self {
        Self {
            operating: BreakdownSpec::new("ANNUAL OPERATING COST", Some("10."), 2),
            materials: BreakdownSpec::new("MATERIALS COST", Some("6."), 5),
            consumables: BreakdownSpec::new("VARIOUS CONSUMABLES COST", Some("9."), 5),
            utilities: BreakdownSpec::new("UTILITIES COST", Some("7."), 5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderCells {
    pub currency: CellRef,
    pub annual_rate: CellRef,
}

impl Default for HeaderCells {
    fn default() -> Self {
        Self {
            currency: CellRef::new(1, 3),
            annual_rate: CellRef::new(6, 2),
        }
    }
}

/// Report layout and label tables. Every field has a default matching the
/// current report version, so a config file only lists what differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Page key inside JSON exports
    pub page_key: String,
    pub dimension: Dimension,
    pub columns: DimensionColumns,
    pub sections: SectionMarkers,
    /// Labels added to (or overriding) the built-in alias table
    pub category_aliases: BTreeMap<String, StandardCategory>,
    /// Enable substring rules after exact aliases
    pub heuristics: bool,
    /// Replaces the built-in substring rules when set
    pub rules: Option<Vec<SubstringRule>>,
    pub item_renames: BTreeMap<String, String>,
    pub breakdowns: BreakdownSpecs,
    pub header_cells: HeaderCells,
    /// Minimum Jaro-Winkler score for alias suggestions on unmapped labels
    pub suggestion_threshold: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            page_key: DEFAULT_PAGE_KEY.to_string(),
            dimension: Dimension::default(),
            columns: DimensionColumns::default(),
            sections: SectionMarkers::default(),
            category_aliases: BTreeMap::new(),
            heuristics: false,
            rules: None,
            item_renames: BTreeMap::new(),
            breakdowns: BreakdownSpecs::default(),
            header_cells: HeaderCells::default(),
            suggestion_threshold: 0.85,
        }
    }
}

impl ExtractionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExtractError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ExtractError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, else from `EER_COSTS_CONFIG`, else defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(env_path) if !env_path.trim().is_empty() => Self::load(env_path.trim()),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let columns = [
            ("yearly", self.columns.yearly),
            ("per_unit", self.columns.per_unit),
            ("percentage", self.columns.percentage),
        ];
        if let Some((name, _)) = columns.iter().find(|(_, c)| *c == 0) {
            return Err(ExtractError::Config(format!(
                "column for '{}' must be 1 or greater",
                name
            )));
        }
        if self.sections.header_terms.iter().all(|t| t.trim().is_empty()) {
            return Err(ExtractError::Config(
                "sections.header_terms must contain at least one term".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.suggestion_threshold) {
            return Err(ExtractError::Config(
                "suggestion_threshold must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn classifier(&self) -> CategoryClassifier {
        let mut classifier = CategoryClassifier::new()
            .with_aliases(self.category_aliases.iter().map(|(k, v)| (k.clone(), *v)))
            .with_heuristics(self.heuristics);
        if let Some(rules) = &self.rules {
            classifier = classifier.with_rules(rules.clone());
        }
        classifier
    }

    pub fn extractor(&self) -> CostExtractor {
        CostExtractor::new()
            .with_columns(self.columns)
            .with_classifier(self.classifier())
            .with_locator(SectionLocator::new(self.sections.clone()))
            .with_renamer(ItemRenamer::default().with_renames(self.item_renames.clone()))
            .with_suggestion_threshold(self.suggestion_threshold)
    }

    pub fn loader(&self) -> AutoLoader {
        AutoLoader::with_page_key(self.page_key.clone())
    }

    pub fn profile_extractor<'a>(&self, extractor: &'a CostExtractor) -> ProfileExtractor<'a> {
        ProfileExtractor::new(extractor)
            .with_breakdowns(self.breakdowns.clone())
            .with_header_cells(self.header_cells.currency, self.header_cells.annual_rate)
    }
}

//! Cost Categories - Standardized buckets and label classification
//!
//! Source reports label the same cost with different strings depending on the
//! report version ("Waste Trtmt/Disp" vs "Waste Treatment/Disposal"). The
//! classifier maps them onto the seven standard categories.
//!
//! Precedence:
//! 1. Exact alias match on the trimmed label
//! 2. Substring rules, in declaration order, only when heuristics are enabled
//!
//! Anything else is unmapped and the caller skips it.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use strsim::jaro_winkler;

/// The seven standard cost categories, in canonical stacking order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StandardCategory {
    #[serde(rename = "Raw materials (OPEX)")]
    RawMaterials,
    #[serde(rename = "Labor (OPEX)")]
    Labor,
    #[serde(rename = "Utilities (OPEX)")]
    Utilities,
    #[serde(rename = "Consumables (OPEX)")]
    Consumables,
    #[serde(rename = "Wastewater treatment (OPEX)")]
    WastewaterTreatment,
    #[serde(rename = "Laboratory/QC/QA (OPEX)")]
    LaboratoryQcQa,
    #[serde(rename = "Facility-dependent (CAPEX)")]
    FacilityDependent,
}

impl StandardCategory {
    pub const ALL: [StandardCategory; 7] = [
        StandardCategory::RawMaterials,
        StandardCategory::Labor,
        StandardCategory::Utilities,
        StandardCategory::Consumables,
        StandardCategory::WastewaterTreatment,
        StandardCategory::LaboratoryQcQa,
        StandardCategory::FacilityDependent,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StandardCategory::RawMaterials => "Raw materials (OPEX)",
            StandardCategory::Labor => "Labor (OPEX)",
            StandardCategory::Utilities => "Utilities (OPEX)",
            StandardCategory::Consumables => "Consumables (OPEX)",
            StandardCategory::WastewaterTreatment => "Wastewater treatment (OPEX)",
            StandardCategory::LaboratoryQcQa => "Laboratory/QC/QA (OPEX)",
            StandardCategory::FacilityDependent => "Facility-dependent (CAPEX)",
        }
    }

    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.label()).collect()
    }

    pub fn is_capex(&self) -> bool {
        matches!(self, StandardCategory::FacilityDependent)
    }
}

impl fmt::Display for StandardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for StandardCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.label() == s.trim())
            .copied()
            .ok_or_else(|| format!("unknown cost category '{}'", s))
    }
}

lazy_static! {
    /// Row labels used by the known report versions
    pub static ref DEFAULT_ALIASES: Vec<(&'static str, StandardCategory)> = vec![
        ("Materials", StandardCategory::RawMaterials),
        ("Raw Materials", StandardCategory::RawMaterials),
        ("Labor", StandardCategory::Labor),
        ("Labor-Dependent", StandardCategory::Labor),
        ("Utilities", StandardCategory::Utilities),
        ("Consumables", StandardCategory::Consumables),
        ("Waste Trtmt/Disp", StandardCategory::WastewaterTreatment),
        ("Waste Treatment/Disposal", StandardCategory::WastewaterTreatment),
        ("Lab/QC/QA", StandardCategory::LaboratoryQcQa),
        ("Laboratory/QC/QA", StandardCategory::LaboratoryQcQa),
        ("Facility", StandardCategory::FacilityDependent),
        ("Facility-Dependent", StandardCategory::FacilityDependent),
    ];

    /// Substring rules tried after aliases when heuristics are on
    pub static ref DEFAULT_RULES: Vec<SubstringRule> = vec![
        SubstringRule::new("waste", StandardCategory::WastewaterTreatment),
        SubstringRule::new("qc", StandardCategory::LaboratoryQcQa),
        SubstringRule::new("lab/", StandardCategory::LaboratoryQcQa),
        SubstringRule::new("facility", StandardCategory::FacilityDependent),
        SubstringRule::new("labor", StandardCategory::Labor),
        SubstringRule::new("material", StandardCategory::RawMaterials),
        SubstringRule::new("utilit", StandardCategory::Utilities),
        SubstringRule::new("consumable", StandardCategory::Consumables),
    ];
}

/// Case-insensitive containment rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstringRule {
    pub contains: String,
    pub category: StandardCategory,
}

impl SubstringRule {
    pub fn new(contains: &str, category: StandardCategory) -> Self {
        Self {
            contains: contains.to_lowercase(),
            category,
        }
    }
}

/// How a label was classified
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Alias(StandardCategory),
    Heuristic(StandardCategory),
    Unmapped,
}

impl Classification {
    pub fn category(&self) -> Option<StandardCategory> {
        match self {
            Classification::Alias(c) | Classification::Heuristic(c) => Some(*c),
            Classification::Unmapped => None,
        }
    }
}

/// Maps raw row labels to standard categories
#[derive(Clone, Debug)]
pub struct CategoryClassifier {
    aliases: HashMap<String, StandardCategory>,
    rules: Vec<SubstringRule>,
    heuristics: bool,
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryClassifier {
    /// Default alias table, heuristics off
    pub fn new() -> Self {
        Self {
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(label, cat)| (label.to_string(), *cat))
                .collect(),
            rules: DEFAULT_RULES.clone(),
            heuristics: false,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (S, StandardCategory)>,
        S: Into<String>,
    {
        for (label, category) in aliases {
            self.aliases.insert(label.into().trim().to_string(), category);
        }
        self
    }

    pub fn with_rules(mut self, rules: Vec<SubstringRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_heuristics(mut self, enabled: bool) -> Self {
        self.heuristics = enabled;
        self
    }

    pub fn classify(&self, label: &str) -> Classification {
        let label = label.trim();
        if let Some(category) = self.aliases.get(label) {
            return Classification::Alias(*category);
        }

        if self.heuristics && !label.is_empty() {
            let lowered = label.to_lowercase();
            if let Some(rule) = self.rules.iter().find(|r| lowered.contains(&r.contains)) {
                return Classification::Heuristic(rule.category);
            }
        }

        Classification::Unmapped
    }

    pub fn category_of(&self, label: &str) -> Option<StandardCategory> {
        self.classify(label).category()
    }

    /// Closest known alias for an unmapped label, for audit output
    pub fn nearest_alias(&self, label: &str, threshold: f64) -> Option<(String, f64)> {
        let needle = label.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.aliases
            .keys()
            .map(|alias| (alias.clone(), jaro_winkler(&needle, &alias.to_lowercase())))
            .filter(|(_, score)| *score >= threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }
}

lazy_static! {
    /// Display names for breakdown items. Operating cost rows are renamed to
    /// the standard category labels so unit cost stacks can find them.
    pub static ref DEFAULT_ITEM_RENAMES: Vec<(&'static str, &'static str)> = vec![
        ("Prot-A Reg Buff", "Strip Buffer"),
        ("Prot-A Wash Buf", "Wash Buffer"),
        ("Protein A eluti", "Eluti. Buffer"),
        ("Protein A Equil", "Equil. Buffer"),
        ("Trisodium citra", "Trisodium citrate"),
        ("Dft DEF Cartridge", "DEF Cartridge"),
        ("Dft PBA Chrom Resin", "Chrom. Resin"),
        ("Waste Treatment/Disposal", "Wastewater treatment (OPEX)"),
        ("Labor-Dependent", "Labor (OPEX)"),
        ("Utilities", "Utilities (OPEX)"),
        ("Consumables", "Consumables (OPEX)"),
        ("Raw Materials", "Raw materials (OPEX)"),
        ("Laboratory/QC/QA", "Laboratory/QC/QA (OPEX)"),
        ("Facility-Dependent", "Facility-dependent (CAPEX)"),
    ];
}

/// Exact-match rename table for breakdown item names
#[derive(Clone, Debug)]
pub struct ItemRenamer {
    renames: HashMap<String, String>,
}

impl Default for ItemRenamer {
    fn default() -> Self {
        Self {
            renames: DEFAULT_ITEM_RENAMES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

impl ItemRenamer {
    pub fn with_renames<I, K, V>(mut self, renames: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.renames
            .extend(renames.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn rename<'a>(&'a self, name: &'a str) -> &'a str {
        self.renames.get(name).map(String::as_str).unwrap_or(name)
    }
}

pub mod aggregator;
pub mod categories;
pub mod chart_data;
pub mod config;
pub mod error;
pub mod export;
pub mod extractor;
pub mod grid;
pub mod number_format;
pub mod profile;
pub mod sections;

pub use aggregator::{
    AggregationOutcome, ComparisonTable, MultiScenarioAggregator, ScenarioFailure, ScenarioInput,
};
pub use categories::{CategoryClassifier, StandardCategory};
pub use config::ExtractionConfig;
pub use error::{ExtractError, Result};
pub use extractor::{CostExtractor, Dimension, ScenarioCostTable};
pub use grid::{Cell, CellGrid};
pub use number_format::NumberFormat;
pub use profile::ProcessProfile;

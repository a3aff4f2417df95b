use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Grid error: {0}")]
    Grid(String),

    #[error("Failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("No usable scenarios: all {0} input(s) failed to load")]
    NoUsableScenarios(usize),

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ExtractError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<polars::prelude::PolarsError> for ExtractError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        ExtractError::Export(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

//! Cell Grid - Position-addressed view of one report page
//!
//! Every extraction step works on a `CellGrid`: the flat list of
//! `(row, column, value)` cells an EER export is made of. Rows and columns
//! are 1-based, the way the exports address them.

pub mod loader;

pub use loader::{loader_for_path, AutoLoader, CsvGridLoader, GridLoader, JsonGridLoader};
#[cfg(feature = "xlsx")]
pub use loader::XlsxGridLoader;

use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single addressable cell
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCell")]
pub struct Cell {
    pub row: u32,
    pub column: u32,
    pub value: String,
    /// Typed number in the source; `value` is then plain `f64` text and is
    /// not subject to the report's separator convention.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub numeric: bool,
}

impl Cell {
    pub fn new(row: u32, column: u32, value: impl Into<String>) -> Self {
        Self {
            row,
            column,
            value: value.into(),
            numeric: false,
        }
    }

    pub fn number(row: u32, column: u32, value: f64) -> Self {
        Self {
            row,
            column,
            value: value.to_string(),
            numeric: true,
        }
    }

    /// Value with surrounding whitespace removed
    pub fn text(&self) -> &str {
        self.value.trim()
    }
}

/// Wire shape of a cell. Exports are not consistent about quoting numbers,
/// so any scalar is accepted and kept as text.
#[derive(Deserialize)]
struct RawCell {
    row: u32,
    column: u32,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    numeric: bool,
}

impl From<RawCell> for Cell {
    fn from(raw: RawCell) -> Self {
        let numeric = raw.numeric || raw.value.is_number();
        let value = match raw.value {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        };
        Self {
            row: raw.row,
            column: raw.column,
            value,
            numeric,
        }
    }
}

/// Serialized shape of a grid: `{"cells": [...], "max_row": n}`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridDocument {
    pub cells: Vec<Cell>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_column: Option<u32>,
}

/// One parsed report page
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "GridDocument", into = "GridDocument")]
pub struct CellGrid {
    cells: Vec<Cell>,
    max_row: u32,
    max_column: u32,
    index: HashMap<(u32, u32), usize>,
}

impl CellGrid {
    /// Build a grid from cells in file order.
    ///
    /// `max_row` is taken as reported by the export but never smaller than the
    /// last occupied row. Two cells at the same position make the grid invalid.
    pub fn new(cells: Vec<Cell>, max_row: Option<u32>) -> Result<Self> {
        Self::with_bounds(cells, max_row, None)
    }

    pub fn with_bounds(
        cells: Vec<Cell>,
        max_row: Option<u32>,
        max_column: Option<u32>,
    ) -> Result<Self> {
        let mut index = HashMap::with_capacity(cells.len());
        let mut seen_row = 0;
        let mut seen_column = 0;

        for (i, cell) in cells.iter().enumerate() {
            if cell.row == 0 || cell.column == 0 {
                return Err(ExtractError::Grid(format!(
                    "cell at ({}, {}) is outside the 1-based grid",
                    cell.row, cell.column
                )));
            }
            if index.insert((cell.row, cell.column), i).is_some() {
                return Err(ExtractError::Grid(format!(
                    "duplicate cell at row {}, column {}",
                    cell.row, cell.column
                )));
            }
            seen_row = seen_row.max(cell.row);
            seen_column = seen_column.max(cell.column);
        }

        Ok(Self {
            cells,
            max_row: max_row.unwrap_or(0).max(seen_row),
            max_column: max_column.unwrap_or(0).max(seen_column),
            index,
        })
    }

    /// Build a grid from row-major text, skipping blank cells.
    pub fn from_rows<R, S>(rows: R) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cells = Vec::new();
        let mut max_row = 0;
        let mut max_column = 0;

        for (r, row) in rows.into_iter().enumerate() {
            let row_no = r as u32 + 1;
            max_row = row_no;
            for (c, value) in row.into_iter().enumerate() {
                let column_no = c as u32 + 1;
                max_column = max_column.max(column_no);
                let value = value.as_ref();
                if !value.trim().is_empty() {
                    cells.push(Cell::new(row_no, column_no, value));
                }
            }
        }

        Self::with_bounds(cells, Some(max_row), Some(max_column))
    }

    /// Parse the JSON export of one page, either a bare grid or a
    /// `{"<page>": {...}}` wrapper.
    pub fn from_json_value(value: &Value, page_key: &str) -> Result<Self> {
        let page = match value.get(page_key) {
            Some(page) => page,
            None if value.get("cells").is_some() => value,
            None => {
                return Err(ExtractError::Grid(format!(
                    "expected a '{}' page or a 'cells' array",
                    page_key
                )))
            }
        };
        let document: GridDocument = serde_json::from_value(page.clone())?;
        Self::try_from(document)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn max_row(&self) -> u32 {
        self.max_row
    }

    pub fn max_column(&self) -> u32 {
        self.max_column
    }

    pub fn cell_at(&self, row: u32, column: u32) -> Option<&Cell> {
        self.index.get(&(row, column)).map(|&i| &self.cells[i])
    }

    pub fn value_at(&self, row: u32, column: u32) -> Option<&str> {
        self.cell_at(row, column).map(|c| c.value.as_str())
    }

    /// Cells of one column, in file order
    pub fn column(&self, column: u32) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter().filter(move |c| c.column == column)
    }

    /// Cells of one row, in file order
    pub fn row(&self, row: u32) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter().filter(move |c| c.row == row)
    }

    /// Cells sorted by position, independent of how the export ordered them
    pub fn cells_by_position(&self) -> Vec<&Cell> {
        let mut ordered: Vec<&Cell> = self.cells.iter().collect();
        ordered.sort_by_key(|c| (c.row, c.column));
        ordered
    }
}

impl TryFrom<GridDocument> for CellGrid {
    type Error = ExtractError;

    fn try_from(doc: GridDocument) -> Result<Self> {
        Self::with_bounds(doc.cells, doc.max_row, doc.max_column)
    }
}

impl From<CellGrid> for GridDocument {
    fn from(grid: CellGrid) -> Self {
        GridDocument {
            max_row: Some(grid.max_row),
            max_column: Some(grid.max_column),
            cells: grid.cells,
        }
    }
}

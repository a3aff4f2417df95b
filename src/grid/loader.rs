//! Grid Loaders - Turn report files into cell grids
//!
//! Loaders are the only part of the crate that touches the filesystem.
//! A failed load is reported per file so the caller can skip that scenario.

use crate::error::{ExtractError, Result};
#[cfg(feature = "xlsx")]
use crate::grid::Cell;
use crate::grid::CellGrid;
use csv::ReaderBuilder;
use std::path::Path;
use tracing::debug;

/// Page key used by the JSON exports of the simulator
pub const DEFAULT_PAGE_KEY: &str = "Table p. 1";

/// Grid Loader Trait
///
/// Implementations:
/// - JsonGridLoader: cell-grid JSON export
/// - CsvGridLoader: plain CSV text export
/// - XlsxGridLoader: first worksheet of an .xls/.xlsx workbook
pub trait GridLoader {
    /// Load one file into a grid
    fn load(&self, path: &Path) -> Result<CellGrid>;

    /// Short name of the source format (e.g., "json", "csv", "xlsx")
    fn source_type(&self) -> &str;
}

/// JSON cell-grid loader
pub struct JsonGridLoader {
    page_key: String,
}

impl JsonGridLoader {
    pub fn new() -> Self {
        Self::with_page_key(DEFAULT_PAGE_KEY)
    }

    pub fn with_page_key(page_key: impl Into<String>) -> Self {
        Self {
            page_key: page_key.into(),
        }
    }
}

impl Default for JsonGridLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GridLoader for JsonGridLoader {
    fn load(&self, path: &Path) -> Result<CellGrid> {
        let content = std::fs::read_to_string(path).map_err(|e| ExtractError::load(path, e))?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| ExtractError::load(path, e))?;
        let grid = CellGrid::from_json_value(&value, &self.page_key)
            .map_err(|e| ExtractError::load(path, e))?;
        debug!("Loaded {} cells from {}", grid.len(), path.display());
        Ok(grid)
    }

    fn source_type(&self) -> &str {
        "json"
    }
}

/// CSV loader - each record is a row, each field a column
pub struct CsvGridLoader {
    delimiter: u8,
}

impl CsvGridLoader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn parse_text(&self, text: &str) -> Result<CellGrid> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| ExtractError::Grid(e.to_string()))?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }
        CellGrid::from_rows(rows)
    }
}

impl Default for CsvGridLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GridLoader for CsvGridLoader {
    fn load(&self, path: &Path) -> Result<CellGrid> {
        let text = std::fs::read_to_string(path).map_err(|e| ExtractError::load(path, e))?;
        self.parse_text(&text).map_err(|e| ExtractError::load(path, e))
    }

    fn source_type(&self) -> &str {
        "csv"
    }
}

/// Workbook loader - reads the first worksheet
#[cfg(feature = "xlsx")]
pub struct XlsxGridLoader;

#[cfg(feature = "xlsx")]
impl XlsxGridLoader {
    /// Typed numbers keep their numeric flag; blanks yield no cell
    fn to_cell(row: u32, column: u32, data: &calamine::Data) -> Option<Cell> {
        let text = match data {
            calamine::Data::Float(f) => return Some(Cell::number(row, column, *f)),
            calamine::Data::Int(i) => return Some(Cell::number(row, column, *i as f64)),
            calamine::Data::String(s) => s.clone(),
            calamine::Data::Bool(b) => b.to_string(),
            calamine::Data::DateTime(dt) => dt.as_f64().to_string(),
            calamine::Data::DateTimeIso(s) | calamine::Data::DurationIso(s) => s.clone(),
            _ => String::new(),
        };
        (!text.trim().is_empty()).then(|| Cell::new(row, column, text))
    }
}

#[cfg(feature = "xlsx")]
impl GridLoader for XlsxGridLoader {
    fn load(&self, path: &Path) -> Result<CellGrid> {
        use calamine::{open_workbook_auto, Reader};

        let mut workbook = open_workbook_auto(path).map_err(|e| ExtractError::load(path, e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ExtractError::load(path, "workbook has no worksheets"))?
            .map_err(|e| ExtractError::load(path, e))?;

        // Ranges start at the first used cell; keep the sheet's own addressing.
        let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
        let (height, width) = range.get_size();
        let mut cells = Vec::new();
        for (r, row) in range.rows().enumerate() {
            for (c, data) in row.iter().enumerate() {
                let row_no = row_offset + r as u32 + 1;
                let column_no = col_offset + c as u32 + 1;
                cells.extend(Self::to_cell(row_no, column_no, data));
            }
        }

        CellGrid::with_bounds(
            cells,
            Some(row_offset + height as u32),
            Some(col_offset + width as u32),
        )
        .map_err(|e| ExtractError::load(path, e))
    }

    fn source_type(&self) -> &str {
        "xlsx"
    }
}

/// Pick a loader from the file extension
pub fn loader_for_path(path: &Path) -> Result<Box<dyn GridLoader>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" => Ok(Box::new(JsonGridLoader::new())),
        "csv" => Ok(Box::new(CsvGridLoader::new())),
        "tsv" | "txt" => Ok(Box::new(CsvGridLoader::with_delimiter(b'\t'))),
        #[cfg(feature = "xlsx")]
        "xls" | "xlsx" | "xlsm" | "ods" => Ok(Box::new(XlsxGridLoader)),
        other => Err(ExtractError::load(
            path,
            format!("unsupported file type '{}'", other),
        )),
    }
}

/// Dispatches to the loader matching each file's extension
#[derive(Clone, Debug)]
pub struct AutoLoader {
    page_key: String,
}

impl Default for AutoLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoLoader {
    pub fn new() -> Self {
        Self::with_page_key(DEFAULT_PAGE_KEY)
    }

    /// Page key used for JSON exports
    pub fn with_page_key(page_key: impl Into<String>) -> Self {
        Self {
            page_key: page_key.into(),
        }
    }
}

impl GridLoader for AutoLoader {
    fn load(&self, path: &Path) -> Result<CellGrid> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("json"));
        if is_json {
            return JsonGridLoader::with_page_key(self.page_key.clone()).load(path);
        }
        loader_for_path(path)?.load(path)
    }

    fn source_type(&self) -> &str {
        "auto"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_text_keeps_positions() {
        let grid = CsvGridLoader::new()
            .parse_text("Section,,\nLabor,10,\"1,200.00\"\n")
            .unwrap();
        assert_eq!(grid.value_at(1, 1), Some("Section"));
        assert_eq!(grid.value_at(2, 3), Some("1,200.00"));
        assert_eq!(grid.value_at(1, 2), None);
    }

    #[test]
    fn test_unknown_extension_is_a_load_error() {
        let err = loader_for_path(Path::new("report.pdf")).err().unwrap();
        assert!(matches!(err, ExtractError::Load { .. }));
    }
}

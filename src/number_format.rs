//! Number Format Detection - EU vs US decimal conventions
//!
//! Reports are written in a single locale. The first value that carries both
//! separators tells which one is the decimal mark; everything else in the
//! grid is parsed under that decision.

use crate::grid::{Cell, CellGrid};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumberFormat {
    /// `1.234,56` - dot groups thousands, comma marks decimals
    #[serde(rename = "EU")]
    Eu,
    /// `1,234.56` - comma groups thousands, dot marks decimals
    #[serde(rename = "US")]
    Us,
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::Us
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberFormat::Eu => write!(f, "EU"),
            NumberFormat::Us => write!(f, "US"),
        }
    }
}

/// A parsed cost value plus whether it had to fall back to zero
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedValue {
    pub value: f64,
    pub defaulted: bool,
}

impl ExtractedValue {
    pub fn parsed(value: f64) -> Self {
        Self {
            value,
            defaulted: false,
        }
    }

    pub fn absent() -> Self {
        Self {
            value: 0.0,
            defaulted: true,
        }
    }
}

impl Default for ExtractedValue {
    fn default() -> Self {
        Self::absent()
    }
}

/// Classify the convention used by a grid.
///
/// Cells are visited in (row, column) order so the answer does not depend on
/// how the export happened to list them.
pub fn detect(grid: &CellGrid) -> NumberFormat {
    for cell in grid.cells_by_position() {
        let text = cell.text();
        if let (Some(dot), Some(comma)) = (text.find('.'), text.find(',')) {
            return if dot < comma {
                NumberFormat::Eu
            } else {
                NumberFormat::Us
            };
        }
    }
    NumberFormat::Us
}

/// Parse a raw cell string under `format`; `None` when nothing numeric is left.
pub fn parse(raw: &str, format: NumberFormat) -> Option<f64> {
    let normalized = match format {
        NumberFormat::Eu => raw.replace('.', "").replace(',', "."),
        NumberFormat::Us => raw.replace(',', ""),
    };
    let cleaned: String = normalized
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a cell; typed numbers bypass the separator convention.
pub fn parse_cell(cell: &Cell, format: NumberFormat) -> Option<f64> {
    if cell.numeric {
        cell.text().parse::<f64>().ok().filter(|v| v.is_finite())
    } else {
        parse(&cell.value, format)
    }
}

/// Parse a value where failure is tolerated: zero, flagged as defaulted.
pub fn parse_or_default(raw: Option<&str>, format: NumberFormat, context: &str) -> ExtractedValue {
    fallback(raw.map(|r| (r, parse(r, format))), format, context)
}

pub fn parse_cell_or_default(
    cell: Option<&Cell>,
    format: NumberFormat,
    context: &str,
) -> ExtractedValue {
    fallback(
        cell.map(|c| (c.value.as_str(), parse_cell(c, format))),
        format,
        context,
    )
}

fn fallback(parsed: Option<(&str, Option<f64>)>, format: NumberFormat, context: &str) -> ExtractedValue {
    match parsed {
        Some((_, Some(value))) => ExtractedValue::parsed(value),
        Some((raw, None)) => {
            warn!("Invalid {} value '{}' for {}, using 0", format, raw, context);
            ExtractedValue::absent()
        }
        None => {
            warn!("Missing value for {}, using 0", context);
            ExtractedValue::absent()
        }
    }
}

/// Render a number with thousands grouping in the given convention.
pub fn format_number(value: f64, format: NumberFormat, decimals: usize) -> String {
    let (group, decimal) = match format {
        NumberFormat::Eu => ('.', ','),
        NumberFormat::Us => (',', '.'),
    };

    let rendered = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rendered.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(group);
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if value < 0.0 && value.abs() >= 0.5 * 10f64.powi(-(decimals as i32)) {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push(decimal);
        out.push_str(frac);
    }
    out
}

//! Section Locator - Finds process sections in the capital investment block
//!
//! The block starts at a header cell (e.g. "CAPITAL INVESTMENT PER PROCESS
//! SECTION (2024 prices)"), lists one section label per row in column 1 under
//! a "Section" caption, and ends at a "Total" row.

use crate::grid::CellGrid;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Column that carries section and row labels
pub const LABEL_COLUMN: u32 = 1;

lazy_static! {
    static ref NUMBERED_HEADING: Regex = Regex::new(r"^\d+\.\s").expect("valid heading pattern");
}

/// Text markers that delimit the section list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionMarkers {
    /// All of these must appear (case-insensitive) in the header cell
    pub header_terms: Vec<String>,
    /// Caption cell that is not itself a section
    pub label_sentinel: String,
    /// Label that ends the list
    pub terminator: String,
}

impl Default for SectionMarkers {
    fn default() -> Self {
        Self {
            header_terms: vec![
                "CAPITAL INVESTMENT PER PROCESS SECTION".to_string(),
                "PRICES".to_string(),
            ],
            label_sentinel: "Section".to_string(),
            terminator: "Total".to_string(),
        }
    }
}

impl SectionMarkers {
    fn is_terminator(&self, value: &str) -> bool {
        value.eq_ignore_ascii_case(self.terminator.trim())
    }

    fn is_header(&self, value: &str) -> bool {
        if self.header_terms.is_empty() {
            return false;
        }
        let upper = value.to_uppercase();
        self.header_terms
            .iter()
            .all(|term| upper.contains(&term.to_uppercase()))
    }
}

/// A named span of rows
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub start_row: u32,
    pub end_row: u32,
}

impl Section {
    pub fn contains_row(&self, row: u32) -> bool {
        row >= self.start_row && row <= self.end_row
    }
}

#[derive(Clone, Debug, Default)]
pub struct SectionLocator {
    markers: SectionMarkers,
}

impl SectionLocator {
    pub fn new(markers: SectionMarkers) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &SectionMarkers {
        &self.markers
    }

    /// Sections in the order they appear. Duplicate names are kept as
    /// separate entries. Without a header the list is empty.
    pub fn locate(&self, grid: &CellGrid) -> Vec<Section> {
        let mut starts: Vec<(String, u32)> = Vec::new();
        let mut in_section_area = false;
        let mut terminator_row = None;

        for cell in grid.cells() {
            if !in_section_area {
                if self.markers.is_header(&cell.value) {
                    in_section_area = true;
                }
                continue;
            }

            if cell.column != LABEL_COLUMN {
                continue;
            }
            let value = cell.text();
            if self.markers.is_terminator(value) {
                terminator_row = Some(cell.row);
                break;
            }
            if !value.is_empty() && value != self.markers.label_sentinel {
                starts.push((value.to_string(), cell.row));
            }
        }

        let last_end = match terminator_row {
            Some(row) => row.saturating_sub(1),
            None => grid.max_row(),
        };

        let mut sections = Vec::with_capacity(starts.len());
        for (i, (name, start_row)) in starts.iter().enumerate() {
            let end_row = match starts.get(i + 1) {
                Some((_, next_start)) => next_start.saturating_sub(1).max(*start_row),
                None => last_end.max(*start_row),
            };
            sections.push(Section {
                name: name.clone(),
                start_row: *start_row,
                end_row,
            });
        }

        debug!(
            "Identified sections: {:?}",
            sections.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );
        sections
    }

    /// Section names only, in discovery order
    pub fn section_names(&self, grid: &CellGrid) -> Vec<String> {
        self.locate(grid).into_iter().map(|s| s.name).collect()
    }

    /// Every block of rows labelled with one of `sections`, anywhere in the
    /// grid, in row order.
    ///
    /// Cost rows sit under a repeat of the section label further down the
    /// report, not inside the section list. A block takes the label rows that
    /// follow it and ends before the next section label, the terminator, or a
    /// report heading: a label `is_cost_label` rejects that is numbered
    /// ("8. ANNUAL OPERATING COST") or has nothing else on its row.
    pub fn labelled_blocks<F>(
        &self,
        grid: &CellGrid,
        sections: &[Section],
        is_cost_label: F,
    ) -> Vec<Section>
    where
        F: Fn(&str) -> bool,
    {
        let mut blocks = Vec::new();
        if sections.is_empty() {
            return blocks;
        }

        let mut labels: Vec<_> = grid.column(LABEL_COLUMN).collect();
        labels.sort_by_key(|c| c.row);

        let mut current: Option<Section> = None;
        for cell in labels {
            let value = cell.text();
            if value.is_empty() {
                continue;
            }
            if sections.iter().any(|s| s.name == value) {
                blocks.extend(current.take());
                current = Some(Section {
                    name: value.to_string(),
                    start_row: cell.row,
                    end_row: cell.row,
                });
                continue;
            }
            let Some(block) = current.as_mut() else {
                continue;
            };
            let ends_block = self.markers.is_terminator(value)
                || (!is_cost_label(value) && is_heading(grid, cell.row, value));
            if ends_block {
                blocks.extend(current.take());
            } else {
                block.end_row = cell.row;
            }
        }
        blocks.extend(current);
        blocks
    }
}

fn is_heading(grid: &CellGrid, row: u32, label: &str) -> bool {
    NUMBERED_HEADING.is_match(label)
        || grid
            .row(row)
            .all(|c| c.column == LABEL_COLUMN || c.text().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;

    fn section_grid(labels: &[&str], max_row: u32) -> CellGrid {
        let mut cells = vec![Cell::new(
            1,
            1,
            "3. CAPITAL INVESTMENT PER PROCESS SECTION (2024 prices)",
        )];
        for (i, label) in labels.iter().enumerate() {
            cells.push(Cell::new(i as u32 + 2, 1, *label));
            cells.push(Cell::new(i as u32 + 2, 2, "1,000"));
        }
        CellGrid::new(cells, Some(max_row)).unwrap()
    }

    #[test]
    fn test_locate_stops_at_total() {
        let grid = section_grid(&["Section", "Fermentation", "Purification", "Total", "Other"], 20);
        let sections = SectionLocator::default().locate(&grid);
        let names: Vec<_> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Fermentation", "Purification"]);
        assert_eq!(sections[0].start_row, 3);
        assert_eq!(sections[0].end_row, 3);
        assert_eq!(sections[1].end_row, 4);
    }

    #[test]
    fn test_last_section_runs_to_max_row_without_total() {
        let grid = section_grid(&["Section", "Fermentation", "Purification"], 30);
        let sections = SectionLocator::default().locate(&grid);
        assert_eq!(sections.last().unwrap().end_row, 30);
    }

    #[test]
    fn test_header_match_is_case_insensitive() {
        let mut cells = vec![Cell::new(1, 2, "capital investment per process section - 2023 Prices")];
        cells.push(Cell::new(2, 1, "Upstream"));
        let grid = CellGrid::new(cells, None).unwrap();
        assert_eq!(SectionLocator::default().section_names(&grid), vec!["Upstream"]);
    }

    #[test]
    fn test_requires_every_header_term() {
        let cells = vec![
            Cell::new(1, 1, "CAPITAL INVESTMENT PER PROCESS SECTION"),
            Cell::new(2, 1, "Upstream"),
        ];
        let grid = CellGrid::new(cells, None).unwrap();
        assert!(SectionLocator::default().locate(&grid).is_empty());
    }

    #[test]
    fn test_labelled_blocks_follow_repeated_labels() {
        let cells = vec![
            Cell::new(1, 1, "CAPITAL INVESTMENT PER PROCESS SECTION (2024 prices)"),
            Cell::new(2, 1, "Section"),
            Cell::new(3, 1, "Fermentation"),
            Cell::new(4, 1, "Purification"),
            Cell::new(5, 1, "Total"),
            Cell::new(8, 1, "Fermentation"),
            Cell::new(9, 1, "Labor"),
            Cell::new(10, 1, "Purification"),
            Cell::new(11, 1, "Labor"),
            Cell::new(12, 1, "Total"),
            Cell::new(13, 1, "Labor"),
        ];
        let grid = CellGrid::new(cells, Some(15)).unwrap();
        let locator = SectionLocator::default();
        let sections = locator.locate(&grid);
        let blocks = locator.labelled_blocks(&grid, &sections, |l| l == "Labor");

        let spans: Vec<_> = blocks
            .iter()
            .map(|b| (b.name.as_str(), b.start_row, b.end_row))
            .collect();
        assert_eq!(
            spans,
            vec![
                ("Fermentation", 3, 3),
                ("Purification", 4, 4),
                ("Fermentation", 8, 9),
                ("Purification", 10, 11),
            ]
        );
    }

    #[test]
    fn test_blocks_stop_at_report_headings() {
        let cells = vec![
            Cell::new(1, 1, "CAPITAL INVESTMENT PER PROCESS SECTION (2024 prices)"),
            Cell::new(2, 1, "Fermentation"),
            Cell::new(3, 1, "TOTAL"),
            Cell::new(5, 1, "Fermentation"),
            Cell::new(6, 1, "Labor"),
            Cell::new(6, 2, "1.50"),
            Cell::new(7, 1, "Royalties"),
            Cell::new(7, 2, "3.00"),
            Cell::new(9, 1, "8. ANNUAL OPERATING COST"),
            Cell::new(9, 2, "$"),
            Cell::new(10, 1, "Labor"),
            Cell::new(10, 2, "2,500,000"),
            Cell::new(12, 1, "Fermentation"),
            Cell::new(13, 1, "Notes"),
            Cell::new(14, 1, "Labor"),
        ];
        let grid = CellGrid::new(cells, None).unwrap();
        let locator = SectionLocator::default();
        let sections = locator.locate(&grid);
        assert_eq!(sections.len(), 1);

        let spans: Vec<_> = locator
            .labelled_blocks(&grid, &sections, |l| l == "Labor")
            .iter()
            .map(|b| (b.start_row, b.end_row))
            .collect();
        assert_eq!(spans, vec![(2, 2), (5, 7), (12, 12)]);
    }

    #[test]
    fn test_duplicate_names_are_kept() {
        let grid = section_grid(&["DSP", "DSP", "Total"], 10);
        assert_eq!(SectionLocator::default().section_names(&grid), vec!["DSP", "DSP"]);
    }
}

use crate::error::SheetTablesError;
use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::table::MergeRegion;
use regex::Regex;
use thiserror::Error;

/// Errors related to Excel-style range parsing.
#[derive(Error, Debug)]
pub(crate) enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String)
}

/// Represents an Excel-style cell range with optional boundaries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Range {
    /// Lower row bound (0-based index), None for unbounded
    pub(crate) row_lower_bound: Option<usize>,
    /// Upper row bound (0-based index), None for unbounded
    pub(crate) row_upper_bound: Option<usize>,
    /// Lower column bound (0-based index), None for unbounded
    pub(crate) col_lower_bound: Option<usize>,
    /// Upper column bound (0-based index), None for unbounded
    pub(crate) col_upper_bound: Option<usize>,
}

impl TryFrom<&str> for Range {
    type Error = SheetTablesError;

    /// Parses an Excel-style range string (e.g., "A1", "B2:C5", "A:C", "3:10").
    /// Supports single cells, ranges, and partial ranges (columns or rows only).
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let pattern = Regex::new(r"^([A-Z]*)(\d*)(:([A-Z]*)(\d*))?$").expect("Hardcode regex pattern");
        let value = value.trim().replace('$', "").to_ascii_uppercase();
        let captures = pattern
            .captures(value.as_str())
            .ok_or(RangeError::FormatError(value.to_owned()))?;
        let bound = |index: usize, parse: fn(&str) -> Option<usize>| {
            captures.get(index).map(|matcher| matcher.as_str()).and_then(parse)
        };
        let range = Range {
            col_lower_bound: bound(1, col_to_index),
            row_lower_bound: bound(2, row_to_index),
            col_upper_bound: bound(4, col_to_index),
            row_upper_bound: bound(5, row_to_index),
        };
        // "C7" alone is one cell
        if captures.get(3).is_none() {
            return Ok(Range {
                row_upper_bound: range.row_lower_bound,
                col_upper_bound: range.col_lower_bound,
                ..range
            });
        }
        Ok(range)
    }
}

impl Range {
    pub(crate) fn contains_row(&self, row: usize) -> bool {
        self.row_lower_bound.map(|lower| lower <= row).unwrap_or(true)
            && self.row_upper_bound.map(|upper| row <= upper).unwrap_or(true)
    }

    pub(crate) fn contains_col(&self, col: usize) -> bool {
        self.col_lower_bound.map(|lower| lower <= col).unwrap_or(true)
            && self.col_upper_bound.map(|upper| col <= upper).unwrap_or(true)
    }

    pub(crate) fn contains(&self, row: usize, col: usize) -> bool {
        self.contains_row(row) && self.contains_col(col)
    }

    /// Checks whether `row` lies below the range, so no later row can be inside.
    pub(crate) fn after_row_upper_bound(&self, row: usize) -> bool {
        self.row_upper_bound.map(|upper| upper < row).unwrap_or(false)
    }

    /// Cuts a merged region down to this range; `None` when its source cell lies outside.
    pub(crate) fn clamp(&self, region: MergeRegion) -> Option<MergeRegion> {
        if !self.contains(region.min_row, region.min_col) {
            return None;
        }
        let min_row = region.min_row.max(self.row_lower_bound.unwrap_or(0));
        let min_col = region.min_col.max(self.col_lower_bound.unwrap_or(0));
        let max_row = region.max_row.min(self.row_upper_bound.unwrap_or(usize::MAX));
        let max_col = region.max_col.min(self.col_upper_bound.unwrap_or(usize::MAX));
        Some(MergeRegion { min_row, min_col, max_row, max_col })
    }
}

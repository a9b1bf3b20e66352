//! # Disjoint Table Extraction
//!
//! A report sheet often holds several independent tables separated by blank
//! rows and columns, topped by merged banner cells. This module turns the
//! sheet's grid of values into those tables:
//!
//! 1. merged regions are expanded so every covered cell repeats the top-left value,
//! 2. every maximal 4-connected block of non-empty cells becomes one table,
//! 3. the block's bounding box is trimmed of empty rows and columns,
//! 4. duplicate banner rows in the first 4 and legend rows in the last 4 rows are collapsed.
//!
//! The module is independent of any file format: readers produce a [`Grid`]
//! and a list of [`MergeRegion`]s, and get back [`Table`]s.
pub(crate) mod cleanup;
pub(crate) mod extract;
pub(crate) mod grid;

pub(crate) use extract::extract_tables;
pub(crate) use grid::Grid;
pub(crate) use grid::MergeRegion;

use crate::spreadsheet::reference::col_to_letters;
use crate::spreadsheet::reference::index_to_reference;
use std::fmt::Display;

/// One table cut out of a sheet.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Table<T> {
    /// Source row index (0-based) of every table row
    pub(crate) rows: Vec<usize>,
    /// Source column index (0-based) of every table column
    pub(crate) cols: Vec<usize>,
    /// Values, one record per entry of `rows`, one value per entry of `cols`
    pub(crate) cells: Vec<Vec<Option<T>>>,
}

impl<T> Table<T> {
    pub(crate) fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn col_count(&self) -> usize {
        self.cols.len()
    }

    /// Source reference of the table cell at (`row`, `col`).
    pub(crate) fn reference(&self, row: usize, col: usize) -> String {
        index_to_reference(self.rows[row], self.cols[col])
    }

    /// Source range spanned by the table, e.g. `B3:F12`.
    pub(crate) fn range(&self) -> String {
        match (self.rows.first(), self.rows.last(), self.cols.first(), self.cols.last()) {
            (Some(top), Some(bottom), Some(left), Some(right)) => {
                format!("{}:{}", index_to_reference(*top, *left), index_to_reference(*bottom, *right))
            }
            _ => String::new(),
        }
    }
}

impl<T: Display> Table<T> {
    /// Renders the table as a GitHub flavoured markdown table.
    ///
    /// The first column holds the 1-based source row number and the header
    /// line the source column letters, so every value can be traced back to
    /// its cell in the sheet.
    pub(crate) fn to_markdown(&self) -> String {
        let mut markdown = String::from("| Row |");
        for col in &self.cols {
            markdown.push(' ');
            markdown.push_str(&col_to_letters(*col));
            markdown.push_str(" |");
        }
        markdown.push_str("\n| ---: |");
        for _ in &self.cols {
            markdown.push_str(" --- |");
        }
        for (row, record) in self.rows.iter().zip(&self.cells) {
            markdown.push_str(&format!("\n| {} |", row + 1));
            for value in record {
                match value {
                    Some(value) => {
                        markdown.push(' ');
                        markdown.push_str(&escape_markdown(&value.to_string()));
                        markdown.push_str(" |");
                    }
                    None => markdown.push_str("  |"),
                }
            }
        }
        markdown
    }
}

/// Keeps a value on one line inside a markdown table cell.
fn escape_markdown(value: &str) -> String {
    value
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

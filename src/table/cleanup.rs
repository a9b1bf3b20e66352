//! Banner and legend row cleanup applied to every extracted table.
//!
//! Merge expansion tends to repeat a title or legend across several rows. Only
//! the first and last [`WINDOW`] rows are inspected and only exact duplicates
//! are removed, so a genuine repeated data row inside those windows is lost too.

use crate::table::Table;
use std::ops::Range;

/// Number of leading and trailing rows inspected for duplicates.
pub(crate) const WINDOW: usize = 4;

/// Drops rows among the first 4 that repeat an earlier row among the first 4.
pub(crate) fn clean_header<T: PartialEq>(table: Table<T>) -> Table<T> {
    let window = 0..table.cells.len().min(WINDOW);
    dedup_window(table, window)
}

/// Drops rows among the last 4 that repeat an earlier row among the last 4.
pub(crate) fn clean_footer<T: PartialEq>(table: Table<T>) -> Table<T> {
    let length = table.cells.len();
    let window = length.saturating_sub(WINDOW)..length;
    dedup_window(table, window)
}

/// Keeps the first occurrence of each distinct row inside `window`; rows outside it are untouched.
fn dedup_window<T: PartialEq>(table: Table<T>, window: Range<usize>) -> Table<T> {
    let keep: Vec<bool> = (0..table.cells.len())
        .map(|index| {
            !window.contains(&index)
                || !(window.start..index).any(|earlier| table.cells[earlier] == table.cells[index])
        })
        .collect();
    if keep.iter().all(|keep| *keep) {
        return table;
    }

    let Table { rows, cols, cells } = table;
    Table {
        rows: rows.into_iter().zip(&keep).filter(|(_, keep)| **keep).map(|(row, _)| row).collect(),
        cols,
        cells: cells.into_iter().zip(&keep).filter(|(_, keep)| **keep).map(|(record, _)| record).collect(),
    }
}

use crate::database::range::RangeError;
use crate::error::SheetTablesError;
use crate::spreadsheet::reference::reference_to_index;

/// Rectangle of cells sharing the value stored in its top-left cell.
/// All bounds are 0-based and inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct MergeRegion {
    pub(crate) min_row: usize,
    pub(crate) min_col: usize,
    pub(crate) max_row: usize,
    pub(crate) max_col: usize,
}

impl MergeRegion {
    pub(crate) fn new(min_row: usize, min_col: usize, max_row: usize, max_col: usize) -> Self {
        MergeRegion {
            min_row: min_row.min(max_row),
            min_col: min_col.min(max_col),
            max_row: min_row.max(max_row),
            max_col: min_col.max(max_col),
        }
    }

    /// Returns true for a single cell region, which carries nothing to expand.
    pub(crate) fn is_single_cell(&self) -> bool {
        self.min_row == self.max_row && self.min_col == self.max_col
    }
}

impl TryFrom<&str> for MergeRegion {
    type Error = SheetTablesError;

    /// Parses an A1-style merge reference such as `B2:D4` (or a lone `B2`).
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let (lower, upper) = value.split_once(':').unwrap_or((value, value));
        let lower = reference_to_index(lower.trim());
        let upper = reference_to_index(upper.trim());
        match lower.zip(upper) {
            Some(((min_row, min_col), (max_row, max_col))) => Ok(MergeRegion::new(min_row, min_col, max_row, max_col)),
            None => Err(RangeError::FormatError(value.to_owned()))?,
        }
    }
}

/// Dense row-major grid of optional values with its origin at `A1`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Grid<T> {
    rows: usize,
    cols: usize,
    values: Vec<Option<T>>,
}

impl<T: Clone> Grid<T> {
    /// Creates a grid of the given shape with every cell empty.
    pub(crate) fn new(rows: usize, cols: usize) -> Self {
        Grid {
            rows,
            cols,
            values: vec![None; rows * cols],
        }
    }

    /// Builds a grid from rows of values; short rows are padded with empty cells.
    pub(crate) fn from_rows(rows: Vec<Vec<Option<T>>>) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut grid = Grid::new(rows.len(), cols);
        for (row, record) in rows.into_iter().enumerate() {
            for (col, value) in record.into_iter().enumerate() {
                grid.set(row, col, value);
            }
        }
        grid
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn cols(&self) -> usize {
        self.cols
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub(crate) fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.values[row * self.cols + col].as_ref()
        } else {
            None
        }
    }

    /// Stores a value; writes outside the grid are ignored.
    pub(crate) fn set(&mut self, row: usize, col: usize, value: Option<T>) {
        if row < self.rows && col < self.cols {
            self.values[row * self.cols + col] = value;
        }
    }

    pub(crate) fn is_occupied(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_some()
    }

    /// Copies the top-left value of every region over the whole region.
    ///
    /// Regions are clamped to the grid; a region starting outside it is skipped.
    /// An empty top-left cell empties the block.
    pub(crate) fn expand_merges(&mut self, merges: &[MergeRegion]) {
        if self.is_empty() {
            return;
        }
        for merge in merges {
            if merge.min_row >= self.rows || merge.min_col >= self.cols || merge.is_single_cell() {
                continue;
            }
            let max_row = merge.max_row.min(self.rows - 1);
            let max_col = merge.max_col.min(self.cols - 1);
            let value = self.get(merge.min_row, merge.min_col).cloned();
            for row in merge.min_row..=max_row {
                for col in merge.min_col..=max_col {
                    self.set(row, col, value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_region_parse() {
        let region = MergeRegion::try_from("B2:D4").unwrap();
        assert_eq!(region, MergeRegion::new(1, 1, 3, 3));

        let region = MergeRegion::try_from("d4:b2").unwrap();
        assert_eq!(region, MergeRegion::new(1, 1, 3, 3));

        let region = MergeRegion::try_from("C7").unwrap();
        assert!(region.is_single_cell());

        assert!(MergeRegion::try_from("not a range").is_err());
    }

    #[test]
    fn grid_from_rows_pads_short_rows() {
        let grid = Grid::from_rows(vec![
            vec![Some(1)],
            vec![Some(2), Some(3), Some(4)],
        ]);
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.get(0, 2), None);
        assert_eq!(grid.get(1, 2), Some(&4));
        assert_eq!(grid.get(5, 5), None);
    }

    #[test]
    fn expand_merges_fills_block() {
        let mut grid = Grid::from_rows(vec![
            vec![Some("title"), None, None],
            vec![None, None, Some("stray")],
        ]);
        grid.expand_merges(&[MergeRegion::new(0, 0, 1, 2)]);
        for row in 0..2 {
            for col in 0..3 {
                assert_eq!(grid.get(row, col), Some(&"title"));
            }
        }
    }

    #[test]
    fn expand_merges_empty_source_clears_block() {
        let mut grid = Grid::from_rows(vec![
            vec![None, Some("b")],
            vec![Some("c"), Some("d")],
        ]);
        grid.expand_merges(&[MergeRegion::new(0, 0, 0, 1)]);
        assert_eq!(grid.get(0, 0), None);
        assert_eq!(grid.get(0, 1), None);
        assert_eq!(grid.get(1, 0), Some(&"c"));
    }

    #[test]
    fn expand_merges_clamps_to_grid() {
        let mut grid = Grid::from_rows(vec![
            vec![None, Some("x")],
            vec![None, None],
        ]);
        grid.expand_merges(&[
            MergeRegion::new(0, 1, 9, 9),
            MergeRegion::new(5, 5, 6, 6),
        ]);
        assert_eq!(grid.get(1, 1), Some(&"x"));
        assert_eq!(grid.get(1, 0), None);
    }
}

use crate::database::range::Range;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::table::Grid;
use crate::table::MergeRegion;

/// Rows in the largest sheet a workbook can hold.
pub(crate) const MAX_ROWS: usize = 1_048_576;
/// Columns in the largest sheet a workbook can hold, `A` to `XFD`.
pub(crate) const MAX_COLS: usize = 16_384;

/// Cells and merged regions read from one sheet of a workbook.
pub(crate) struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    /// Non-empty cells in row-major order
    pub(crate) cells: Vec<Cell>,
    /// Merged regions, clamped to the requested range
    pub(crate) merges: Vec<MergeRegion>,
    /// Area of the sheet being read
    pub(super) range: Range,
    /// One past the last row and column holding a cell or merge
    rows: usize,
    cols: usize,
}

impl Sheet {
    pub(super) fn new(file_name: &str, name: &str, range: Option<Range>) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            merges: Vec::new(),
            range: range.unwrap_or_default(),
            rows: 0,
            cols: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(super) fn contains(&self, row: usize, col: usize) -> bool {
        self.range.contains(row, col)
    }

    pub(super) fn after_row_upper_bound(&self, row: usize) -> bool {
        self.range.after_row_upper_bound(row)
    }

    /// Adds a cell; cells outside the range or past the sheet limits are dropped.
    pub(super) fn push(&mut self, cell: Cell) {
        if cell.row < MAX_ROWS && cell.col < MAX_COLS && self.contains(cell.row, cell.col) {
            self.rows = self.rows.max(cell.row + 1);
            self.cols = self.cols.max(cell.col + 1);
            self.cells.push(cell);
        }
    }

    /// Adds a merged region cut down to the sheet limits and the range.
    pub(super) fn push_merge(&mut self, region: MergeRegion) {
        if region.min_row >= MAX_ROWS || region.min_col >= MAX_COLS {
            return;
        }
        let region = MergeRegion::new(
            region.min_row,
            region.min_col,
            region.max_row.min(MAX_ROWS - 1),
            region.max_col.min(MAX_COLS - 1),
        );
        if region.is_single_cell() {
            return;
        }
        if let Some(region) = self.range.clamp(region) {
            self.rows = self.rows.max(region.max_row + 1);
            self.cols = self.cols.max(region.max_col + 1);
            self.merges.push(region);
        }
    }

    /// Builds the dense grid from `A1` covering every cell and merged region.
    pub(crate) fn to_grid(&self) -> Grid<CellValue> {
        let mut grid = Grid::new(self.rows, self.cols);
        for cell in &self.cells {
            grid.set(cell.row, cell.col, Some(cell.value.clone()));
        }
        grid
    }
}

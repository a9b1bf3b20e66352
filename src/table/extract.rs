//! Connected-component extraction of disjoint tables from a sheet grid.

use crate::table::cleanup::clean_header;
use crate::table::cleanup::clean_footer;
use crate::table::grid::Grid;
use crate::table::grid::MergeRegion;
use crate::table::Table;
use std::collections::VecDeque;

/// Inclusive bounding box of one connected component.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Bounds {
    row_lower: usize,
    row_upper: usize,
    col_lower: usize,
    col_upper: usize,
}

impl Bounds {
    fn at(row: usize, col: usize) -> Self {
        Bounds {
            row_lower: row,
            row_upper: row,
            col_lower: col,
            col_upper: col,
        }
    }

    fn include(&mut self, row: usize, col: usize) {
        self.row_lower = self.row_lower.min(row);
        self.row_upper = self.row_upper.max(row);
        self.col_lower = self.col_lower.min(col);
        self.col_upper = self.col_upper.max(col);
    }
}

/// Splits a grid into its disjoint tables.
///
/// Merge regions are expanded first, then every maximal 4-connected block of
/// occupied cells becomes one table, in the row-major order in which its first
/// cell is met. Each table is the bounding box of its block with all-empty rows
/// and columns dropped and duplicate rows collapsed in its first and last 4 rows.
pub(crate) fn extract_tables<T: Clone + PartialEq>(mut grid: Grid<T>, merges: &[MergeRegion]) -> Vec<Table<T>> {
    grid.expand_merges(merges);
    let rows = grid.rows();
    let cols = grid.cols();
    let mut tables = Vec::<Table<T>>::new();
    if grid.is_empty() {
        return tables;
    }

    let mut visited = vec![false; rows * cols];
    for row in 0..rows {
        for col in 0..cols {
            if grid.is_occupied(row, col) && !visited[row * cols + col] {
                let bounds = flood_fill(&grid, &mut visited, row, col);
                let table = materialize(&grid, &bounds);
                tables.push(clean_footer(clean_header(table)));
            }
        }
    }
    tracing::trace!(rows, cols, tables = tables.len(), "extracted tables from grid");
    tables
}

/// Breadth-first walk over occupied 4-neighbours, marking every cell it claims.
fn flood_fill<T: Clone>(grid: &Grid<T>, visited: &mut [bool], row: usize, col: usize) -> Bounds {
    let cols = grid.cols();
    let mut bounds = Bounds::at(row, col);
    let mut queue = VecDeque::<(usize, usize)>::new();
    visited[row * cols + col] = true;
    queue.push_back((row, col));

    while let Some((row, col)) = queue.pop_front() {
        bounds.include(row, col);
        let neighbours = [
            row.checked_add(1).map(|next| (next, col)),
            row.checked_sub(1).map(|prev| (prev, col)),
            col.checked_add(1).map(|next| (row, next)),
            col.checked_sub(1).map(|prev| (row, prev)),
        ];
        for (next_row, next_col) in neighbours.into_iter().flatten() {
            if next_row < grid.rows()
                && next_col < cols
                && grid.is_occupied(next_row, next_col)
                && !visited[next_row * cols + next_col]
            {
                visited[next_row * cols + next_col] = true;
                queue.push_back((next_row, next_col));
            }
        }
    }
    bounds
}

/// Copies the bounding box out of the grid, dropping all-empty rows, then all-empty columns.
fn materialize<T: Clone>(grid: &Grid<T>, bounds: &Bounds) -> Table<T> {
    let rows: Vec<usize> = (bounds.row_lower..=bounds.row_upper)
        .filter(|row| (bounds.col_lower..=bounds.col_upper).any(|col| grid.is_occupied(*row, col)))
        .collect();
    let cols: Vec<usize> = (bounds.col_lower..=bounds.col_upper)
        .filter(|col| rows.iter().any(|row| grid.is_occupied(*row, *col)))
        .collect();
    let cells = rows
        .iter()
        .map(|row| cols.iter().map(|col| grid.get(*row, *col).cloned()).collect())
        .collect();
    Table { rows, cols, cells }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[Option<&'static str>]]) -> Grid<&'static str> {
        Grid::from_rows(rows.iter().map(|row| row.to_vec()).collect())
    }

    #[test]
    fn empty_grid_has_no_tables() {
        assert!(extract_tables(Grid::<i32>::new(0, 0), &[]).is_empty());
        assert!(extract_tables(Grid::<i32>::new(0, 5), &[]).is_empty());
        assert!(extract_tables(Grid::<i32>::new(5, 0), &[]).is_empty());
        assert!(extract_tables(Grid::<i32>::new(3, 3), &[]).is_empty());
    }

    #[test]
    fn single_cell_is_one_table() {
        let tables = extract_tables(grid(&[
            &[None, None, None],
            &[None, Some("x"), None],
        ]), &[]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells, vec![vec![Some("x")]]);
        assert_eq!(tables[0].rows, vec![1]);
        assert_eq!(tables[0].cols, vec![1]);
    }

    #[test]
    fn diagonal_cells_are_separate_tables() {
        let tables = extract_tables(grid(&[
            &[Some("a"), None],
            &[None, Some("b")],
        ]), &[]);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].cells, vec![vec![Some("a")]]);
        assert_eq!(tables[1].cells, vec![vec![Some("b")]]);
    }

    #[test]
    fn adjacent_cells_share_a_table() {
        let tables = extract_tables(grid(&[
            &[Some("a"), Some("b")],
            &[None, None],
        ]), &[]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells, vec![vec![Some("a"), Some("b")]]);

        let tables = extract_tables(grid(&[
            &[None, Some("a")],
            &[None, Some("b")],
        ]), &[]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells, vec![vec![Some("a")], vec![Some("b")]]);
        assert_eq!(tables[0].cols, vec![1]);
    }

    #[test]
    fn bounding_box_keeps_interior_gaps() {
        // L-shaped block still yields its full rectangle
        let tables = extract_tables(grid(&[
            &[Some("a"), None],
            &[Some("b"), None],
            &[Some("c"), Some("d")],
        ]), &[]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells, vec![
            vec![Some("a"), None],
            vec![Some("b"), None],
            vec![Some("c"), Some("d")],
        ]);
    }

    #[test]
    fn tables_come_in_discovery_order() {
        let tables = extract_tables(grid(&[
            &[None, None, None, Some("second")],
            &[Some("first"), None, None, Some("x")],
            &[None, None, None, None],
            &[Some("third"), Some("y"), None, None],
        ]), &[]);
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[0].cells[0][0], Some("second"));
        assert_eq!(tables[1].cells[0][0], Some("first"));
        assert_eq!(tables[2].cells[0][0], Some("third"));
    }

    #[test]
    fn merge_region_joins_neighbours() {
        // Banner merged over B1:C2, data starts right below at B3
        let rows: &[&[Option<&'static str>]] = &[
            &[None, Some("banner"), None],
            &[None, None, None],
            &[None, Some("h1"), Some("h2")],
            &[None, Some("1"), Some("2")],
        ];
        let without = extract_tables(grid(rows), &[]);
        assert_eq!(without.len(), 2);

        let tables = extract_tables(grid(rows), &[MergeRegion::new(0, 1, 1, 2)]);
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.cols, vec![1, 2]);
        // Two identical banner rows collapse into one
        assert_eq!(table.cells, vec![
            vec![Some("banner"), Some("banner")],
            vec![Some("h1"), Some("h2")],
            vec![Some("1"), Some("2")],
        ]);
    }

    #[test]
    fn merge_region_only_fills_its_rectangle() {
        let tables = extract_tables(grid(&[
            &[Some("m"), None, None],
            &[None, None, None],
            &[None, None, Some("z")],
        ]), &[MergeRegion::new(0, 0, 1, 1)]);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows, vec![0]);
        assert_eq!(tables[0].cols, vec![0, 1]);
        assert_eq!(tables[1].cells, vec![vec![Some("z")]]);
    }

    #[test]
    fn fully_connected_grid_is_one_table() {
        let rows: Vec<Vec<Option<i32>>> = (0..6)
            .map(|row| (0..4).map(|col| Some(row * 10 + col)).collect())
            .collect();
        let tables = extract_tables(Grid::from_rows(rows.clone()), &[]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells, rows);
    }

    #[test]
    fn extraction_is_deterministic() {
        let source = grid(&[
            &[Some("a"), None, Some("b")],
            &[Some("a"), None, Some("c")],
            &[None, Some("d"), None],
        ]);
        let merges = [MergeRegion::new(2, 1, 2, 2)];
        let first = extract_tables(source.clone(), &merges);
        let second = extract_tables(source, &merges);
        assert_eq!(first, second);
    }
}

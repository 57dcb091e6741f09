//! FILENAME: core/spreadsheet-engine/src/grid.rs
//! Sparse 2-D store of cells with fixed dimensions.
//!
//! Addressing a cell outside the dimensions is a defect in the caller and
//! panics; it is never clipped.

use rustc_hash::FxHashMap;

use crate::cell::CellInfo;

#[derive(Debug, Clone, Default)]
pub struct CellGrid {
    rows: usize,
    columns: usize,
    cells: FxHashMap<(usize, usize), CellInfo>,
}

impl CellGrid {
    pub fn new(rows: usize, columns: usize) -> Self {
        CellGrid {
            rows,
            columns,
            cells: FxHashMap::default(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn check_bounds(&self, row: usize, column: usize) {
        assert!(
            row < self.rows && column < self.columns,
            "cell ({}, {}) outside {}x{} grid",
            row,
            column,
            self.rows,
            self.columns
        );
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&CellInfo> {
        self.check_bounds(row, column);
        self.cells.get(&(row, column))
    }

    pub fn get_mut(&mut self, row: usize, column: usize) -> Option<&mut CellInfo> {
        self.check_bounds(row, column);
        self.cells.get_mut(&(row, column))
    }

    pub fn insert(&mut self, row: usize, column: usize, cell: CellInfo) {
        self.check_bounds(row, column);
        self.cells.insert((row, column), cell);
    }

    /// The cell at `(row, column)`, created with `make` if absent.
    pub fn get_or_insert_with(
        &mut self,
        row: usize,
        column: usize,
        make: impl FnOnce() -> CellInfo,
    ) -> &mut CellInfo {
        self.check_bounds(row, column);
        self.cells.entry((row, column)).or_insert_with(make)
    }

    /// The cell at `(row, column)`, or a fresh placeholder.
    pub fn get_or_placeholder(&mut self, row: usize, column: usize) -> &mut CellInfo {
        self.get_or_insert_with(row, column, CellInfo::placeholder)
    }

    /// One row, with `None` for unpopulated positions.
    pub fn row(&self, row: usize) -> Vec<Option<&CellInfo>> {
        (0..self.columns).map(|column| self.get(row, column)).collect()
    }

    /// Populated cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &CellInfo)> {
        let mut positions: Vec<&(usize, usize)> = self.cells.keys().collect();
        positions.sort_unstable();
        positions.into_iter().map(move |pos| (*pos, &self.cells[pos]))
    }

    pub fn clear(&mut self) {
        self.rows = 0;
        self.columns = 0;
        self.cells.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_access() {
        let mut grid = CellGrid::new(2, 3);
        assert!(grid.get(1, 2).is_none());
        grid.get_or_placeholder(1, 2).height_px = Some(10);
        assert_eq!(grid.get(1, 2).unwrap().height_px, Some(10));
        assert_eq!(grid.len(), 1);
        let row = grid.row(1);
        assert_eq!(row.len(), 3);
        assert!(row[0].is_none() && row[2].is_some());
    }

    #[test]
    #[should_panic(expected = "outside 2x3 grid")]
    fn test_out_of_bounds_panics() {
        let grid = CellGrid::new(2, 3);
        grid.get(2, 0);
    }

    #[test]
    fn test_iter_is_row_major() {
        let mut grid = CellGrid::new(2, 2);
        grid.insert(1, 0, CellInfo::placeholder());
        grid.insert(0, 1, CellInfo::placeholder());
        let positions: Vec<_> = grid.iter().map(|(pos, _)| pos).collect();
        assert_eq!(positions, vec![(0, 1), (1, 0)]);
    }
}

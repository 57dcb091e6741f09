//! FILENAME: core/spreadsheet-engine/src/fragment.rs
//! Mapping between global data rows and `(fragment, row within fragment)`.
//!
//! The data body is appended in fixed-size batches. Events raised by a
//! fragment carry the fragment-local row, which has to be mapped back before
//! it can address the cell grid.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentIndex {
    rows_per_fragment: usize,
}

impl Default for FragmentIndex {
    fn default() -> Self {
        FragmentIndex { rows_per_fragment: 1 }
    }
}

impl FragmentIndex {
    pub fn new(rows_per_fragment: usize) -> Self {
        assert!(rows_per_fragment > 0, "fragments must hold at least one row");
        FragmentIndex { rows_per_fragment }
    }

    pub fn rows_per_fragment(&self) -> usize {
        self.rows_per_fragment
    }

    pub fn global_row(&self, fragment: usize, row_in_fragment: usize) -> usize {
        assert!(
            row_in_fragment < self.rows_per_fragment,
            "row {} outside fragment of {} rows",
            row_in_fragment,
            self.rows_per_fragment
        );
        fragment * self.rows_per_fragment + row_in_fragment
    }

    pub fn locate(&self, global_row: usize) -> (usize, usize) {
        (global_row / self.rows_per_fragment, global_row % self.rows_per_fragment)
    }

    pub fn fragment_count(&self, total_rows: usize) -> usize {
        total_rows.div_ceil(self.rows_per_fragment)
    }
}

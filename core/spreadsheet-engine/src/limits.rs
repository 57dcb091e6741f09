//! FILENAME: core/spreadsheet-engine/src/limits.rs
//! Size constants and the overridable work limits.

use serde::{Deserialize, Serialize};

use crate::error::{SpreadsheetError, SpreadsheetResult};

/// Largest pivot (rows x columns) the engine agrees to lay out.
pub const MAX_CELL_COUNT: usize = 500_000;
/// Data cells rendered per scheduler tick.
pub const CELLS_PER_ITERATION: usize = 1000;
/// Backend group rows consumed per scheduler tick.
pub const ROWS_PROCESSED_PER_ITERATION: usize = 1000;

pub const MIN_TABLE_SIZE_PX: i32 = 90;
pub const WINDOW_BORDER_PX: i32 = 15;
pub const SCROLLBAR_FUDGE: i32 = 16;
pub const CELL_PADDING_PX: i32 = 2;
pub const TD_BORDER_PX: i32 = 1;

/// Header text shown for an empty value.
pub const BLANK_STRING: &str = "(empty)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetLimits {
    pub max_cell_count: usize,
    pub cells_per_iteration: usize,
    pub rows_processed_per_iteration: usize,
}

impl Default for SpreadsheetLimits {
    fn default() -> Self {
        SpreadsheetLimits {
            max_cell_count: MAX_CELL_COUNT,
            cells_per_iteration: CELLS_PER_ITERATION,
            rows_processed_per_iteration: ROWS_PROCESSED_PER_ITERATION,
        }
    }
}

impl SpreadsheetLimits {
    /// Rejects a pivot whose candidate cell count exceeds the maximum.
    pub fn check_cell_count(&self, rows: usize, columns: usize) -> SpreadsheetResult<()> {
        let cell_count = rows.saturating_mul(columns);
        if cell_count > self.max_cell_count {
            return Err(SpreadsheetError::TooManyCells {
                cell_count,
                max: self.max_cell_count,
            });
        }
        Ok(())
    }

    /// Data rows per render batch, so that one batch holds about
    /// `cells_per_iteration` cells.
    pub fn rows_per_iteration(&self, columns: usize) -> usize {
        (self.cells_per_iteration / columns.max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_budget_reports_exact_count() {
        let limits = SpreadsheetLimits::default();
        assert!(limits.check_cell_count(1000, 500).is_ok());
        assert_eq!(
            limits.check_cell_count(1000, 501),
            Err(SpreadsheetError::TooManyCells { cell_count: 501_000, max: 500_000 })
        );
    }

    #[test]
    fn test_rows_per_iteration() {
        let limits = SpreadsheetLimits::default();
        assert_eq!(limits.rows_per_iteration(3), 333);
        assert_eq!(limits.rows_per_iteration(5000), 1);
        assert_eq!(limits.rows_per_iteration(0), 1000);
    }
}

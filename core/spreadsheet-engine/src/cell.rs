//! FILENAME: core/spreadsheet-engine/src/cell.rs
//! Header tuples and the per-cell display/identity record.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use tko_query::{ConditionPayload, HeaderField, QueryResult, StatusColor, TestSet};

/// Header value of the synthetic bucket for groups without a header.
pub const UNRESOLVED_VALUE: &str = "(unresolved)";

/// One pivot axis value: a tuple with one entry per field on the axis.
/// Compared by content.
pub type Header = SmallVec<[String; 4]>;

pub fn header_from<S: AsRef<str>>(values: &[S]) -> Header {
    values.iter().map(|v| v.as_ref().to_string()).collect()
}

/// The first `length` entries of `header`.
pub fn sub_header(header: &Header, length: usize) -> Header {
    if length == header.len() {
        return header.clone();
    }
    header[..length].iter().cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInfo {
    /// Row header (possibly a prefix, for outer row-header cells).
    pub row: Option<Header>,
    /// Column header (possibly a prefix, for outer column-header cells).
    pub column: Option<Header>,
    pub contents: String,
    pub color: Option<StatusColor>,
    pub width_px: Option<i32>,
    pub height_px: Option<i32>,
    pub row_span: u32,
    pub col_span: u32,
    pub test_count: u64,
    /// Index of the only test in the cell, when the backend reported one.
    pub test_index: Option<i64>,
}

impl CellInfo {
    pub fn new(row: Option<Header>, column: Option<Header>, contents: impl Into<String>) -> Self {
        CellInfo {
            row,
            column,
            contents: contents.into(),
            color: None,
            width_px: None,
            height_px: None,
            row_span: 1,
            col_span: 1,
            test_count: 0,
            test_index: None,
        }
    }

    /// Placeholder that only carries sizes.
    pub fn placeholder() -> Self {
        CellInfo::new(None, None, " ")
    }

    pub fn is_header(&self) -> bool {
        !self.is_empty() && (self.row.is_none() || self.column.is_none())
    }

    pub fn is_empty(&self) -> bool {
        self.row.is_none() && self.column.is_none()
    }

    /// True when either axis is the synthetic bucket of groups the backend
    /// returned without a header value.
    pub fn is_unresolved(&self) -> bool {
        let bucket = |header: &Option<Header>| {
            header
                .as_ref()
                .map(|h| !h.is_empty() && h.iter().all(|v| v == UNRESOLVED_VALUE))
                .unwrap_or(false)
        };
        bucket(&self.row) || bucket(&self.column)
    }

    /// Identity of the cell within one render, for selection.
    pub fn key(&self) -> (Option<Header>, Option<Header>) {
        (self.row.clone(), self.column.clone())
    }

    /// The tests behind this cell: a single-test set when the cell holds
    /// exactly one test, otherwise the global condition narrowed by every
    /// populated axis. Empty cells and unresolved-bucket cells have no test
    /// set: no header predicate selects the tests folded into a bucket.
    pub fn test_set(
        &self,
        initial: &ConditionPayload,
        row_fields: &[&HeaderField],
        column_fields: &[&HeaderField],
    ) -> QueryResult<Option<TestSet>> {
        if self.is_empty() || self.is_unresolved() {
            return Ok(None);
        }
        let mut axes: Vec<(&[&HeaderField], &[String])> = Vec::with_capacity(2);
        if let Some(row) = &self.row {
            axes.push((row_fields, row.as_slice()));
        }
        if let Some(column) = &self.column {
            axes.push((column_fields, column.as_slice()));
        }
        TestSet::for_group(initial, &axes, self.test_count, self.test_index).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_empty() {
        let header = CellInfo::new(Some(header_from(&["x86"])), None, "x86");
        assert!(header.is_header());
        assert!(!header.is_empty());
        let placeholder = CellInfo::placeholder();
        assert!(placeholder.is_empty());
        assert!(!placeholder.is_header());
    }

    #[test]
    fn test_single_test_cell_yields_single_set() {
        let mut cell = CellInfo::new(Some(header_from(&["x86"])), Some(header_from(&["4.4"])), "1 / 1");
        cell.test_count = 1;
        cell.test_index = Some(9);
        let platform = HeaderField::simple("Platform", "platform");
        let kernel = HeaderField::simple("Kernel", "kernel");
        let set = cell
            .test_set(&ConditionPayload::default(), &[&platform], &[&kernel])
            .unwrap();
        assert_eq!(set, Some(TestSet::Single { test_index: 9 }));
    }

    #[test]
    fn test_column_header_uses_column_fields_only() {
        let cell = CellInfo::new(None, Some(header_from(&["4.4"])), "4.4");
        let platform = HeaderField::simple("Platform", "platform");
        let kernel = HeaderField::simple("Kernel", "kernel");
        let set = cell
            .test_set(&ConditionPayload::default(), &[&platform], &[&kernel])
            .unwrap()
            .unwrap();
        assert_eq!(set.partial_sql_condition(), "(kernel = '4.4')");
    }

    #[test]
    fn test_unresolved_bucket_has_no_test_set() {
        let bucket = header_from(&[UNRESOLVED_VALUE]);
        let mut cell = CellInfo::new(Some(bucket.clone()), Some(header_from(&["4.4"])), "1 / 5");
        cell.test_count = 5;
        assert!(cell.is_unresolved());
        let platform = HeaderField::simple("Platform", "platform");
        let kernel = HeaderField::simple("Kernel", "kernel");
        let set = cell.test_set(&ConditionPayload::default(), &[&platform], &[&kernel]).unwrap();
        assert!(set.is_none());

        let header = CellInfo::new(None, Some(bucket), UNRESOLVED_VALUE);
        assert!(header.test_set(&ConditionPayload::default(), &[], &[&kernel]).unwrap().is_none());

        let partial = CellInfo::new(Some(header_from(&["x86", UNRESOLVED_VALUE])), None, "");
        assert!(!partial.is_unresolved());
    }

    #[test]
    fn test_placeholder_has_no_test_set() {
        let set = CellInfo::placeholder().test_set(&ConditionPayload::default(), &[], &[]).unwrap();
        assert!(set.is_none());
    }
}

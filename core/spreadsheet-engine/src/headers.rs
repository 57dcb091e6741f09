//! FILENAME: core/spreadsheet-engine/src/headers.rs
//! Run-length collapsed header cells.
//!
//! Headers are walked in order; at each field position a new cell starts
//! when the value differs from the previous header's value there, or when a
//! shallower field already started a new cell. Otherwise the previous cell's
//! span grows by one. Row-header cells sit at `[header][field]`; column-header
//! cells are packed left per field row, at `[field][n-th cell of that field]`,
//! which is how an HTML table with colspans addresses them.

use tko_query::sql::html_escape;

use crate::cell::{sub_header, CellInfo, Header};
use crate::grid::CellGrid;
use crate::limits::BLANK_STRING;

/// Field whose values are long paths and get a break after each `/`.
const KERNEL_FIELD: &str = "kernel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Columns,
}

/// Display text for one header value of `field`.
pub fn format_header(field: &str, value: &str) -> String {
    if value.is_empty() {
        return BLANK_STRING.to_string();
    }
    let escaped = html_escape(value);
    if field == KERNEL_FIELD {
        return escaped.replace('/', "/<br>").replace("/<br>/<br>", "//");
    }
    escaped
}

pub fn compute_header_cells(axis: Axis, fields: &[String], header_values: &[Header]) -> CellGrid {
    let field_count = fields.len();
    let mut cells = match axis {
        Axis::Rows => CellGrid::new(header_values.len(), field_count),
        Axis::Columns => CellGrid::new(field_count, header_values.len()),
    };

    let mut last_value: Vec<Option<&str>> = vec![None; field_count];
    let mut last_cell: Vec<(usize, usize)> = vec![(0, 0); field_count];
    let mut counter: Vec<usize> = vec![0; field_count];

    for (header_index, header) in header_values.iter().enumerate() {
        let mut new_header = false;
        for field_index in 0..field_count {
            let value = header[field_index].as_str();
            if new_header || last_value[field_index] != Some(value) {
                new_header = true;
                let current = sub_header(header, field_index + 1);
                let contents = format_header(&fields[field_index], value);
                let (cell, position) = match axis {
                    Axis::Rows => (
                        CellInfo::new(Some(current), None, contents),
                        (header_index, field_index),
                    ),
                    Axis::Columns => {
                        let position = (field_index, counter[field_index]);
                        counter[field_index] += 1;
                        (CellInfo::new(None, Some(current), contents), position)
                    }
                };
                cells.insert(position.0, position.1, cell);
                last_value[field_index] = Some(value);
                last_cell[field_index] = position;
            } else {
                let (row, column) = last_cell[field_index];
                let cell = cells
                    .get_mut(row, column)
                    .unwrap_or_else(|| panic!("span target ({}, {}) missing", row, column));
                match axis {
                    Axis::Rows => cell.row_span += 1,
                    Axis::Columns => cell.col_span += 1,
                }
            }
        }
    }
    cells
}

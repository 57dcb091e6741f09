//! FILENAME: core/spreadsheet-engine/src/tests.rs
//! PURPOSE: End-to-end tests of processing and rendering a pivot.

use serde_json::{json, Value};
use tko_query::{ConditionPayload, HeaderField, StatusColor, TestSet};

use crate::cell::{header_from, UNRESOLVED_VALUE};
use crate::error::SpreadsheetError;
use crate::limits::{SpreadsheetLimits, MIN_TABLE_SIZE_PX, SCROLLBAR_FUDGE};
use crate::processor::{DataProcessor, GroupData, ProcessOutcome};
use crate::render::RenderCycle;
use crate::scheduler::{run_to_completion, IncrementalCommand, Tick};
use crate::spreadsheet::{ClickTarget, Spreadsheet};
use crate::surface::{CellTarget, MemorySurface, SpreadsheetSurface, Table};

fn sheet() -> Spreadsheet<MemorySurface> {
    Spreadsheet::new(MemorySurface::new(1024, 768), SpreadsheetLimits::default())
}

fn process(
    sheet: &mut Spreadsheet<MemorySurface>,
    response: Value,
    rows: &[&str],
    columns: &[&str],
) -> (Result<ProcessOutcome, SpreadsheetError>, usize) {
    let data = GroupData::from_response(&response).unwrap();
    let mut processor = DataProcessor::new(
        data,
        rows.iter().map(|s| s.to_string()).collect(),
        columns.iter().map(|s| s.to_string()).collect(),
        *sheet.limits(),
    );
    run_to_completion(&mut processor, sheet)
}

fn headers(values: &[&[&str]]) -> Value {
    Value::Array(values.iter().map(|h| json!(h)).collect())
}

// ========================================
// END TO END
// ========================================

#[test]
fn test_single_cell_pivot() {
    let mut sheet = sheet();
    let response = json!({
        "header_values": [[["x86"]], [["4.4"]]],
        "groups": [{
            "header_indices": [0, 0], "group_count": 5, "pass_count": 4,
            "complete_count": 5, "incomplete_count": 0
        }]
    });
    let (outcome, _) = process(&mut sheet, response, &["platform"], &["kernel"]);
    let ProcessOutcome::Rendered(summary) = outcome.unwrap() else {
        panic!("expected a rendered pivot");
    };
    assert_eq!(summary.total_tests, 5);

    let cell = sheet.data_cell(0, 0).unwrap();
    assert_eq!(cell.contents, "4 / 5");
    assert_eq!(cell.color, Some(StatusColor::Orange));
    assert_eq!(sheet.row_header_cells().get(0, 0).unwrap().contents, "x86");
    assert_eq!(sheet.column_header_cells().get(0, 0).unwrap().contents, "4.4");

    let surface = sheet.surface();
    assert!(surface.is_data_visible());
    assert_eq!(surface.cell(Table::Data, 0, 0).unwrap().contents, "4 / 5");
    assert!(!sheet.is_rendering());
}

#[test]
fn test_empty_groups_report_no_results() {
    let mut sheet = sheet();
    let response = json!({"header_values": [[], []], "groups": []});
    let (outcome, ticks) = process(&mut sheet, response, &["platform"], &["kernel"]);
    assert_eq!(outcome, Ok(ProcessOutcome::NoResults));
    assert_eq!(ticks, 1);
    assert_eq!(sheet.surface().row_count(Table::RowHeaders), 0);
}

#[test]
fn test_cell_budget_rejects_before_layout() {
    let rows: Vec<Vec<String>> = (0..1000).map(|i| vec![format!("host{}", i)]).collect();
    let columns: Vec<Vec<String>> = (0..501).map(|i| vec![format!("test{}", i)]).collect();
    let response = json!({
        "header_values": [rows, columns],
        "groups": [{"header_indices": [0, 0], "group_count": 1, "pass_count": 1, "complete_count": 1}]
    });
    let mut sheet = sheet();
    let (outcome, ticks) = process(&mut sheet, response, &["hostname"], &["test_name"]);
    assert_eq!(
        outcome,
        Err(SpreadsheetError::TooManyCells { cell_count: 501_000, max: 500_000 })
    );
    assert_eq!(
        outcome.unwrap_err().to_string(),
        "Resulting spreadsheet contains 501000 cells, exceeding maximum 500000"
    );
    assert_eq!(ticks, 1);
    assert_eq!(sheet.row_count(), 0);
}

#[test]
fn test_render_spans_many_ticks() {
    let rows: Vec<Vec<String>> = (0..50).map(|i| vec![format!("host{:02}", i)]).collect();
    let columns: Vec<Vec<String>> = (0..100).map(|i| vec![format!("test{:03}", i)]).collect();
    let groups: Vec<Value> = (0..50)
        .map(|i| json!({"header_indices": [i, i], "group_count": 2, "pass_count": 2, "complete_count": 2}))
        .collect();
    let response = json!({"header_values": [rows, columns], "groups": groups});

    let mut sheet = sheet();
    let (outcome, ticks) = process(&mut sheet, response, &["hostname"], &["test_name"]);
    let ProcessOutcome::Rendered(summary) = outcome.unwrap() else {
        panic!("expected a rendered pivot");
    };
    // 1000 cells per batch over 100 columns
    assert_eq!(summary.render.rows_per_fragment, 10);
    assert_eq!(summary.render.fragments, 5);
    assert_eq!(sheet.surface().fragment_count(), 5);
    assert!(ticks > summary.render.ticks);
    assert_eq!(sheet.surface().row_count(Table::Data), 50);

    // fragment-local rows map back to global rows
    let cell = sheet
        .resolve_click(ClickTarget::Data { fragment: 1, row: 0, column: 10 })
        .unwrap();
    assert_eq!(cell.row, Some(header_from(&["host10"])));
    assert_eq!(cell.column, Some(header_from(&["test010"])));
    let cell = sheet
        .resolve_click(ClickTarget::Data { fragment: 4, row: 9, column: 49 })
        .unwrap();
    assert_eq!(cell.row, Some(header_from(&["host49"])));
    assert!(sheet.resolve_click(ClickTarget::Data { fragment: 1, row: 0, column: 0 }).is_none());
}

#[test]
fn test_rendering_flag_guards_selection() {
    let mut sheet = sheet();
    sheet.set_header_fields(&["platform"], &["kernel"]);
    sheet.add_row_header(&["x86"]);
    sheet.add_column_header(&["4.4"]);
    sheet.prepare_for_data();
    sheet.cell_info_mut(0, 0).contents = "1 / 1".into();

    let mut cycle = RenderCycle::new();
    assert_eq!(cycle.execute(&mut sheet), Tick::Pending);
    assert!(sheet.is_rendering());
    let cell = sheet.data_cell(0, 0).unwrap().clone();
    assert_eq!(sheet.toggle_selection(&cell), Err(SpreadsheetError::RenderInProgress));

    run_to_completion(&mut cycle, &mut sheet);
    assert!(!sheet.is_rendering());
    assert_eq!(sheet.toggle_selection(&cell), Ok(true));
    assert!(sheet.surface().is_highlighted(CellTarget { table: Table::Data, row: 0, column: 0 }));
    sheet.clear_selection().unwrap();
    assert!(!sheet.surface().is_highlighted(CellTarget { table: Table::Data, row: 0, column: 0 }));
}

#[test]
fn test_unresolved_groups_fold_into_bucket() {
    let mut sheet = sheet();
    let response = json!({
        "header_values": [[["host1"]], [["GOOD"]]],
        "groups": [
            {"header_indices": [0, 0], "group_count": 1, "pass_count": 1, "complete_count": 1, "test_idx": 10},
            {"header_indices": [null, 0], "group_count": 2, "pass_count": 1, "complete_count": 2},
            {"header_indices": [null, 0], "group_count": 3, "pass_count": 0, "complete_count": 3}
        ]
    });
    let (outcome, _) = process(&mut sheet, response, &["hostname"], &["status"]);
    let ProcessOutcome::Rendered(summary) = outcome.unwrap() else {
        panic!("expected a rendered pivot");
    };
    assert_eq!(summary.total_tests, 6);
    assert_eq!(sheet.row_count(), 2);
    let bucket = sheet.row_position(&header_from(&[UNRESOLVED_VALUE])).unwrap();
    let cell = sheet.data_cell(bucket, 0).unwrap();
    assert_eq!(cell.contents, "1 / 5");
    assert_eq!(cell.test_count, 5);
    assert_eq!(sheet.all_test_indices(), vec![10]);

    let hostname = HeaderField::simple("Hostname", "hostname");
    let status = HeaderField::simple("Status", "status");
    let clicked = sheet
        .resolve_click(ClickTarget::Data { fragment: 0, row: bucket, column: 0 })
        .unwrap();
    assert!(clicked.is_unresolved());
    let set = clicked
        .test_set(&ConditionPayload::default(), &[&hostname], &[&status])
        .unwrap();
    assert!(set.is_none());
}

#[test]
fn test_out_of_range_index_is_malformed() {
    let response = json!({
        "header_values": [[["a"]], [["b"]]],
        "groups": [{"header_indices": [3, 0], "group_count": 1}]
    });
    assert!(matches!(
        GroupData::from_response(&response),
        Err(SpreadsheetError::MalformedGroup(_))
    ));
}

#[test]
fn test_header_arity_mismatch_is_malformed() {
    let mut sheet = sheet();
    let response = json!({
        "header_values": [[["a", "b"]], [["c"]]],
        "groups": [{"header_indices": [0, 0], "group_count": 1}]
    });
    let (outcome, _) = process(&mut sheet, response, &["platform"], &["kernel"]);
    assert!(matches!(outcome, Err(SpreadsheetError::MalformedGroup(_))));
}

// ========================================
// CLICKS
// ========================================

fn two_level_sheet() -> Spreadsheet<MemorySurface> {
    let mut sheet = sheet();
    let response = json!({
        "header_values": [
            headers(&[&["a", "x"], &["a", "y"], &["b", "x"]]),
            [["GOOD"]]
        ],
        "groups": [
            {"header_indices": [0, 0], "group_count": 1, "pass_count": 1, "complete_count": 1, "test_idx": 1},
            {"header_indices": [2, 0], "group_count": 4, "pass_count": 3, "complete_count": 4}
        ]
    });
    let (outcome, _) = process(&mut sheet, response, &["platform", "hostname"], &["status"]);
    assert!(outcome.is_ok());
    sheet
}

#[test]
fn test_row_header_click_index_adjustment() {
    let sheet = two_level_sheet();
    // Row 1 starts at field 1: the outer "a" cell spans into it.
    let cell = sheet.resolve_click(ClickTarget::RowHeaders { row: 1, column: 0 }).unwrap();
    assert_eq!(cell.row, Some(header_from(&["a", "y"])));
    let outer = sheet.resolve_click(ClickTarget::RowHeaders { row: 0, column: 0 }).unwrap();
    assert_eq!(outer.row, Some(header_from(&["a"])));
    assert_eq!(outer.row_span, 2);
}

#[test]
fn test_blank_data_cell_is_not_clickable() {
    let sheet = two_level_sheet();
    assert!(sheet.resolve_click(ClickTarget::Data { fragment: 0, row: 1, column: 0 }).is_none());
    let cell = sheet.resolve_click(ClickTarget::Data { fragment: 0, row: 2, column: 0 }).unwrap();
    assert_eq!(cell.contents, "3 / 4");
}

#[test]
fn test_clicked_cells_drill_into_test_sets() {
    let sheet = two_level_sheet();
    let platform = HeaderField::simple("Platform", "platform");
    let hostname = HeaderField::simple("Hostname", "hostname");
    let status = HeaderField::simple("Status", "status");
    let initial = ConditionPayload::default();

    let single = sheet.resolve_click(ClickTarget::Data { fragment: 0, row: 0, column: 0 }).unwrap();
    let set = single.test_set(&initial, &[&platform, &hostname], &[&status]).unwrap();
    assert_eq!(set, Some(TestSet::Single { test_index: 1 }));

    let outer = sheet.resolve_click(ClickTarget::RowHeaders { row: 0, column: 0 }).unwrap();
    let set = outer.test_set(&initial, &[&platform, &hostname], &[&status]).unwrap().unwrap();
    assert_eq!(set.sql_condition(), "((platform = 'a'))");
}

#[test]
fn test_row_header_highlight_targets() {
    let mut sheet = two_level_sheet();
    let leaf = sheet.resolve_click(ClickTarget::RowHeaders { row: 1, column: 0 }).unwrap();
    let outer = sheet.resolve_click(ClickTarget::RowHeaders { row: 0, column: 0 }).unwrap();
    let last = sheet.resolve_click(ClickTarget::RowHeaders { row: 2, column: 1 }).unwrap();

    assert_eq!(sheet.toggle_selection(&leaf), Ok(true));
    assert_eq!(sheet.toggle_selection(&outer), Ok(true));
    assert_eq!(sheet.toggle_selection(&last), Ok(true));
    let surface = sheet.surface();
    assert!(surface.is_highlighted(CellTarget { table: Table::RowHeaders, row: 1, column: 0 }));
    assert!(surface.is_highlighted(CellTarget { table: Table::RowHeaders, row: 0, column: 0 }));
    assert!(surface.is_highlighted(CellTarget { table: Table::RowHeaders, row: 2, column: 1 }));
    assert!(!surface.is_highlighted(CellTarget { table: Table::RowHeaders, row: 0, column: 1 }));

    sheet.clear_selection().unwrap();
    assert!(!sheet.surface().is_highlighted(CellTarget { table: Table::RowHeaders, row: 0, column: 0 }));
}

#[test]
fn test_column_header_highlight_targets() {
    let mut sheet = sheet();
    let response = json!({
        "header_values": [
            [["GOOD"]],
            headers(&[&["4.4", "debug"], &["4.4", "release"], &["5.10", "debug"]])
        ],
        "groups": [
            {"header_indices": [0, 0], "group_count": 2, "pass_count": 2, "complete_count": 2},
            {"header_indices": [0, 2], "group_count": 3, "pass_count": 1, "complete_count": 3}
        ]
    });
    let (outcome, _) = process(&mut sheet, response, &["status"], &["kernel", "build"]);
    assert!(outcome.is_ok());

    let outer = sheet.resolve_click(ClickTarget::ColumnHeaders { row: 0, column: 1 }).unwrap();
    assert_eq!(outer.column, Some(header_from(&["5.10"])));
    let leaf = sheet.resolve_click(ClickTarget::ColumnHeaders { row: 1, column: 2 }).unwrap();
    assert_eq!(leaf.column, Some(header_from(&["5.10", "debug"])));

    sheet.toggle_selection(&outer).unwrap();
    sheet.toggle_selection(&leaf).unwrap();
    let surface = sheet.surface();
    assert!(surface.is_highlighted(CellTarget { table: Table::ColumnHeaders, row: 0, column: 1 }));
    assert!(surface.is_highlighted(CellTarget { table: Table::ColumnHeaders, row: 1, column: 2 }));
    assert!(!surface.is_highlighted(CellTarget { table: Table::ColumnHeaders, row: 0, column: 2 }));
}

// ========================================
// SIZING
// ========================================

#[test]
fn test_fill_window_clamps_to_minimum() {
    let mut sheet = Spreadsheet::new(MemorySurface::new(50, 40), SpreadsheetLimits::default());
    sheet.fill_window(false);
    let layout = sheet.surface().layout();
    assert_eq!(layout.row_headers_clip_height, MIN_TABLE_SIZE_PX);
    assert_eq!(layout.scroller_width, MIN_TABLE_SIZE_PX + SCROLLBAR_FUDGE);
}

#[test]
fn test_headers_aligned_with_data_after_render() {
    let sheet = two_level_sheet();
    let surface = sheet.surface();
    for row in 0..3 {
        assert_eq!(
            surface.row_height(Table::RowHeaders, row),
            surface.row_height(Table::Data, row)
        );
    }
    assert_eq!(
        surface.column_width(Table::ColumnHeaders, 0),
        surface.column_width(Table::Data, 0)
    );
    let layout = surface.layout();
    assert!(layout.row_headers_clip_height <= surface.table_bounds(Table::RowHeaders).height);
}

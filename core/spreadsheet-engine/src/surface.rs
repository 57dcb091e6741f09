//! FILENAME: core/spreadsheet-engine/src/surface.rs
//! PURPOSE: The rendering backend the grid engine draws into.
//! CONTEXT: The engine owns layout and cell data; a surface owns the three
//! rendered tables (row headers, column headers, fragmented data body),
//! their measurements, and the clip/scroll containers around them.
//! `MemorySurface` is a headless surface with fixed text metrics, used for
//! exports, tests and benchmarks.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tko_query::StatusColor;

use crate::cell::CellInfo;
use crate::limits::{CELL_PADDING_PX, TD_BORDER_PX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    RowHeaders,
    ColumnHeaders,
    Data,
}

/// Absolute position and offset size of a rendered element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Container sizes applied in one go by `fill_window`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowLayout {
    pub row_headers_clip_height: i32,
    pub column_headers_clip_width: i32,
    pub scroller_width: i32,
    pub scroller_height: i32,
}

/// What a surface needs to draw one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCell {
    pub contents: String,
    pub color: Option<StatusColor>,
    pub width_px: Option<i32>,
    pub height_px: Option<i32>,
    pub row_span: u32,
    pub col_span: u32,
    /// False for placeholders and blank data positions.
    pub clickable: bool,
}

impl RenderedCell {
    pub fn blank() -> Self {
        RenderedCell {
            contents: String::new(),
            color: None,
            width_px: None,
            height_px: None,
            row_span: 1,
            col_span: 1,
            clickable: false,
        }
    }
}

impl From<&CellInfo> for RenderedCell {
    fn from(cell: &CellInfo) -> Self {
        RenderedCell {
            contents: cell.contents.clone(),
            color: cell.color,
            width_px: cell.width_px,
            height_px: cell.height_px,
            row_span: cell.row_span,
            col_span: cell.col_span,
            clickable: !cell.is_empty(),
        }
    }
}

/// Location of a rendered cell. Data rows are global row indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellTarget {
    pub table: Table,
    pub row: usize,
    pub column: usize,
}

pub trait SpreadsheetSurface {
    /// Inner size of the window, `(width, height)`.
    fn client_size(&self) -> (i32, i32);

    fn table_bounds(&self, table: Table) -> Bounds;

    /// Replaces a header table's content.
    fn render_table(&mut self, table: Table, rows: Vec<Vec<RenderedCell>>);

    fn set_rows_per_fragment(&mut self, rows: usize);

    /// Appends one data-body fragment.
    fn append_fragment(&mut self, rows: Vec<Vec<RenderedCell>>);

    /// Publishes appended fragments so they can be measured and clicked.
    fn update_body_elements(&mut self);

    fn set_data_visible(&mut self, visible: bool);

    fn set_row_headers_clip_width(&mut self, width_px: i32);

    fn apply_layout(&mut self, layout: WindowLayout);

    fn row_count(&self, table: Table) -> usize;

    fn cell_count(&self, table: Table, row: usize) -> usize;

    /// Offset height of the last cell in `row`.
    fn row_height(&self, table: Table, row: usize) -> i32;

    /// Offset width of the cell at `column` in the last row.
    fn column_width(&self, table: Table, column: usize) -> i32;

    fn set_highlighted(&mut self, target: CellTarget, highlighted: bool);

    /// Scroll offsets of the floating header tables.
    fn set_header_offsets(&mut self, row_headers_top: i32, column_headers_left: i32);

    fn reset(&mut self);
}

// ============================================================================
// HEADLESS SURFACE
// ============================================================================

/// Average glyph width used to measure text.
pub const CHAR_WIDTH_PX: i32 = 7;
pub const LINE_HEIGHT_PX: i32 = 16;

#[derive(Debug, Clone)]
pub struct MemorySurface {
    client_width: i32,
    client_height: i32,
    tables: FxHashMap<Table, Vec<Vec<RenderedCell>>>,
    /// Data rows appended but not yet published.
    pending_rows: Vec<Vec<RenderedCell>>,
    rows_per_fragment: usize,
    fragment_count: usize,
    data_visible: bool,
    row_headers_clip_width: i32,
    layout: WindowLayout,
    header_offsets: (i32, i32),
    highlighted: FxHashSet<CellTarget>,
}

impl MemorySurface {
    pub fn new(client_width: i32, client_height: i32) -> Self {
        MemorySurface {
            client_width,
            client_height,
            tables: FxHashMap::default(),
            pending_rows: Vec::new(),
            rows_per_fragment: 1,
            fragment_count: 0,
            data_visible: true,
            row_headers_clip_width: 0,
            layout: WindowLayout::default(),
            header_offsets: (0, 0),
            highlighted: FxHashSet::default(),
        }
    }

    pub fn set_client_size(&mut self, width: i32, height: i32) {
        self.client_width = width;
        self.client_height = height;
    }

    pub fn rows(&self, table: Table) -> &[Vec<RenderedCell>] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, table: Table, row: usize, column: usize) -> Option<&RenderedCell> {
        self.rows(table).get(row).and_then(|r| r.get(column))
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    pub fn rows_per_fragment(&self) -> usize {
        self.rows_per_fragment
    }

    pub fn is_data_visible(&self) -> bool {
        self.data_visible
    }

    pub fn layout(&self) -> WindowLayout {
        self.layout
    }

    pub fn row_headers_clip_width(&self) -> i32 {
        self.row_headers_clip_width
    }

    pub fn header_offsets(&self) -> (i32, i32) {
        self.header_offsets
    }

    pub fn is_highlighted(&self, target: CellTarget) -> bool {
        self.highlighted.contains(&target)
    }

    fn cell_width(cell: &RenderedCell) -> i32 {
        let text = cell
            .contents
            .split("<br>")
            .flat_map(str::lines)
            .map(|line| line.chars().count() as i32)
            .max()
            .unwrap_or(0);
        cell.width_px.unwrap_or(text * CHAR_WIDTH_PX) + 2 * CELL_PADDING_PX + TD_BORDER_PX
    }

    fn cell_height(cell: &RenderedCell) -> i32 {
        let lines = cell.contents.split("<br>").flat_map(str::lines).count().max(1) as i32;
        cell.height_px.unwrap_or(lines * LINE_HEIGHT_PX) + 2 * CELL_PADDING_PX + TD_BORDER_PX
    }

    fn table_width(&self, table: Table) -> i32 {
        self.rows(table)
            .iter()
            .map(|row| row.iter().map(Self::cell_width).sum::<i32>())
            .max()
            .unwrap_or(0)
    }

    fn table_height(&self, table: Table) -> i32 {
        (0..self.row_count(table)).map(|row| self.row_height(table, row)).sum()
    }
}

impl SpreadsheetSurface for MemorySurface {
    fn client_size(&self) -> (i32, i32) {
        (self.client_width, self.client_height)
    }

    fn table_bounds(&self, table: Table) -> Bounds {
        let column_headers_height = self.table_height(Table::ColumnHeaders);
        let row_headers_width = self.table_width(Table::RowHeaders);
        let (left, top) = match table {
            Table::RowHeaders => (0, column_headers_height),
            Table::ColumnHeaders => (row_headers_width, 0),
            Table::Data => (row_headers_width, column_headers_height),
        };
        Bounds {
            left,
            top,
            width: self.table_width(table),
            height: self.table_height(table),
        }
    }

    fn render_table(&mut self, table: Table, rows: Vec<Vec<RenderedCell>>) {
        self.tables.insert(table, rows);
    }

    fn set_rows_per_fragment(&mut self, rows: usize) {
        self.rows_per_fragment = rows.max(1);
    }

    fn append_fragment(&mut self, rows: Vec<Vec<RenderedCell>>) {
        self.pending_rows.extend(rows);
        self.fragment_count += 1;
    }

    fn update_body_elements(&mut self) {
        let pending = std::mem::take(&mut self.pending_rows);
        self.tables.entry(Table::Data).or_default().extend(pending);
    }

    fn set_data_visible(&mut self, visible: bool) {
        self.data_visible = visible;
    }

    fn set_row_headers_clip_width(&mut self, width_px: i32) {
        self.row_headers_clip_width = width_px;
    }

    fn apply_layout(&mut self, layout: WindowLayout) {
        self.layout = layout;
    }

    fn row_count(&self, table: Table) -> usize {
        self.rows(table).len()
    }

    fn cell_count(&self, table: Table, row: usize) -> usize {
        self.rows(table).get(row).map(Vec::len).unwrap_or(0)
    }

    fn row_height(&self, table: Table, row: usize) -> i32 {
        self.rows(table)
            .get(row)
            .and_then(|cells| cells.last())
            .map(Self::cell_height)
            .unwrap_or(0)
    }

    fn column_width(&self, table: Table, column: usize) -> i32 {
        self.rows(table)
            .last()
            .and_then(|cells| cells.get(column))
            .map(Self::cell_width)
            .unwrap_or(0)
    }

    fn set_highlighted(&mut self, target: CellTarget, highlighted: bool) {
        if highlighted {
            self.highlighted.insert(target);
        } else {
            self.highlighted.remove(&target);
        }
    }

    fn set_header_offsets(&mut self, row_headers_top: i32, column_headers_left: i32) {
        self.header_offsets = (row_headers_top, column_headers_left);
    }

    fn reset(&mut self) {
        self.tables.clear();
        self.pending_rows.clear();
        self.fragment_count = 0;
        self.highlighted.clear();
        self.header_offsets = (0, 0);
    }
}

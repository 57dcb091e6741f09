//! FILENAME: core/spreadsheet-engine/src/spreadsheet.rs
//! PURPOSE: The pivot grid: header keyspaces, sparse data cells, header
//! cells, sizing and click resolution.
//! CONTEXT: Filled by the data processor, drawn by a `RenderCycle` one tick
//! at a time. While a render is in progress the selection cannot change and
//! the grid must not be restructured.

use rustc_hash::FxHashMap;

use crate::cell::{header_from, CellInfo, Header};
use crate::error::{SpreadsheetError, SpreadsheetResult};
use crate::fragment::FragmentIndex;
use crate::grid::CellGrid;
use crate::headers::{compute_header_cells, Axis};
use crate::limits::{
    SpreadsheetLimits, CELL_PADDING_PX, MIN_TABLE_SIZE_PX, SCROLLBAR_FUDGE, TD_BORDER_PX,
    WINDOW_BORDER_PX,
};
use crate::selection::SelectionManager;
use crate::surface::{CellTarget, RenderedCell, SpreadsheetSurface, Table, WindowLayout};

/// A click as reported by a surface, in that table's own coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    RowHeaders { row: usize, column: usize },
    ColumnHeaders { row: usize, column: usize },
    Data { fragment: usize, row: usize, column: usize },
}

#[derive(Debug, Clone, Default)]
struct HeaderKeyspace {
    values: Vec<Header>,
    positions: FxHashMap<Header, usize>,
}

impl HeaderKeyspace {
    fn add(&mut self, header: Header) {
        assert!(
            !self.positions.contains_key(&header),
            "duplicate header {:?}",
            header
        );
        self.positions.insert(header.clone(), self.values.len());
        self.values.push(header);
    }

    fn position(&self, header: &Header) -> SpreadsheetResult<usize> {
        self.positions
            .get(header)
            .copied()
            .ok_or_else(|| SpreadsheetError::UnknownHeader(header.to_vec()))
    }

    fn clear(&mut self) {
        self.values.clear();
        self.positions.clear();
    }
}

pub struct Spreadsheet<S: SpreadsheetSurface> {
    surface: S,
    limits: SpreadsheetLimits,
    row_fields: Vec<String>,
    column_fields: Vec<String>,
    rows: HeaderKeyspace,
    columns: HeaderKeyspace,
    data_cells: CellGrid,
    row_header_cells: CellGrid,
    column_header_cells: CellGrid,
    fragments: FragmentIndex,
    selection: SelectionManager,
    rendering: bool,
}

impl<S: SpreadsheetSurface> Spreadsheet<S> {
    pub fn new(surface: S, limits: SpreadsheetLimits) -> Self {
        Spreadsheet {
            surface,
            limits,
            row_fields: Vec::new(),
            column_fields: Vec::new(),
            rows: HeaderKeyspace::default(),
            columns: HeaderKeyspace::default(),
            data_cells: CellGrid::default(),
            row_header_cells: CellGrid::default(),
            column_header_cells: CellGrid::default(),
            fragments: FragmentIndex::default(),
            selection: SelectionManager::new(),
            rendering: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn limits(&self) -> &SpreadsheetLimits {
        &self.limits
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub(crate) fn set_rendering(&mut self, rendering: bool) {
        self.rendering = rendering;
    }

    fn assert_not_rendering(&self, operation: &str) {
        assert!(!self.rendering, "{} during render", operation);
    }

    // ========================================================================
    // STRUCTURE
    // ========================================================================

    /// Field SQL names per axis. Every header added later must have one
    /// value per field.
    pub fn set_header_fields<S1: AsRef<str>, S2: AsRef<str>>(
        &mut self,
        row_fields: &[S1],
        column_fields: &[S2],
    ) {
        self.assert_not_rendering("set_header_fields");
        self.row_fields = row_fields.iter().map(|f| f.as_ref().to_string()).collect();
        self.column_fields = column_fields.iter().map(|f| f.as_ref().to_string()).collect();
    }

    pub fn row_fields(&self) -> &[String] {
        &self.row_fields
    }

    pub fn column_fields(&self) -> &[String] {
        &self.column_fields
    }

    pub fn add_row_header<V: AsRef<str>>(&mut self, header: &[V]) {
        self.assert_not_rendering("add_row_header");
        assert_eq!(header.len(), self.row_fields.len(), "row header arity");
        self.rows.add(header_from(header));
    }

    pub fn add_column_header<V: AsRef<str>>(&mut self, header: &[V]) {
        self.assert_not_rendering("add_column_header");
        assert_eq!(header.len(), self.column_fields.len(), "column header arity");
        self.columns.add(header_from(header));
    }

    pub fn contains_row_header(&self, header: &Header) -> bool {
        self.rows.positions.contains_key(header)
    }

    pub fn contains_column_header(&self, header: &Header) -> bool {
        self.columns.positions.contains_key(header)
    }

    pub fn row_count(&self) -> usize {
        self.rows.values.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.values.len()
    }

    pub fn row_position(&self, header: &Header) -> SpreadsheetResult<usize> {
        self.rows.position(header)
    }

    pub fn column_position(&self, header: &Header) -> SpreadsheetResult<usize> {
        self.columns.position(header)
    }

    /// Allocates the data grid. Call after all headers are added and before
    /// any data cell is touched.
    pub fn prepare_for_data(&mut self) {
        self.assert_not_rendering("prepare_for_data");
        self.data_cells = CellGrid::new(self.row_count(), self.column_count());
    }

    /// The data cell at `(row, column)`, created empty on first access.
    pub fn cell_info_mut(&mut self, row: usize, column: usize) -> &mut CellInfo {
        let row_header = self.rows.values[row].clone();
        let column_header = self.columns.values[column].clone();
        self.data_cells
            .get_or_insert_with(row, column, || CellInfo::new(Some(row_header), Some(column_header), ""))
    }

    pub fn data_cell(&self, row: usize, column: usize) -> Option<&CellInfo> {
        self.data_cells.get(row, column)
    }

    pub fn data_cells(&self) -> &CellGrid {
        &self.data_cells
    }

    pub fn row_header_cells(&self) -> &CellGrid {
        &self.row_header_cells
    }

    pub fn column_header_cells(&self) -> &CellGrid {
        &self.column_header_cells
    }

    pub fn fragments(&self) -> FragmentIndex {
        self.fragments
    }

    /// Forgets all headers and cells and resets the surface.
    pub fn clear(&mut self) {
        self.assert_not_rendering("clear");
        self.rows.clear();
        self.columns.clear();
        self.data_cells.clear();
        self.row_header_cells.clear();
        self.column_header_cells.clear();
        self.selection.clear();
        self.surface.reset();
        self.surface.set_header_offsets(0, 0);
    }

    // ========================================================================
    // RENDER STEPS
    // ========================================================================

    pub(crate) fn compute_rows_per_iteration(&mut self) -> usize {
        let rows = self.limits.rows_per_iteration(self.column_count());
        self.fragments = FragmentIndex::new(rows);
        self.surface.set_rows_per_fragment(rows);
        rows
    }

    pub(crate) fn compute_header_cells(&mut self) {
        self.row_header_cells = compute_header_cells(Axis::Rows, &self.row_fields, &self.rows.values);
        self.column_header_cells =
            compute_header_cells(Axis::Columns, &self.column_fields, &self.columns.values);
    }

    /// Header tables skip missing cells; the spans of earlier cells cover them.
    fn header_rows(cells: &CellGrid) -> Vec<Vec<RenderedCell>> {
        (0..cells.rows())
            .map(|row| cells.row(row).into_iter().flatten().map(RenderedCell::from).collect())
            .collect()
    }

    pub(crate) fn render_headers(&mut self) {
        let row_headers = Self::header_rows(&self.row_header_cells);
        let column_headers = Self::header_rows(&self.column_header_cells);
        self.surface.render_table(Table::RowHeaders, row_headers);
        self.surface.render_table(Table::ColumnHeaders, column_headers);
    }

    /// Lets the row-header container show the headers' full width.
    pub(crate) fn expand_row_headers(&mut self) {
        let width = self.surface.table_bounds(Table::RowHeaders).width;
        self.surface.set_row_headers_clip_width(width);
    }

    /// Renders `count` data rows starting at `start` as one fragment.
    /// Returns the row after the last one rendered.
    pub(crate) fn render_rows(&mut self, start: usize, count: usize) -> usize {
        let end = (start + count).min(self.row_count());
        let rows: Vec<Vec<RenderedCell>> = (start..end)
            .map(|row| {
                self.data_cells
                    .row(row)
                    .into_iter()
                    .map(|cell| cell.map(RenderedCell::from).unwrap_or_else(RenderedCell::blank))
                    .collect()
            })
            .collect();
        self.surface.append_fragment(rows);
        end
    }

    pub(crate) fn set_data_visible(&mut self, visible: bool) {
        self.surface.set_data_visible(visible);
    }

    pub(crate) fn update_body_elements(&mut self) {
        self.surface.update_body_elements();
    }

    /// Room left for a table dimension after edge decoration, never below
    /// the minimum table size.
    pub fn adjust_max_dimension(max_dimension_px: i32) -> i32 {
        (max_dimension_px - WINDOW_BORDER_PX - SCROLLBAR_FUDGE).max(MIN_TABLE_SIZE_PX)
    }

    /// Sizes the containers to fill the window right of and below the
    /// headers. With `use_table_size`, never larger than the tables.
    pub fn fill_window(&mut self, use_table_size: bool) {
        let (client_width, client_height) = self.surface.client_size();
        let column_headers = self.surface.table_bounds(Table::ColumnHeaders);
        let row_headers = self.surface.table_bounds(Table::RowHeaders);

        let mut height = Self::adjust_max_dimension(
            client_height - (column_headers.top + column_headers.height),
        );
        let mut width =
            Self::adjust_max_dimension(client_width - (row_headers.left + row_headers.width));
        if use_table_size {
            height = height.min(row_headers.height);
            width = width.min(column_headers.width);
        }

        self.surface.apply_layout(WindowLayout {
            row_headers_clip_height: height,
            column_headers_clip_width: width,
            scroller_width: width + SCROLLBAR_FUDGE,
            scroller_height: height + SCROLLBAR_FUDGE,
        });
    }

    /// Copies rendered row heights of `from` onto the last column of
    /// `to`, creating placeholders where needed.
    pub(crate) fn match_row_heights(&mut self, from: Table, to: Table) {
        let row_count = self.surface.row_count(from);
        let heights: Vec<i32> = (0..row_count)
            .map(|row| self.surface.row_height(from, row) - TD_BORDER_PX)
            .collect();
        let cells = self.grid_mut(to);
        if cells.columns() == 0 {
            return;
        }
        let last_column = cells.columns() - 1;
        for (row, height) in heights.into_iter().enumerate() {
            cells.get_or_placeholder(row, last_column).height_px = Some(height - 2 * CELL_PADDING_PX);
        }
    }

    /// Copies rendered column widths of the last row of `from` onto the last
    /// row of `to`.
    pub(crate) fn match_column_widths(&mut self, from: Table, to: Table) {
        let row_count = self.surface.row_count(from);
        if row_count == 0 {
            return;
        }
        let column_count = self.surface.cell_count(from, row_count - 1);
        let widths: Vec<i32> = (0..column_count)
            .map(|column| self.surface.column_width(from, column) - TD_BORDER_PX)
            .collect();
        let cells = self.grid_mut(to);
        if cells.rows() == 0 {
            return;
        }
        let last_row = cells.rows() - 1;
        for (column, width) in widths.into_iter().enumerate() {
            cells.get_or_placeholder(last_row, column).width_px = Some(width - 2 * CELL_PADDING_PX);
        }
    }

    fn grid_mut(&mut self, table: Table) -> &mut CellGrid {
        match table {
            Table::RowHeaders => &mut self.row_header_cells,
            Table::ColumnHeaders => &mut self.column_header_cells,
            Table::Data => &mut self.data_cells,
        }
    }

    /// Moves the floating headers with the data scroller.
    pub fn on_scroll(&mut self, scroll_left: i32, scroll_top: i32) {
        self.surface.set_header_offsets(-scroll_top, -scroll_left);
    }

    // ========================================================================
    // EVENTS AND SELECTION
    // ========================================================================

    /// Maps a click to the cell under it. Empty cells are not clickable.
    pub fn resolve_click(&self, target: ClickTarget) -> Option<CellInfo> {
        let cell = match target {
            ClickTarget::RowHeaders { row, column } => {
                let column = self.adjust_row_header_column_index(row, column);
                self.row_header_cells.get(row, column)
            }
            ClickTarget::ColumnHeaders { row, column } => self.column_header_cells.get(row, column),
            ClickTarget::Data { fragment, row, column } => {
                let row = self.fragments.global_row(fragment, row);
                self.data_cells.get(row, column)
            }
        }?;
        if cell.is_empty() {
            return None;
        }
        Some(cell.clone())
    }

    /// A row-header row only holds cells for fields whose run starts on that
    /// row, so its first rendered cell belongs to the first field present.
    pub fn adjust_row_header_column_index(&self, row: usize, column: usize) -> usize {
        (0..self.row_fields.len())
            .find(|&field| self.row_header_cells.get(row, field).is_some())
            .map(|field| field + column)
            .unwrap_or_else(|| panic!("failed to find non-empty row header cell in row {}", row))
    }

    fn cell_target(&self, cell: &CellInfo) -> SpreadsheetResult<CellTarget> {
        match (&cell.row, &cell.column) {
            (Some(row), Some(column)) => Ok(CellTarget {
                table: Table::Data,
                row: self.row_position(row)?,
                column: self.column_position(column)?,
            }),
            (Some(row), None) => self.row_header_target(row),
            (None, Some(column)) => self.column_header_target(column),
            (None, None) => Err(SpreadsheetError::UnknownHeader(Vec::new())),
        }
    }

    /// Rendered position of the row-header cell for `header` (a prefix for
    /// outer fields). Rendered rows hold only the cells that start on them.
    fn row_header_target(&self, header: &Header) -> SpreadsheetResult<CellTarget> {
        let unknown = || SpreadsheetError::UnknownHeader(header.to_vec());
        let field = header.len().checked_sub(1).ok_or_else(unknown)?;
        if field >= self.row_header_cells.columns() {
            return Err(unknown());
        }
        let row = (0..self.row_header_cells.rows())
            .find(|&row| {
                self.row_header_cells.get(row, field).and_then(|c| c.row.as_ref()) == Some(header)
            })
            .ok_or_else(unknown)?;
        let first_field = self.adjust_row_header_column_index(row, 0);
        Ok(CellTarget { table: Table::RowHeaders, row, column: field - first_field })
    }

    /// Column-header cells are stored packed, so grid and rendered
    /// positions agree.
    fn column_header_target(&self, header: &Header) -> SpreadsheetResult<CellTarget> {
        let unknown = || SpreadsheetError::UnknownHeader(header.to_vec());
        let field = header.len().checked_sub(1).ok_or_else(unknown)?;
        if field >= self.column_header_cells.rows() {
            return Err(unknown());
        }
        let column = (0..self.column_header_cells.columns())
            .find(|&column| {
                self.column_header_cells.get(field, column).and_then(|c| c.column.as_ref())
                    == Some(header)
            })
            .ok_or_else(unknown)?;
        Ok(CellTarget { table: Table::ColumnHeaders, row: field, column })
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    /// Toggles a cell in the selection and its highlight.
    pub fn toggle_selection(&mut self, cell: &CellInfo) -> SpreadsheetResult<bool> {
        if self.rendering {
            return Err(SpreadsheetError::RenderInProgress);
        }
        let target = self.cell_target(cell)?;
        let selected = self.selection.toggle(cell);
        self.surface.set_highlighted(target, selected);
        Ok(selected)
    }

    pub fn clear_selection(&mut self) -> SpreadsheetResult<()> {
        if self.rendering {
            return Err(SpreadsheetError::RenderInProgress);
        }
        for cell in self.selection.clear() {
            if let Ok(target) = self.cell_target(&cell) {
                self.surface.set_highlighted(target, false);
            }
        }
        Ok(())
    }

    pub fn selected_cells(&self) -> &[CellInfo] {
        self.selection.selected_cells()
    }

    /// Test indices of every populated data cell, row-major.
    pub fn all_test_indices(&self) -> Vec<i64> {
        self.data_cells
            .iter()
            .filter(|(_, cell)| !cell.is_empty())
            .filter_map(|(_, cell)| cell.test_index)
            .collect()
    }
}

//! FILENAME: core/spreadsheet-engine/src/render.rs
//! PURPOSE: The staged render of a filled spreadsheet.
//! CONTEXT: Each phase runs in its own tick. Only one side of the
//! header/data alignment is measurable at each stage, so sizes are copied
//! from the headers onto the data before it is drawn and back onto the
//! headers once the data rows exist.

use crate::scheduler::{IncrementalCommand, Tick};
use crate::spreadsheet::Spreadsheet;
use crate::surface::{SpreadsheetSurface, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    ComputeHeaders,
    RenderHeaders,
    FillWindow,
    MatchDataToHeaders,
    RenderRows { next_row: usize },
    RevealData,
    MatchRowHeaders,
    MatchColumnHeaders,
    ShrinkToTable,
    Finished,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub ticks: usize,
    pub fragments: usize,
    pub rows_per_fragment: usize,
}

#[derive(Debug, Clone)]
pub struct RenderCycle {
    phase: RenderPhase,
    stats: RenderStats,
}

impl Default for RenderCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderCycle {
    pub fn new() -> Self {
        RenderCycle {
            phase: RenderPhase::ComputeHeaders,
            stats: RenderStats::default(),
        }
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }
}

impl<S: SpreadsheetSurface> IncrementalCommand<Spreadsheet<S>> for RenderCycle {
    type Output = RenderStats;

    fn execute(&mut self, sheet: &mut Spreadsheet<S>) -> Tick<RenderStats> {
        self.stats.ticks += 1;
        self.phase = match self.phase {
            RenderPhase::ComputeHeaders => {
                sheet.set_rendering(true);
                self.stats.rows_per_fragment = sheet.compute_rows_per_iteration();
                sheet.compute_header_cells();
                RenderPhase::RenderHeaders
            }
            RenderPhase::RenderHeaders => {
                sheet.render_headers();
                sheet.expand_row_headers();
                RenderPhase::FillWindow
            }
            RenderPhase::FillWindow => {
                sheet.fill_window(false);
                RenderPhase::MatchDataToHeaders
            }
            RenderPhase::MatchDataToHeaders => {
                sheet.match_row_heights(Table::RowHeaders, Table::Data);
                sheet.match_column_widths(Table::ColumnHeaders, Table::Data);
                sheet.set_data_visible(false);
                if sheet.row_count() == 0 {
                    RenderPhase::RevealData
                } else {
                    RenderPhase::RenderRows { next_row: 0 }
                }
            }
            RenderPhase::RenderRows { next_row } => {
                let next_row = sheet.render_rows(next_row, self.stats.rows_per_fragment);
                self.stats.fragments += 1;
                if next_row >= sheet.row_count() {
                    RenderPhase::RevealData
                } else {
                    RenderPhase::RenderRows { next_row }
                }
            }
            RenderPhase::RevealData => {
                sheet.update_body_elements();
                sheet.set_data_visible(true);
                RenderPhase::MatchRowHeaders
            }
            RenderPhase::MatchRowHeaders => {
                sheet.match_row_heights(Table::Data, Table::RowHeaders);
                RenderPhase::MatchColumnHeaders
            }
            RenderPhase::MatchColumnHeaders => {
                sheet.match_column_widths(Table::Data, Table::ColumnHeaders);
                sheet.render_headers();
                RenderPhase::ShrinkToTable
            }
            RenderPhase::ShrinkToTable => {
                sheet.fill_window(true);
                sheet.set_rendering(false);
                log::debug!(
                    target: "SPREADSHEET",
                    "rendered {} fragments in {} ticks",
                    self.stats.fragments,
                    self.stats.ticks
                );
                self.phase = RenderPhase::Finished;
                return Tick::Ready(self.stats);
            }
            RenderPhase::Finished => return Tick::Ready(self.stats),
        };
        Tick::Pending
    }
}

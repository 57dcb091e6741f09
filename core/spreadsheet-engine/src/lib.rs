//! FILENAME: core/spreadsheet-engine/src/lib.rs
//! Pivot spreadsheet engine for the TKO results browser.
//!
//! This crate lays out grouped test results as a row x column pivot and
//! draws it through a `SpreadsheetSurface`, one scheduler tick at a time.
//!
//! Layers:
//! - `processor`: backend groups -> header keyspaces and data cells
//! - `spreadsheet`: the grid itself (cells, sizing, clicks, selection)
//! - `headers`: run-length collapsed header cells
//! - `render`: the staged render state machine
//! - `scheduler`: resumable commands
//! - `surface`: the rendering backend seam and a headless implementation

pub mod cell;
pub mod error;
pub mod fragment;
pub mod grid;
pub mod headers;
pub mod limits;
pub mod processor;
pub mod render;
pub mod scheduler;
pub mod selection;
pub mod spreadsheet;
pub mod surface;

pub use cell::{header_from, CellInfo, Header, UNRESOLVED_VALUE};
pub use error::{SpreadsheetError, SpreadsheetResult};
pub use fragment::FragmentIndex;
pub use grid::CellGrid;
pub use headers::{compute_header_cells, format_header, Axis};
pub use limits::*;
pub use processor::{DataProcessor, GroupData, GroupRow, ProcessOutcome, ProcessSummary};
pub use render::{RenderCycle, RenderPhase, RenderStats};
pub use scheduler::{run_to_completion, IncrementalCommand, Tick};
pub use selection::SelectionManager;
pub use spreadsheet::{ClickTarget, Spreadsheet};
pub use surface::{Bounds, CellTarget, MemorySurface, RenderedCell, SpreadsheetSurface, Table, WindowLayout};

// Cross-module tests
#[cfg(test)]
mod tests;

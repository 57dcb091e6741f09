//! FILENAME: core/spreadsheet-engine/src/processor.rs
//! PURPOSE: Turns a grouped backend response into a filled, rendered
//! spreadsheet.
//! CONTEXT: The response carries the row and column header keyspaces and
//! one entry per populated (row, column) group. Processing is incremental:
//! headers, grid allocation, group rows in batches, then the render cycle.
//! Groups whose header index is absent are folded into a synthetic
//! "(unresolved)" row or column instead of being dropped.

use rustc_hash::FxHashMap;
use serde_json::Value;

use tko_query::{StatusSummary, JSON_NULL};

use crate::cell::{header_from, CellInfo, Header, UNRESOLVED_VALUE};
use crate::error::{SpreadsheetError, SpreadsheetResult};
use crate::limits::SpreadsheetLimits;
use crate::render::{RenderCycle, RenderStats};
use crate::scheduler::{IncrementalCommand, Tick};
use crate::spreadsheet::Spreadsheet;
use crate::surface::SpreadsheetSurface;

// ============================================================================
// RESPONSE MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub row: Option<usize>,
    pub column: Option<usize>,
    pub summary: StatusSummary,
    pub test_index: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupData {
    pub row_headers: Vec<Header>,
    pub column_headers: Vec<Header>,
    pub groups: Vec<GroupRow>,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => JSON_NULL.to_string(),
        other => other.to_string(),
    }
}

fn parse_headers(axis: &Value, name: &str) -> SpreadsheetResult<Vec<Header>> {
    let tuples = axis
        .as_array()
        .ok_or_else(|| SpreadsheetError::MalformedGroup(format!("{} headers are not a list", name)))?;
    tuples
        .iter()
        .map(|tuple| {
            let values = tuple.as_array().ok_or_else(|| {
                SpreadsheetError::MalformedGroup(format!("{} header {} is not a list", name, tuple))
            })?;
            Ok(values.iter().map(value_to_string).collect())
        })
        .collect()
}

fn parse_index(value: Option<&Value>, limit: usize) -> SpreadsheetResult<Option<usize>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(index) if (index as usize) < limit => Ok(Some(index as usize)),
            _ => Err(SpreadsheetError::MalformedGroup(format!(
                "header index {} outside {} headers",
                v, limit
            ))),
        },
    }
}

impl GroupData {
    /// Parses `{header_values: [[row tuples], [column tuples]], groups: [..]}`.
    pub fn from_response(response: &Value) -> SpreadsheetResult<Self> {
        let header_values = response
            .get("header_values")
            .and_then(Value::as_array)
            .filter(|axes| axes.len() == 2)
            .ok_or_else(|| SpreadsheetError::MalformedGroup("missing header_values".to_string()))?;
        let row_headers = parse_headers(&header_values[0], "row")?;
        let column_headers = parse_headers(&header_values[1], "column")?;

        let empty = Vec::new();
        let raw_groups = match response.get("groups") {
            None | Some(Value::Null) => &empty,
            Some(Value::Array(groups)) => groups,
            Some(_) => {
                return Err(SpreadsheetError::MalformedGroup("groups is not a list".to_string()))
            }
        };

        let groups = raw_groups
            .iter()
            .map(|group| {
                let indices = group.get("header_indices").and_then(Value::as_array);
                let index = |position: usize| indices.and_then(|i| i.get(position));
                Ok(GroupRow {
                    row: parse_index(index(0), row_headers.len())?,
                    column: parse_index(index(1), column_headers.len())?,
                    summary: StatusSummary::from_group(group),
                    test_index: group.get("test_idx").and_then(Value::as_i64),
                })
            })
            .collect::<SpreadsheetResult<Vec<_>>>()?;

        Ok(GroupData {
            row_headers,
            column_headers,
            groups,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ============================================================================
// PROCESSOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Sum of group sizes over all cells.
    pub total_tests: u64,
    /// The last cell written. Meaningful when `total_tests == 1`.
    pub last_cell: Option<CellInfo>,
    pub render: RenderStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The query matched nothing; nothing was laid out.
    NoResults,
    Rendered(ProcessSummary),
}

#[derive(Debug, Clone)]
enum ProcessPhase {
    Headers,
    Prepare,
    Rows { next: usize },
    Render(RenderCycle),
    Finished,
}

pub struct DataProcessor {
    data: GroupData,
    row_fields: Vec<String>,
    column_fields: Vec<String>,
    limits: SpreadsheetLimits,
    phase: ProcessPhase,
    total_tests: u64,
    last_cell: Option<CellInfo>,
    unresolved_row: Option<usize>,
    unresolved_column: Option<usize>,
    /// Accumulated summaries of cells fed by more than one group.
    merged: FxHashMap<(usize, usize), StatusSummary>,
}

impl DataProcessor {
    pub fn new(
        data: GroupData,
        row_fields: Vec<String>,
        column_fields: Vec<String>,
        limits: SpreadsheetLimits,
    ) -> Self {
        DataProcessor {
            data,
            row_fields,
            column_fields,
            limits,
            phase: ProcessPhase::Headers,
            total_tests: 0,
            last_cell: None,
            unresolved_row: None,
            unresolved_column: None,
            merged: FxHashMap::default(),
        }
    }

    pub fn total_tests(&self) -> u64 {
        self.total_tests
    }

    fn check_arity(headers: &[Header], fields: &[String], name: &str) -> SpreadsheetResult<()> {
        match headers.iter().find(|h| h.len() != fields.len()) {
            Some(header) => Err(SpreadsheetError::MalformedGroup(format!(
                "{} header {:?} does not match {} fields",
                name,
                header.to_vec(),
                fields.len()
            ))),
            None => Ok(()),
        }
    }

    /// Lays out the header keyspaces after checking the cell budget.
    fn process_headers<S: SpreadsheetSurface>(
        &mut self,
        sheet: &mut Spreadsheet<S>,
    ) -> SpreadsheetResult<()> {
        Self::check_arity(&self.data.row_headers, &self.row_fields, "row")?;
        Self::check_arity(&self.data.column_headers, &self.column_fields, "column")?;

        let needs_row_bucket = self.data.groups.iter().any(|g| g.row.is_none());
        let needs_column_bucket = self.data.groups.iter().any(|g| g.column.is_none());
        let rows = self.data.row_headers.len() + needs_row_bucket as usize;
        let columns = self.data.column_headers.len() + needs_column_bucket as usize;
        self.limits.check_cell_count(rows, columns)?;

        sheet.clear();
        sheet.set_header_fields(&self.row_fields, &self.column_fields);
        for header in &self.data.row_headers {
            sheet.add_row_header(header);
        }
        for header in &self.data.column_headers {
            sheet.add_column_header(header);
        }

        if needs_row_bucket {
            let bucket = header_from(&vec![UNRESOLVED_VALUE; self.row_fields.len()]);
            if !sheet.contains_row_header(&bucket) {
                sheet.add_row_header(&bucket);
            }
            self.unresolved_row = Some(sheet.row_position(&bucket)?);
        }
        if needs_column_bucket {
            let bucket = header_from(&vec![UNRESOLVED_VALUE; self.column_fields.len()]);
            if !sheet.contains_column_header(&bucket) {
                sheet.add_column_header(&bucket);
            }
            self.unresolved_column = Some(sheet.column_position(&bucket)?);
        }
        log::debug!(
            target: "SPREADSHEET",
            "laid out {} x {} headers for {} groups",
            sheet.row_count(),
            sheet.column_count(),
            self.data.groups.len()
        );
        Ok(())
    }

    fn process_row<S: SpreadsheetSurface>(
        &mut self,
        sheet: &mut Spreadsheet<S>,
        index: usize,
    ) -> SpreadsheetResult<()> {
        let group = &self.data.groups[index];
        let bucketed = group.row.is_none() || group.column.is_none();
        let (row, column) = match (group.row.or(self.unresolved_row), group.column.or(self.unresolved_column)) {
            (Some(row), Some(column)) => (row, column),
            _ => {
                return Err(SpreadsheetError::MalformedGroup(format!(
                    "group {} has no resolvable position",
                    index
                )))
            }
        };

        let (summary, test_index) = if bucketed {
            let merged = self.merged.entry((row, column)).or_default();
            merged.passed += group.summary.passed;
            merged.complete += group.summary.complete;
            merged.incomplete += group.summary.incomplete;
            merged.total += group.summary.total;
            merged.extra_info.extend(group.summary.extra_info.iter().cloned());
            let test_index = if merged.total == 1 { group.test_index } else { None };
            (merged.clone(), test_index)
        } else {
            (group.summary.clone(), group.test_index)
        };

        self.total_tests += group.summary.total;
        let cell = sheet.cell_info_mut(row, column);
        cell.contents = summary.format_contents();
        cell.color = Some(summary.color());
        cell.test_count = summary.total;
        cell.test_index = test_index;
        self.last_cell = Some(cell.clone());
        Ok(())
    }

    fn process_some_rows<S: SpreadsheetSurface>(
        &mut self,
        sheet: &mut Spreadsheet<S>,
        start: usize,
    ) -> SpreadsheetResult<usize> {
        let end = (start + self.limits.rows_processed_per_iteration.max(1)).min(self.data.groups.len());
        for index in start..end {
            self.process_row(sheet, index)?;
        }
        Ok(end)
    }

    fn fail(&mut self, error: SpreadsheetError) -> Tick<SpreadsheetResult<ProcessOutcome>> {
        log::warn!(target: "SPREADSHEET", "{}", error);
        self.phase = ProcessPhase::Finished;
        Tick::Ready(Err(error))
    }
}

impl<S: SpreadsheetSurface> IncrementalCommand<Spreadsheet<S>> for DataProcessor {
    type Output = SpreadsheetResult<ProcessOutcome>;

    fn execute(&mut self, sheet: &mut Spreadsheet<S>) -> Tick<Self::Output> {
        let phase = std::mem::replace(&mut self.phase, ProcessPhase::Finished);
        self.phase = match phase {
            ProcessPhase::Headers => {
                if self.data.is_empty() {
                    return Tick::Ready(Ok(ProcessOutcome::NoResults));
                }
                self.total_tests = 0;
                if let Err(error) = self.process_headers(sheet) {
                    return self.fail(error);
                }
                ProcessPhase::Prepare
            }
            ProcessPhase::Prepare => {
                sheet.prepare_for_data();
                ProcessPhase::Rows { next: 0 }
            }
            ProcessPhase::Rows { next } => match self.process_some_rows(sheet, next) {
                Err(error) => return self.fail(error),
                Ok(next) if next >= self.data.groups.len() => {
                    ProcessPhase::Render(RenderCycle::new())
                }
                Ok(next) => ProcessPhase::Rows { next },
            },
            ProcessPhase::Render(mut cycle) => match cycle.execute(sheet) {
                Tick::Pending => ProcessPhase::Render(cycle),
                Tick::Ready(render) => {
                    return Tick::Ready(Ok(ProcessOutcome::Rendered(ProcessSummary {
                        total_tests: self.total_tests,
                        last_cell: self.last_cell.clone(),
                        render,
                    })));
                }
            },
            ProcessPhase::Finished => {
                return Tick::Ready(Err(SpreadsheetError::MalformedGroup(
                    "processor already finished".to_string(),
                )))
            }
        };
        Tick::Pending
    }
}

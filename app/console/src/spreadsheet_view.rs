//! FILENAME: app/console/src/spreadsheet_view.rs
//! PURPOSE: Spreadsheet view controller: query, render, drilldown, actions.
//! CONTEXT: Owns the field catalogue, the common filter and the engine
//! spreadsheet. A query is split into `begin_refresh` (build the request,
//! bump the epoch) and `complete_refresh` (process the response) so a UI
//! can keep several requests in flight; only the newest epoch is rendered.

use std::time::Instant;

use serde_json::{json, Value};
use spreadsheet_engine::{
    CellInfo, ClickTarget, DataProcessor, GroupData, IncrementalCommand, ProcessOutcome,
    ProcessSummary, Spreadsheet, SpreadsheetSurface, Tick,
};
use tko_query::field::MACHINE_LABELS_BASE_SQL_NAME;
use tko_query::filter::INVALIDATED_LABEL;
use tko_query::history::{parse_bool, set_default_value};
use tko_query::{
    decode_history_token, encode_history_token, refine, CommonFilter, ConditionPayload,
    ConditionTestSet, FilterSelector, HeaderField, HeaderFieldCollection, HistoryArguments,
    ParameterizedFieldList, QueryParameters, TestSet,
};

use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::notifier::Notifier;
use crate::rpc::{
    csv_url, GroupQuery, RpcClient, JOB_IDS_METHOD, LABEL_ADD_METHOD, LABEL_REMOVE_METHOD,
    PERCENT_COMPLETE_METHOD, STATUS_COUNTS_METHOD, TEST_VIEWS_METHOD,
};
use crate::{log_debug, log_enter, log_exit, log_info, log_warn};

pub const DEFAULT_ROW: &str = "kernel";
pub const DEFAULT_COLUMN: &str = "platform";

/// Refinement applied unless incomplete tests are shown.
pub const INCOMPLETE_EXCLUSION: &str = "status != 'RUNNING'";

pub const NO_RESULTS_MESSAGE: &str = "No results for query";
pub const MISSING_HEADERS_MESSAGE: &str = "You must select row and column fields";
pub const LABELS_MODIFIED_MESSAGE: &str = "Labels modified successfully";

const HISTORY_ROW: &str = "row";
const HISTORY_COLUMN: &str = "column";
const HISTORY_SHOW_INCOMPLETE: &str = "show_incomplete";
const HISTORY_EXTRA_FILTER: &str = "extra_filter";

/// Groupable fields known before the server sends its own list.
pub const DEFAULT_FIELDS: &[(&str, &str)] = &[
    ("Job tag", "job_tag"),
    ("Job name", "job_name"),
    ("Job owner", "job_owner"),
    ("Hostname", "hostname"),
    ("Platform", "platform"),
    ("Kernel", "kernel"),
    ("Test name", "test_name"),
    ("Status", "status"),
    ("Reason", "reason"),
    ("Finished time", "test_finished_time"),
    ("Finished day", "DATE(test_finished_time)"),
];

/// Suggested next fields when drilling past `field`.
pub fn drilldown_targets(field: &str) -> Option<&'static [&'static str]> {
    let targets: &'static [&'static str] = match field {
        "platform" => &["hostname", "test_name"],
        "hostname" => &["job_tag", "status"],
        "job_tag" => &["job_tag"],
        "kernel" => &["test_name", "status"],
        "test_name" => &["job_name", "job_tag"],
        "status" => &["reason", "job_tag"],
        "reason" => &["job_tag"],
        "job_owner" => &["job_name", "job_tag"],
        "job_name" => &["job_tag"],
        "test_finished_time" => &["status", "job_tag"],
        "DATE(test_finished_time)" => &["test_finished_time", "job_tag"],
        _ => return None,
    };
    Some(targets)
}

pub fn is_job_filtering_condition(condition: &str) -> bool {
    condition.contains("job_tag")
}

pub fn completion_message(job_count: usize, fraction: f64) -> String {
    let percentage = (fraction * 100.0) as i64;
    let subject = if job_count == 1 { "job is" } else { "jobs are" };
    format!("Matching {} {}% complete", subject, percentage)
}

fn split_header(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// EVENTS AND ACTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrilldownType {
    Row,
    Column,
    Both,
}

impl DrilldownType {
    pub fn for_cell(cell: &CellInfo) -> Self {
        match (&cell.row, &cell.column) {
            (None, _) => DrilldownType::Column,
            (_, None) => DrilldownType::Row,
            _ => DrilldownType::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellClick {
    pub target: ClickTarget,
    pub right_click: bool,
    /// Multi-select modifier.
    pub ctrl_key: bool,
}

impl CellClick {
    pub fn left(target: ClickTarget) -> Self {
        CellClick { target, right_click: false, ctrl_key: false }
    }

    pub fn right(target: ClickTarget) -> Self {
        CellClick { target, right_click: true, ctrl_key: false }
    }

    pub fn ctrl(target: ClickTarget) -> Self {
        CellClick { target, right_click: false, ctrl_key: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    ViewDetails,
    Drilldown { row_field: String, column_field: String },
    ViewInTable,
    TriageFailures,
    AddLabel,
    RemoveLabel,
    Invalidate,
    Revalidate,
}

impl MenuItem {
    pub fn title(&self) -> String {
        match self {
            MenuItem::ViewDetails => "View details".to_string(),
            MenuItem::Drilldown { row_field, column_field } => {
                format!("{} vs. {}", row_field, column_field)
            }
            MenuItem::ViewInTable => "View in table".to_string(),
            MenuItem::TriageFailures => "Triage failures".to_string(),
            MenuItem::AddLabel => "Add label".to_string(),
            MenuItem::RemoveLabel => "Remove label".to_string(),
            MenuItem::Invalidate => "Invalidate tests".to_string(),
            MenuItem::Revalidate => "Revalidate tests".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMenu {
    pub tests: TestSet,
    pub items: Vec<MenuItem>,
}

impl ContextMenu {
    pub fn drilldown_titles(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| matches!(item, MenuItem::Drilldown { .. }))
            .map(MenuItem::title)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A newer request was issued; this response was dropped.
    Stale,
    NoResults,
    Rendered(ProcessSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    /// The click hit nothing clickable.
    Ignored,
    ContextMenu(ContextMenu),
    SelectionToggled { selected: bool },
    OpenTestDetail { test_index: i64 },
    Drilldown { row_field: String, column_field: String, outcome: RefreshOutcome },
    SwitchToTable { triage: bool, condition: ConditionPayload },
    /// The UI must ask which label to add or remove.
    ChooseLabel { tests: TestSet, add: bool },
    LabelsModified,
}

/// An issued status-count request.
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    epoch: u64,
    query: GroupQuery,
    params: QueryParameters,
    started: Instant,
}

impl RefreshTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn method(&self) -> &'static str {
        STATUS_COUNTS_METHOD
    }

    pub fn params(&self) -> &QueryParameters {
        &self.params
    }

    pub fn query(&self) -> &GroupQuery {
        &self.query
    }
}

// ============================================================================
// VIEW
// ============================================================================

pub struct SpreadsheetView<R: RpcClient, S: SpreadsheetSurface, N: Notifier> {
    tko: R,
    afe: R,
    notifier: N,
    config: ConsoleConfig,
    spreadsheet: Spreadsheet<S>,
    fields: HeaderFieldCollection,
    parameterized: ParameterizedFieldList,
    filter: CommonFilter,
    /// Column/condition rows ANDed onto the common filter.
    extra_filter: FilterSelector,
    /// Header selection as shown in the widgets.
    selected_rows: Vec<String>,
    selected_columns: Vec<String>,
    show_incomplete_checked: bool,
    /// Header selection of the last issued query.
    current_rows: Vec<String>,
    current_columns: Vec<String>,
    current_show_incomplete: bool,
    require_condition: bool,
    not_yet_queried: bool,
    epoch: u64,
    loading: bool,
    job_completion: Option<String>,
    last_query: Option<GroupQuery>,
    last_summary: Option<ProcessSummary>,
}

impl<R: RpcClient, S: SpreadsheetSurface, N: Notifier> SpreadsheetView<R, S, N> {
    pub fn new(tko: R, afe: R, surface: S, notifier: N, config: ConsoleConfig) -> ConsoleResult<Self> {
        let mut fields = HeaderFieldCollection::with_host_labels_column(config.host_labels_column.clone());
        fields.populate_from_list(DEFAULT_FIELDS)?;
        let spreadsheet = Spreadsheet::new(surface, config.limits());
        let rows = vec![DEFAULT_ROW.to_string()];
        let columns = vec![DEFAULT_COLUMN.to_string()];
        Ok(SpreadsheetView {
            tko,
            afe,
            notifier,
            config,
            spreadsheet,
            fields,
            parameterized: ParameterizedFieldList::new(),
            filter: CommonFilter::new(),
            extra_filter: FilterSelector::new(),
            selected_rows: rows.clone(),
            selected_columns: columns.clone(),
            show_incomplete_checked: false,
            current_rows: rows,
            current_columns: columns,
            current_show_incomplete: false,
            require_condition: false,
            not_yet_queried: true,
            epoch: 0,
            loading: false,
            job_completion: None,
            last_query: None,
            last_summary: None,
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn spreadsheet(&self) -> &Spreadsheet<S> {
        &self.spreadsheet
    }

    pub fn spreadsheet_mut(&mut self) -> &mut Spreadsheet<S> {
        &mut self.spreadsheet
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn fields(&self) -> &HeaderFieldCollection {
        &self.fields
    }

    pub fn filter(&self) -> &CommonFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut CommonFilter {
        &mut self.filter
    }

    pub fn extra_filter(&self) -> &FilterSelector {
        &self.extra_filter
    }

    pub fn extra_filter_mut(&mut self) -> &mut FilterSelector {
        &mut self.extra_filter
    }

    pub fn current_row_fields(&self) -> &[String] {
        &self.current_rows
    }

    pub fn current_column_fields(&self) -> &[String] {
        &self.current_columns
    }

    pub fn selected_row_fields(&self) -> &[String] {
        &self.selected_rows
    }

    pub fn selected_column_fields(&self) -> &[String] {
        &self.selected_columns
    }

    pub fn show_incomplete(&self) -> bool {
        self.current_show_incomplete
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn job_completion(&self) -> Option<&str> {
        self.job_completion.as_deref()
    }

    pub fn last_summary(&self) -> Option<&ProcessSummary> {
        self.last_summary.as_ref()
    }

    pub fn has_queried(&self) -> bool {
        !self.not_yet_queried
    }

    // ========================================================================
    // QUERY STATE
    // ========================================================================

    /// Adds the server's groupable fields. Known SQL names are skipped.
    pub fn populate_fields<T: AsRef<str>>(&mut self, list: &[(T, T)]) -> ConsoleResult<()> {
        for (name, sql_name) in list {
            if !self.fields.contains_sql_name(sql_name.as_ref()) {
                self.fields.add(HeaderField::simple(name.as_ref(), sql_name.as_ref()))?;
            }
        }
        Ok(())
    }

    pub fn set_selected_headers(&mut self, rows: Vec<String>, columns: Vec<String>) {
        self.selected_rows = rows;
        self.selected_columns = columns;
    }

    pub fn set_show_incomplete(&mut self, show: bool) {
        self.show_incomplete_checked = show;
    }

    /// Makes an empty global condition a validation error.
    pub fn set_require_condition(&mut self, require: bool) {
        self.require_condition = require;
    }

    pub fn add_parameterized_field(&mut self, type_name: &str, value: &str) -> ConsoleResult<String> {
        self.parameterized
            .add_field(&mut self.fields, type_name, value)
            .map_err(|e| self.report(e.into()))
    }

    pub fn delete_parameterized_field(&mut self, sql_name: &str) -> Option<HeaderField> {
        self.parameterized.delete_field(&mut self.fields, sql_name)
    }

    pub fn parameterized_fields(&self) -> &[String] {
        self.parameterized.sql_names()
    }

    // ========================================================================
    // MACHINE LABEL FIELDS
    // ========================================================================

    /// Instantiates a new machine-label field from the generator template.
    /// It lives until a query runs without it selected.
    pub fn generate_machine_labels_field(&mut self) -> ConsoleResult<String> {
        self.fields
            .generate_machine_labels_field()
            .map_err(|e| self.report(e.into()))
    }

    pub fn set_machine_labels<T: AsRef<str>>(
        &mut self,
        sql_name: &str,
        labels: &[T],
    ) -> ConsoleResult<()> {
        let is_machine_labels = match self.fields.get_by_sql_name(sql_name) {
            Ok(field) => field.is_machine_labels(),
            Err(error) => return Err(self.report(error.into())),
        };
        if !is_machine_labels {
            return Err(self.report(ConsoleError::Validation(format!(
                "{} is not a machine labels field",
                sql_name
            ))));
        }
        self.fields.get_mut_by_sql_name(sql_name)?.set_machine_labels(labels);
        Ok(())
    }

    /// Drops generated machine-label fields that are no longer selected.
    fn remove_unselected_generated_fields(&mut self) {
        let unused: Vec<String> = self
            .fields
            .iter()
            .filter(|field| field.is_machine_labels())
            .map(|field| field.sql_name().to_string())
            .filter(|name| !self.selected_rows.contains(name) && !self.selected_columns.contains(name))
            .collect();
        for name in unused {
            log_debug!("SPREADSHEET", "removing unselected field {}", name);
            self.fields.remove(&name);
        }
    }

    /// The saved condition; the base of every test set.
    pub fn saved_condition(&self) -> ConditionPayload {
        let mut condition = self.filter.compile();
        let extra = self.extra_filter.filter_string();
        if !extra.is_empty() {
            condition.extra_where = refine(&condition.extra_where, &extra);
        }
        condition
    }

    /// The condition actually queried.
    pub fn query_condition(&self) -> ConditionPayload {
        let mut condition = self.saved_condition();
        if !self.current_show_incomplete {
            condition.extra_where = refine(&condition.extra_where, INCOMPLETE_EXCLUSION);
        }
        condition
    }

    fn update_widgets(&mut self) {
        self.selected_rows = self.current_rows.clone();
        self.selected_columns = self.current_columns.clone();
        self.show_incomplete_checked = self.current_show_incomplete;
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.notifier.set_loading(loading);
    }

    /// Shows an error to the user and hands it back for propagation.
    fn report(&self, error: ConsoleError) -> ConsoleError {
        log_warn!("SPREADSHEET", "{}", error);
        self.notifier.show_error(&error.to_string());
        error
    }

    fn field_refs(&self, sql_names: &[String]) -> ConsoleResult<Vec<&HeaderField>> {
        sql_names
            .iter()
            .map(|name| self.fields.get_by_sql_name(name).map_err(ConsoleError::from))
            .collect()
    }

    // ========================================================================
    // QUERY AND REFRESH
    // ========================================================================

    /// Checks the widget state before it is adopted by a query.
    fn validate_selection(&self) -> ConsoleResult<()> {
        if self.selected_rows.is_empty() || self.selected_columns.is_empty() {
            return Err(self.report(ConsoleError::Validation(MISSING_HEADERS_MESSAGE.to_string())));
        }
        let selected: Vec<String> = self.selected_rows.iter().chain(&self.selected_columns).cloned().collect();
        let fields = self.field_refs(&selected).map_err(|e| self.report(e))?;
        if let Some(field) = fields
            .iter()
            .find(|f| f.is_machine_labels() && f.machine_label_names().is_empty())
        {
            return Err(self.report(ConsoleError::Validation(format!(
                "You must select at least one label for {}",
                field.name()
            ))));
        }
        self.filter
            .validate(self.require_condition)
            .map_err(|e| self.report(e.into()))
    }

    /// Validates the widget state, adopts it and refreshes.
    pub async fn do_query(&mut self) -> ConsoleResult<RefreshOutcome> {
        self.validate_selection()?;
        self.current_rows = self.selected_rows.clone();
        self.current_columns = self.selected_columns.clone();
        self.current_show_incomplete = self.show_incomplete_checked;
        self.remove_unselected_generated_fields();
        self.refresh().await
    }

    /// Re-runs the current query.
    pub async fn refresh(&mut self) -> ConsoleResult<RefreshOutcome> {
        let ticket = self.begin_refresh()?;
        let response = self.tko.call(ticket.method(), ticket.params().to_value()).await;
        self.complete_refresh(ticket, response).await
    }

    /// Clears the view and builds the request for the current query.
    /// Supersedes every ticket issued before.
    pub fn begin_refresh(&mut self) -> ConsoleResult<RefreshTicket> {
        log_enter!("SPREADSHEET", "begin_refresh");
        let mut field_params = QueryParameters::new();
        let names: Vec<String> = self.current_rows.iter().chain(&self.current_columns).cloned().collect();
        if let Err(error) = self.fields.add_query_parameters_for(&names, &mut field_params) {
            return Err(self.report(error.into()));
        }

        self.not_yet_queried = false;
        self.epoch += 1;
        self.spreadsheet.clear();
        self.job_completion = None;
        self.last_summary = None;

        let query = GroupQuery {
            condition: self.query_condition(),
            row_fields: self.current_rows.clone(),
            column_fields: self.current_columns.clone(),
            extra_info: Vec::new(),
            field_params,
        };
        let params = query.to_params();
        self.last_query = Some(query.clone());
        self.set_loading(true);

        log_exit!("SPREADSHEET", "begin_refresh", "epoch={}", self.epoch);
        Ok(RefreshTicket {
            epoch: self.epoch,
            query,
            params,
            started: Instant::now(),
        })
    }

    /// Processes the response to `ticket`. Responses to superseded tickets
    /// are dropped without touching the view.
    pub async fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        response: ConsoleResult<Value>,
    ) -> ConsoleResult<RefreshOutcome> {
        if ticket.epoch != self.epoch {
            log_debug!(
                "SPREADSHEET",
                "dropping stale response for epoch {} (current {})",
                ticket.epoch,
                self.epoch
            );
            return Ok(RefreshOutcome::Stale);
        }

        let outcome = self.process_response(&ticket, response).await;
        if outcome.is_ok() && is_job_filtering_condition(&ticket.query.condition.sql_condition()) {
            self.show_completion_percentage(&ticket.query.condition).await;
        }
        self.set_loading(false);
        outcome
    }

    async fn process_response(
        &mut self,
        ticket: &RefreshTicket,
        response: ConsoleResult<Value>,
    ) -> ConsoleResult<RefreshOutcome> {
        let response = response.map_err(|e| self.report(e))?;
        log_info!("SPREADSHEET", "Server response: {} ms", ticket.started.elapsed().as_millis());

        let data = GroupData::from_response(&response).map_err(|e| self.report(e.into()))?;
        let render_start = Instant::now();
        let mut processor = DataProcessor::new(
            data,
            ticket.query.row_fields.clone(),
            ticket.query.column_fields.clone(),
            *self.spreadsheet.limits(),
        );
        let result = loop {
            match processor.execute(&mut self.spreadsheet) {
                Tick::Pending => tokio::task::yield_now().await,
                Tick::Ready(result) => break result,
            }
        };

        match result {
            Ok(ProcessOutcome::NoResults) => {
                self.notifier.show_message(NO_RESULTS_MESSAGE);
                Ok(RefreshOutcome::NoResults)
            }
            Ok(ProcessOutcome::Rendered(summary)) => {
                log_info!("SPREADSHEET", "Rendering: {} ms", render_start.elapsed().as_millis());
                self.last_summary = Some(summary.clone());
                Ok(RefreshOutcome::Rendered(summary))
            }
            Err(error) => Err(self.report(error.into())),
        }
    }

    async fn show_completion_percentage(&mut self, condition: &ConditionPayload) {
        let params = condition.to_query_parameters().into_value();
        let job_ids = match self.tko.call(JOB_IDS_METHOD, params).await {
            Ok(result) => result.as_array().cloned().unwrap_or_default(),
            Err(error) => {
                self.report(error);
                return;
            }
        };
        if job_ids.is_empty() {
            return;
        }

        let job_count = job_ids.len();
        let args = json!({ "job__id__in": job_ids });
        match self.afe.call(PERCENT_COMPLETE_METHOD, args).await {
            Ok(result) => {
                let message = completion_message(job_count, result.as_f64().unwrap_or(0.0));
                log_info!("SPREADSHEET", "{}", message);
                self.job_completion = Some(message);
            }
            Err(error) => {
                self.report(error);
            }
        }
    }

    /// CSV export of the last query, without pagination.
    pub fn csv_export_url(&self) -> Option<String> {
        let query = self.last_query.as_ref()?;
        Some(csv_url(&self.config.csv_url(), STATUS_COUNTS_METHOD, &query.to_params()))
    }

    pub fn on_window_resized(&mut self) {
        if !self.spreadsheet.is_rendering() {
            self.spreadsheet.fill_window(true);
        }
    }

    // ========================================================================
    // TEST SETS
    // ========================================================================

    /// `None` for cells no condition can select: blanks and the bucket of
    /// groups without a header value.
    fn cell_test_set(&self, cell: &CellInfo) -> ConsoleResult<Option<TestSet>> {
        let initial = self.saved_condition();
        let rows = self.field_refs(&self.current_rows)?;
        let columns = self.field_refs(&self.current_columns)?;
        Ok(cell.test_set(&initial, &rows, &columns)?)
    }

    pub fn test_set_for_cell(&self, cell: &CellInfo) -> ConsoleResult<TestSet> {
        self.cell_test_set(cell)?
            .ok_or_else(|| ConsoleError::Validation("No tests can be selected from this cell".to_string()))
    }

    /// Union of the selectable cells among `cells`.
    pub fn test_set_for_cells(&self, cells: &[CellInfo]) -> ConsoleResult<TestSet> {
        let mut sets = Vec::with_capacity(cells.len());
        for cell in cells {
            if let Some(set) = self.cell_test_set(cell)? {
                sets.push(set);
            }
        }
        if sets.is_empty() {
            return Err(ConsoleError::Validation("No tests can be selected from these cells".to_string()));
        }
        Ok(TestSet::composite(sets))
    }

    /// Every test of the current query.
    pub fn whole_table_test_set(&self) -> TestSet {
        let single = self.last_summary.as_ref().map(|s| s.total_tests == 1).unwrap_or(false);
        let initial = self.saved_condition();
        if single {
            TestSet::Condition(ConditionTestSet::new_single(initial))
        } else {
            TestSet::Condition(ConditionTestSet::new(initial))
        }
    }

    // ========================================================================
    // DRILLDOWN
    // ========================================================================

    fn drilldown_fields(fields: &[String], kind: DrilldownType, other: DrilldownType) -> Vec<String> {
        let Some(last) = fields.last() else {
            return Vec::new();
        };
        if kind == other {
            return vec![last.clone()];
        }
        match drilldown_targets(last) {
            Some(targets) => targets.iter().map(|t| t.to_string()).collect(),
            None => vec![last.clone()],
        }
    }

    pub fn drilldown_rows(&self, kind: DrilldownType) -> Vec<String> {
        Self::drilldown_fields(&self.current_rows, kind, DrilldownType::Column)
    }

    pub fn drilldown_columns(&self, kind: DrilldownType) -> Vec<String> {
        Self::drilldown_fields(&self.current_columns, kind, DrilldownType::Row)
    }

    /// Every `row vs. column` pair with distinct fields.
    pub fn drilldown_pairs(&self, kind: DrilldownType) -> Vec<(String, String)> {
        let columns = self.drilldown_columns(kind);
        self.drilldown_rows(kind)
            .into_iter()
            .flat_map(|row| {
                columns
                    .iter()
                    .filter(|column| **column != row)
                    .map(|column| (row.clone(), column.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Narrows the condition to `tests` and regroups by the given fields.
    /// A drilldown that fails validation leaves the view untouched.
    pub async fn do_drilldown(
        &mut self,
        tests: &TestSet,
        row_field: &str,
        column_field: &str,
    ) -> ConsoleResult<ViewAction> {
        log_info!("SPREADSHEET", "drilldown to {} vs. {}", row_field, column_field);
        let saved_filter = self.filter.clone();
        let saved_rows = std::mem::replace(&mut self.current_rows, vec![row_field.to_string()]);
        let saved_columns = std::mem::replace(&mut self.current_columns, vec![column_field.to_string()]);
        self.filter.refine_condition(&tests.partial_sql_condition());
        self.update_widgets();
        if let Err(error) = self.validate_selection() {
            self.filter = saved_filter;
            self.current_rows = saved_rows;
            self.current_columns = saved_columns;
            self.update_widgets();
            return Err(error);
        }
        let outcome = self.do_query().await?;
        Ok(ViewAction::Drilldown {
            row_field: row_field.to_string(),
            column_field: column_field.to_string(),
            outcome,
        })
    }

    // ========================================================================
    // CLICKS AND MENUS
    // ========================================================================

    pub async fn on_cell_clicked(&mut self, click: CellClick) -> ConsoleResult<ViewAction> {
        let Some(cell) = self.spreadsheet.resolve_click(click.target) else {
            return Ok(ViewAction::Ignored);
        };
        let Some(mut tests) = self.cell_test_set(&cell).map_err(|e| self.report(e))? else {
            return Ok(ViewAction::Ignored);
        };
        let mut kind = DrilldownType::for_cell(&cell);

        if click.right_click {
            if !self.spreadsheet.selection().is_empty() {
                tests = self
                    .test_set_for_cells(self.spreadsheet.selected_cells())
                    .map_err(|e| self.report(e))?;
                kind = DrilldownType::Both;
            }
            return Ok(ViewAction::ContextMenu(self.context_menu(tests, kind)));
        }

        if click.ctrl_key {
            let selected = self
                .spreadsheet
                .toggle_selection(&cell)
                .map_err(|e| self.report(e.into()))?;
            return Ok(ViewAction::SelectionToggled { selected });
        }

        if tests.is_single_test() {
            return self.open_test_detail(&tests).await;
        }

        let rows = self.drilldown_rows(kind);
        let columns = self.drilldown_columns(kind);
        match (rows.first(), columns.first()) {
            (Some(row), Some(column)) => {
                let (row, column) = (row.clone(), column.clone());
                self.do_drilldown(&tests, &row, &column).await
            }
            _ => Ok(ViewAction::Ignored),
        }
    }

    pub fn context_menu(&self, tests: TestSet, kind: DrilldownType) -> ContextMenu {
        let mut items = Vec::new();
        if tests.is_single_test() {
            items.push(MenuItem::ViewDetails);
        } else {
            items.extend(
                self.drilldown_pairs(kind)
                    .into_iter()
                    .map(|(row_field, column_field)| MenuItem::Drilldown { row_field, column_field }),
            );
        }
        items.extend([
            MenuItem::ViewInTable,
            MenuItem::TriageFailures,
            MenuItem::AddLabel,
            MenuItem::RemoveLabel,
            MenuItem::Invalidate,
            MenuItem::Revalidate,
        ]);
        ContextMenu { tests, items }
    }

    /// Menu for the toolbar: the selection, or the whole table.
    pub fn action_menu(&self) -> ConsoleResult<ContextMenu> {
        let tests = if self.spreadsheet.selection().is_empty() {
            self.whole_table_test_set()
        } else {
            self.test_set_for_cells(self.spreadsheet.selected_cells())?
        };
        Ok(self.context_menu(tests, DrilldownType::Both))
    }

    pub async fn execute_menu_item(&mut self, menu: &ContextMenu, item: &MenuItem) -> ConsoleResult<ViewAction> {
        match item {
            MenuItem::ViewDetails => self.open_test_detail(&menu.tests).await,
            MenuItem::Drilldown { row_field, column_field } => {
                self.do_drilldown(&menu.tests, row_field, column_field).await
            }
            MenuItem::ViewInTable => Ok(self.switch_to_table(&menu.tests, false)),
            MenuItem::TriageFailures => Ok(self.switch_to_table(&menu.tests, true)),
            MenuItem::AddLabel => Ok(ViewAction::ChooseLabel { tests: menu.tests.clone(), add: true }),
            MenuItem::RemoveLabel => Ok(ViewAction::ChooseLabel { tests: menu.tests.clone(), add: false }),
            MenuItem::Invalidate => self.modify_label(&menu.tests, INVALIDATED_LABEL, true).await,
            MenuItem::Revalidate => self.modify_label(&menu.tests, INVALIDATED_LABEL, false).await,
        }
    }

    fn switch_to_table(&mut self, tests: &TestSet, triage: bool) -> ViewAction {
        self.filter.refine_condition(&tests.partial_sql_condition());
        ViewAction::SwitchToTable { triage, condition: self.saved_condition() }
    }

    /// Resolves a single-test set to its test index.
    pub async fn open_test_detail(&self, tests: &TestSet) -> ConsoleResult<ViewAction> {
        if let Some(test_index) = tests.test_index() {
            return Ok(ViewAction::OpenTestDetail { test_index });
        }
        let mut params = tests.condition_payload().to_query_parameters();
        params.insert("query_limit", json!(1));
        let result = self
            .tko
            .call(TEST_VIEWS_METHOD, params.into_value())
            .await
            .map_err(|e| self.report(e))?;
        let test_index = result
            .get(0)
            .and_then(|test| test.get("test_idx"))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                self.report(ConsoleError::Validation("No test matches the selection".to_string()))
            })?;
        Ok(ViewAction::OpenTestDetail { test_index })
    }

    pub async fn modify_label(&self, tests: &TestSet, label: &str, add: bool) -> ConsoleResult<ViewAction> {
        let method = if add { LABEL_ADD_METHOD } else { LABEL_REMOVE_METHOD };
        let mut params = tests.condition_payload().to_query_parameters();
        params.insert("label_id", json!(label));
        self.tko
            .call(method, params.into_value())
            .await
            .map_err(|e| self.report(e))?;
        self.notifier.show_message(LABELS_MODIFIED_MESSAGE);
        Ok(ViewAction::LabelsModified)
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    pub fn select_all(&mut self) -> ConsoleResult<()> {
        let unselected: Vec<CellInfo> = self
            .spreadsheet
            .data_cells()
            .iter()
            .map(|(_, cell)| cell)
            .filter(|cell| {
                !cell.is_empty()
                    && !cell.is_unresolved()
                    && !self.spreadsheet.selection().is_selected(cell)
            })
            .cloned()
            .collect();
        for cell in &unselected {
            self.spreadsheet.toggle_selection(cell)?;
        }
        Ok(())
    }

    pub fn select_none(&mut self) -> ConsoleResult<()> {
        self.spreadsheet.clear_selection()?;
        Ok(())
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    pub fn history_arguments(&self) -> HistoryArguments {
        let mut args = HistoryArguments::new();
        if self.not_yet_queried {
            return args;
        }
        args.insert(HISTORY_ROW.to_string(), self.current_rows.join(","));
        args.insert(HISTORY_COLUMN.to_string(), self.current_columns.join(","));
        args.insert(HISTORY_SHOW_INCOMPLETE.to_string(), self.current_show_incomplete.to_string());
        self.filter.add_history_arguments(&mut args);
        self.extra_filter.add_to_history(&mut args, HISTORY_EXTRA_FILTER);
        self.parameterized.add_history_arguments(&self.fields, &mut args);
        for name in self.current_rows.iter().chain(&self.current_columns) {
            if let Ok(field) = self.fields.get_by_sql_name(name) {
                if field.is_machine_labels() {
                    args.insert(name.clone(), field.machine_label_names().join(","));
                }
            }
        }
        args
    }

    pub fn fill_default_history_values(&self, args: &mut HistoryArguments) {
        set_default_value(args, HISTORY_ROW, DEFAULT_ROW);
        set_default_value(args, HISTORY_COLUMN, DEFAULT_COLUMN);
        set_default_value(args, HISTORY_SHOW_INCOMPLETE, &self.current_show_incomplete.to_string());
        set_default_value(args, &format!("{}_all", HISTORY_EXTRA_FILTER), "true");
        self.filter.fill_default_history_values(args);
    }

    /// Restores the query state. Does not query.
    pub fn handle_history_arguments(&mut self, args: &HistoryArguments) -> ConsoleResult<()> {
        self.filter.handle_history_arguments(args)?;
        self.extra_filter.handle_history_arguments(args, HISTORY_EXTRA_FILTER);
        self.parameterized.handle_history_arguments(&mut self.fields, args)?;

        let header = |key: &str, default: &str| {
            split_header(args.get(key).map(String::as_str).unwrap_or(default))
        };
        let rows = header(HISTORY_ROW, DEFAULT_ROW);
        let columns = header(HISTORY_COLUMN, DEFAULT_COLUMN);
        for name in rows.iter().chain(&columns) {
            if name.starts_with(MACHINE_LABELS_BASE_SQL_NAME) {
                self.fields.ensure_generated_field(name)?;
                if let Some(labels) = args.get(name) {
                    let labels = split_header(labels);
                    self.fields.get_mut_by_sql_name(name)?.set_machine_labels(&labels);
                }
            }
        }

        self.current_rows = rows;
        self.current_columns = columns;
        self.current_show_incomplete = parse_bool(args.get(HISTORY_SHOW_INCOMPLETE));
        self.update_widgets();
        Ok(())
    }

    pub fn history_token(&self) -> String {
        encode_history_token(&self.history_arguments())
    }

    pub fn restore_history_token(&mut self, token: &str) -> ConsoleResult<()> {
        let mut args = decode_history_token(token)?;
        self.fill_default_history_values(&mut args);
        self.handle_history_arguments(&args)
    }
}

//! FILENAME: core/tko-query/src/filter.rs
//! Common filter - the global condition shared by every results view.
//!
//! State:
//! - a raw SQL box, always AND'ed in front of everything else
//! - include/exclude attribute filters (attribute key match + value match)
//! - include/exclude label filters
//! - a "show invalidated tests" switch
//!
//! `compile()` turns that state into the condition payload the backend
//! understands. Attribute predicates of one bucket are OR'ed together and the
//! bucket becomes a single term; label names travel as two plain lists. The
//! `invalidated` label is excluded unless invalidated tests are shown.

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::history::{parse_bool, HistoryArguments};
use crate::params::QueryParameters;
use crate::sql::{escape_sql_value, join_strings, join_with_parens, refine};

/// Label marking tests that were invalidated after the fact.
pub const INVALIDATED_LABEL: &str = "invalidated";

const HISTORY_CONDITION: &str = "condition";
const HISTORY_SHOW_INVALID: &str = "show_invalid";
const FILTER_PREFIX: &str = "filter";

/// Stable handle for one filter row.
pub type FilterId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    Attribute,
    Label,
}

impl FilterKind {
    fn history_name(&self) -> &'static str {
        match self {
            FilterKind::Attribute => "attribute",
            FilterKind::Label => "label",
        }
    }

    fn from_history_name(name: &str) -> QueryResult<Self> {
        match name {
            "attribute" => Ok(FilterKind::Attribute),
            "label" => Ok(FilterKind::Label),
            other => Err(QueryError::InvalidHistory(format!("filter type '{}'", other))),
        }
    }
}

/// One attribute- or label-predicate row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterData {
    Attribute {
        include: bool,
        attribute_match: String,
        value_match: String,
    },
    Label {
        include: bool,
        label_match: String,
    },
}

impl FilterData {
    pub fn new(kind: FilterKind) -> Self {
        match kind {
            FilterKind::Attribute => FilterData::Attribute {
                include: true,
                attribute_match: String::new(),
                value_match: String::new(),
            },
            FilterKind::Label => FilterData::Label {
                include: true,
                label_match: String::new(),
            },
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterData::Attribute { .. } => FilterKind::Attribute,
            FilterData::Label { .. } => FilterKind::Label,
        }
    }

    pub fn include(&self) -> bool {
        match self {
            FilterData::Attribute { include, .. } | FilterData::Label { include, .. } => *include,
        }
    }

    pub fn set_include(&mut self, value: bool) {
        match self {
            FilterData::Attribute { include, .. } | FilterData::Label { include, .. } => {
                *include = value
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FilterData::Attribute { attribute_match, value_match, .. } => {
                attribute_match.trim().is_empty() && value_match.trim().is_empty()
            }
            FilterData::Label { label_match, .. } => label_match.trim().is_empty(),
        }
    }

    /// Predicate against the attribute side-table, or None for labels and
    /// empty rows.
    fn attribute_predicate(&self) -> Option<String> {
        let FilterData::Attribute { attribute_match, value_match, .. } = self else {
            return None;
        };
        let parts = [
            match_predicate("attribute", attribute_match),
            match_predicate("value", value_match),
        ];
        let joined = join_strings(" AND ", &parts);
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

/// `column = 'text'`, or `column LIKE 'text'` when the text holds a `%`
/// wildcard. Empty text yields an empty string.
fn match_predicate(column: &str, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let operator = if text.contains('%') { "LIKE" } else { "=" };
    format!("{} {} '{}'", column, operator, escape_sql_value(text))
}

// ============================================================================
// COMPILED CONDITION
// ============================================================================

/// The server query-condition payload produced by [`CommonFilter::compile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionPayload {
    pub extra_where: String,
    pub include_attributes_where: String,
    pub exclude_attributes_where: String,
    pub include_labels: Vec<String>,
    pub exclude_labels: Vec<String>,
}

impl ConditionPayload {
    /// Payload with only a raw condition.
    pub fn from_condition(condition: &str) -> Self {
        ConditionPayload {
            extra_where: condition.to_string(),
            ..Default::default()
        }
    }

    /// Converts to RPC parameters, omitting empty entries.
    pub fn to_query_parameters(&self) -> QueryParameters {
        let mut params = QueryParameters::new();
        params.insert_if_nonempty("extra_where", &self.extra_where);
        params.insert_if_nonempty("include_attributes_where", &self.include_attributes_where);
        params.insert_if_nonempty("exclude_attributes_where", &self.exclude_attributes_where);
        for label in &self.include_labels {
            params.append_to_list("include_labels", label);
        }
        for label in &self.exclude_labels {
            params.append_to_list("exclude_labels", label);
        }
        params
    }

    /// Canonical single-string rendering of the whole condition, used for
    /// display and for comparing two compiled states.
    pub fn sql_condition(&self) -> String {
        let label_list = |labels: &[String]| {
            labels
                .iter()
                .map(|l| format!("'{}'", escape_sql_value(l)))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut terms = vec![self.extra_where.clone(), self.include_attributes_where.clone()];
        if !self.exclude_attributes_where.is_empty() {
            terms.push(format!("NOT ({})", self.exclude_attributes_where));
        }
        if !self.include_labels.is_empty() {
            terms.push(format!("test_label IN ({})", label_list(&self.include_labels)));
        }
        if !self.exclude_labels.is_empty() {
            terms.push(format!("test_label NOT IN ({})", label_list(&self.exclude_labels)));
        }
        join_with_parens(" AND ", &terms)
    }
}

// ============================================================================
// COMMON FILTER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct CommonFilter {
    raw_sql: String,
    show_invalidated: bool,
    filters: Vec<(FilterId, FilterData)>,
    next_id: FilterId,
}

impl CommonFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_sql(&self) -> &str {
        &self.raw_sql
    }

    pub fn set_raw_sql(&mut self, sql: &str) {
        self.raw_sql = sql.trim().to_string();
    }

    pub fn show_invalidated(&self) -> bool {
        self.show_invalidated
    }

    pub fn set_show_invalidated(&mut self, show: bool) {
        self.show_invalidated = show;
    }

    /// Adds an empty include row and returns its handle.
    pub fn add_filter(&mut self, kind: FilterKind) -> FilterId {
        self.push_filter(FilterData::new(kind))
    }

    pub fn push_filter(&mut self, data: FilterData) -> FilterId {
        let id = self.next_id;
        self.next_id += 1;
        self.filters.push((id, data));
        id
    }

    pub fn remove_filter(&mut self, id: FilterId) -> bool {
        let before = self.filters.len();
        self.filters.retain(|(fid, _)| *fid != id);
        before != self.filters.len()
    }

    pub fn filter(&self, id: FilterId) -> Option<&FilterData> {
        self.filters.iter().find(|(fid, _)| *fid == id).map(|(_, f)| f)
    }

    pub fn filter_mut(&mut self, id: FilterId) -> Option<&mut FilterData> {
        self.filters.iter_mut().find(|(fid, _)| *fid == id).map(|(_, f)| f)
    }

    pub fn filters(&self) -> impl Iterator<Item = &FilterData> {
        self.filters.iter().map(|(_, f)| f)
    }

    /// Intersects the raw condition with `fragment` (drilldown).
    pub fn refine_condition(&mut self, fragment: &str) {
        self.raw_sql = refine(&self.raw_sql, fragment);
    }

    /// Rejects states that cannot be queried: empty filter rows always, and
    /// an empty raw condition when the caller requires one.
    pub fn validate(&self, require_condition: bool) -> QueryResult<()> {
        if require_condition && self.raw_sql.is_empty() {
            return Err(QueryError::EmptyCondition);
        }
        for (index, (_, filter)) in self.filters.iter().enumerate() {
            if filter.is_empty() {
                return Err(QueryError::EmptyFilter(index));
            }
        }
        Ok(())
    }

    pub fn compile(&self) -> ConditionPayload {
        let mut include_attributes = Vec::new();
        let mut exclude_attributes = Vec::new();
        let mut include_labels: Vec<String> = Vec::new();
        let mut exclude_labels: Vec<String> = Vec::new();

        for (_, filter) in &self.filters {
            match filter {
                FilterData::Attribute { include, .. } => {
                    if let Some(predicate) = filter.attribute_predicate() {
                        if *include {
                            include_attributes.push(predicate);
                        } else {
                            exclude_attributes.push(predicate);
                        }
                    }
                }
                FilterData::Label { include, label_match } => {
                    let label = label_match.trim();
                    if label.is_empty() {
                        continue;
                    }
                    let bucket = if *include { &mut include_labels } else { &mut exclude_labels };
                    if !bucket.iter().any(|l| l == label) {
                        bucket.push(label.to_string());
                    }
                }
            }
        }

        if !self.show_invalidated && !exclude_labels.iter().any(|l| l == INVALIDATED_LABEL) {
            exclude_labels.push(INVALIDATED_LABEL.to_string());
        }

        ConditionPayload {
            extra_where: join_with_parens(" AND ", &[self.raw_sql.as_str()]),
            include_attributes_where: join_with_parens(" OR ", &include_attributes),
            exclude_attributes_where: join_with_parens(" OR ", &exclude_attributes),
            include_labels,
            exclude_labels,
        }
    }

    pub fn add_history_arguments(&self, args: &mut HistoryArguments) {
        args.insert(HISTORY_CONDITION.to_string(), self.raw_sql.clone());
        args.insert(HISTORY_SHOW_INVALID.to_string(), self.show_invalidated.to_string());
        for (index, (_, filter)) in self.filters.iter().enumerate() {
            let key = |suffix: &str| format!("{}_{}_{}", FILTER_PREFIX, index, suffix);
            args.insert(key("type"), filter.kind().history_name().to_string());
            args.insert(key("include"), filter.include().to_string());
            match filter {
                FilterData::Attribute { attribute_match, value_match, .. } => {
                    args.insert(key("attribute"), attribute_match.clone());
                    args.insert(key("value"), value_match.clone());
                }
                FilterData::Label { label_match, .. } => {
                    args.insert(key("label"), label_match.clone());
                }
            }
        }
    }

    /// Rebuilds the whole filter state from history arguments.
    pub fn handle_history_arguments(&mut self, args: &HistoryArguments) -> QueryResult<()> {
        self.set_raw_sql(args.get(HISTORY_CONDITION).map(String::as_str).unwrap_or(""));
        self.show_invalidated = parse_bool(args.get(HISTORY_SHOW_INVALID));
        self.filters.clear();

        for index in 0.. {
            let key = |suffix: &str| format!("{}_{}_{}", FILTER_PREFIX, index, suffix);
            let Some(type_name) = args.get(&key("type")) else {
                break;
            };
            let text = |suffix: &str| args.get(&key(suffix)).cloned().unwrap_or_default();
            let include = parse_bool(args.get(&key("include")));
            let data = match FilterKind::from_history_name(type_name)? {
                FilterKind::Attribute => FilterData::Attribute {
                    include,
                    attribute_match: text("attribute"),
                    value_match: text("value"),
                },
                FilterKind::Label => FilterData::Label {
                    include,
                    label_match: text("label"),
                },
            };
            self.push_filter(data);
        }
        Ok(())
    }

    pub fn fill_default_history_values(&self, args: &mut HistoryArguments) {
        args.entry(HISTORY_CONDITION.to_string()).or_default();
        args.entry(HISTORY_SHOW_INVALID.to_string())
            .or_insert_with(|| self.show_invalidated.to_string());
    }
}

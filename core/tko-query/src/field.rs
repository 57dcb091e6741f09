//! FILENAME: core/tko-query/src/field.rs
//! Header fields - the typed, named columns a user can group or filter by.
//!
//! A field knows two things beyond its names:
//! - how to turn a single header value into a SQL predicate
//! - which side information the backend needs to resolve it (joins on
//!   attribute, label, keyval or iteration tables)
//!
//! Field kinds are a closed set, so they are modelled as an enum and
//! dispatched by `match` rather than through a trait object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QueryError, QueryResult};
use crate::params::QueryParameters;
use crate::sql::{equality_string, escape_sql_value, JSON_NULL};

/// Base SQL name shared by all generated machine-label fields.
pub const MACHINE_LABELS_BASE_SQL_NAME: &str = "machine_labels_";

/// Display name of the machine-label generator template.
pub const MACHINE_LABELS_TYPE_NAME: &str = "Machine labels";

/// Query parameter carrying `{sql_name: [labels]}` for machine-label fields.
pub const MACHINE_LABEL_HEADERS_PARAM: &str = "machine_label_headers";

/// Default backend column holding the comma separated host labels of a test.
pub const DEFAULT_HOST_LABELS_COLUMN: &str = "test_attributes_host_labels.value";

// ============================================================================
// PARAMETERIZED KINDS
// ============================================================================

/// Field kinds instantiated with a single user-supplied parameter
/// (an attribute key, keyval name, label name...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterizedKind {
    TestAttribute,
    JobKeyval,
    IterationAttribute,
    IterationResult,
    TestLabel,
}

impl ParameterizedKind {
    pub const ALL: [ParameterizedKind; 5] = [
        ParameterizedKind::TestAttribute,
        ParameterizedKind::JobKeyval,
        ParameterizedKind::IterationAttribute,
        ParameterizedKind::IterationResult,
        ParameterizedKind::TestLabel,
    ];

    /// User-visible type name, also used as the history value.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterizedKind::TestAttribute => "Test attribute",
            ParameterizedKind::JobKeyval => "Job keyval",
            ParameterizedKind::IterationAttribute => "Iteration attribute",
            ParameterizedKind::IterationResult => "Iteration result",
            ParameterizedKind::TestLabel => "Test label",
        }
    }

    pub fn base_sql_name(&self) -> &'static str {
        match self {
            ParameterizedKind::TestAttribute => "test_attribute_",
            ParameterizedKind::JobKeyval => "job_keyval_",
            ParameterizedKind::IterationAttribute => "iteration_attribute_",
            ParameterizedKind::IterationResult => "iteration_result_",
            ParameterizedKind::TestLabel => "test_label_",
        }
    }

    /// Name of the list parameter the backend reads to add the join.
    pub fn query_parameter(&self) -> &'static str {
        match self {
            ParameterizedKind::TestAttribute => "test_attribute_fields",
            ParameterizedKind::JobKeyval => "job_keyval_fields",
            ParameterizedKind::IterationAttribute => "iteration_attribute_fields",
            ParameterizedKind::IterationResult => "iteration_result_fields",
            ParameterizedKind::TestLabel => "test_label_fields",
        }
    }

    pub fn from_type_name(type_name: &str) -> QueryResult<Self> {
        ParameterizedKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.type_name() == type_name)
            .ok_or_else(|| QueryError::UnknownFieldType(type_name.to_string()))
    }

    fn is_label(&self) -> bool {
        matches!(self, ParameterizedKind::TestLabel)
    }
}

// ============================================================================
// HEADER FIELD
// ============================================================================

/// What kind of field this is, with the per-kind parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A plain column of the test view.
    Simple,
    /// An attribute/keyval/label/iteration field bound to one parameter.
    Parameterized { kind: ParameterizedKind, value: String },
    /// A generated multi-label field. Its value is the comma separated subset
    /// of `labels` present on the machine.
    MachineLabels {
        number: u32,
        labels: Vec<String>,
        column: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderField {
    /// Display name.
    name: String,
    /// Unique key used in group-by lists and history.
    sql_name: String,
    kind: FieldKind,
}

impl HeaderField {
    pub fn simple(name: impl Into<String>, sql_name: impl Into<String>) -> Self {
        HeaderField {
            name: name.into(),
            sql_name: sql_name.into(),
            kind: FieldKind::Simple,
        }
    }

    /// Instantiates a parameterized field. The SQL name is the kind's base
    /// name followed by the parameter, matching the alias the backend gives
    /// the joined column.
    pub fn parameterized(kind: ParameterizedKind, value: &str) -> QueryResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(QueryError::EmptyValue);
        }
        Ok(HeaderField {
            name: format!("{}: {}", kind.type_name(), value),
            sql_name: format!("{}{}", kind.base_sql_name(), value),
            kind: FieldKind::Parameterized {
                kind,
                value: value.to_string(),
            },
        })
    }

    /// Instantiates the `number`th generated machine-label field.
    pub fn machine_labels(number: u32, column: impl Into<String>) -> Self {
        HeaderField {
            name: format!("{} {}", MACHINE_LABELS_TYPE_NAME, number),
            sql_name: format!("{}{}", MACHINE_LABELS_BASE_SQL_NAME, number),
            kind: FieldKind::MachineLabels {
                number,
                labels: Vec::new(),
                column: column.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_name(&self) -> &str {
        &self.sql_name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_generated(&self) -> bool {
        !matches!(self.kind, FieldKind::Simple)
    }

    /// Identity used to reject duplicate parameterized fields
    /// (same type and same parameter).
    pub fn identifier(&self) -> String {
        match &self.kind {
            FieldKind::Simple => self.sql_name.clone(),
            FieldKind::Parameterized { kind, value } => format!("{}:{}", kind.type_name(), value),
            FieldKind::MachineLabels { number, .. } => {
                format!("{}:{}", MACHINE_LABELS_TYPE_NAME, number)
            }
        }
    }

    pub fn is_machine_labels(&self) -> bool {
        matches!(self.kind, FieldKind::MachineLabels { .. })
    }

    /// The machine labels selected for a generated machine-label field.
    pub fn machine_label_names(&self) -> &[String] {
        match &self.kind {
            FieldKind::MachineLabels { labels, .. } => labels,
            _ => &[],
        }
    }

    /// Replaces the label list of a machine-label field. Labels are kept
    /// sorted and de-duplicated; blank entries are dropped.
    /// Has no effect on other kinds.
    pub fn set_machine_labels<S: AsRef<str>>(&mut self, new_labels: &[S]) {
        if let FieldKind::MachineLabels { labels, .. } = &mut self.kind {
            let mut cleaned: Vec<String> = new_labels
                .iter()
                .map(|l| l.as_ref().trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            cleaned.sort();
            cleaned.dedup();
            *labels = cleaned;
        }
    }

    fn quoted_sql_name(&self) -> String {
        format!("`{}`", self.sql_name)
    }

    /// The column expression predicates are written against.
    pub fn filtering_name(&self) -> String {
        match &self.kind {
            FieldKind::Simple => self.sql_name.clone(),
            FieldKind::Parameterized { kind, .. } if kind.is_label() => {
                format!("{}.id", self.quoted_sql_name())
            }
            FieldKind::Parameterized { .. } => format!("{}.value", self.quoted_sql_name()),
            FieldKind::MachineLabels { column, .. } => column.clone(),
        }
    }

    /// Builds the predicate selecting rows whose value for this field is
    /// `value`. Iteration results have no meaningful single-value
    /// predicate and are rejected.
    pub fn sql_condition(&self, value: &str) -> QueryResult<String> {
        match &self.kind {
            FieldKind::Simple => Ok(equality_string(&self.sql_name, value)),
            FieldKind::Parameterized { kind: ParameterizedKind::IterationResult, .. } => {
                Err(QueryError::UnsupportedCondition(self.name.clone()))
            }
            FieldKind::Parameterized { kind, .. } if kind.is_label() => {
                let check = if value == JSON_NULL { "IS NULL" } else { "IS NOT NULL" };
                Ok(format!("{} {}", self.filtering_name(), check))
            }
            FieldKind::Parameterized { .. } => Ok(equality_string(&self.filtering_name(), value)),
            FieldKind::MachineLabels { labels, column, .. } => {
                Ok(machine_label_condition(labels, column, value))
            }
        }
    }

    /// Adds whatever the backend needs to resolve this field to `params`.
    pub fn add_query_parameters(&self, params: &mut QueryParameters) {
        match &self.kind {
            FieldKind::Simple => {}
            FieldKind::Parameterized { kind, value } => {
                params.append_to_list(kind.query_parameter(), value);
            }
            FieldKind::MachineLabels { labels, .. } => {
                let entry = params
                    .0
                    .entry(MACHINE_LABEL_HEADERS_PARAM.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(headers) = entry {
                    let label_list = labels.iter().cloned().map(Value::String).collect();
                    headers.insert(self.sql_name.clone(), Value::Array(label_list));
                }
            }
        }
    }
}

/// Conjunction of per-label inclusion/exclusion checks: every configured
/// label listed in `value` must be present, every other one absent.
fn machine_label_condition(labels: &[String], column: &str, value: &str) -> String {
    let present: Vec<&str> = if value == JSON_NULL {
        Vec::new()
    } else {
        value.split(',').map(str::trim).filter(|v| !v.is_empty()).collect()
    };

    labels
        .iter()
        .map(|label| {
            let check = format!("FIND_IN_SET('{}', {})", escape_sql_value(label), column);
            if present.contains(&label.as_str()) {
                check
            } else {
                format!("NOT {}", check)
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_field_condition() {
        let field = HeaderField::simple("Hostname", "hostname");
        assert_eq!(field.sql_condition("host'1").unwrap(), "hostname = 'host\\'1'");
        assert_eq!(field.sql_condition(JSON_NULL).unwrap(), "hostname IS NULL");
    }

    #[test]
    fn test_attribute_field_condition_and_params() {
        let field = HeaderField::parameterized(ParameterizedKind::TestAttribute, "arch").unwrap();
        assert_eq!(field.sql_name(), "test_attribute_arch");
        assert_eq!(field.sql_condition("x86").unwrap(), "`test_attribute_arch`.value = 'x86'");

        let mut params = QueryParameters::new();
        field.add_query_parameters(&mut params);
        assert_eq!(params.string_list("test_attribute_fields"), vec!["arch".to_string()]);
    }

    #[test]
    fn test_label_field_condition() {
        let field = HeaderField::parameterized(ParameterizedKind::TestLabel, "flaky").unwrap();
        assert_eq!(field.sql_condition("1").unwrap(), "`test_label_flaky`.id IS NOT NULL");
        assert_eq!(field.sql_condition(JSON_NULL).unwrap(), "`test_label_flaky`.id IS NULL");
    }

    #[test]
    fn test_iteration_result_has_no_condition() {
        let field =
            HeaderField::parameterized(ParameterizedKind::IterationResult, "throughput").unwrap();
        assert!(matches!(
            field.sql_condition("10"),
            Err(QueryError::UnsupportedCondition(_))
        ));
    }

    #[test]
    fn test_empty_parameter_rejected() {
        assert_eq!(
            HeaderField::parameterized(ParameterizedKind::JobKeyval, "  "),
            Err(QueryError::EmptyValue)
        );
    }

    #[test]
    fn test_machine_label_condition() {
        let mut field = HeaderField::machine_labels(0, DEFAULT_HOST_LABELS_COLUMN);
        field.set_machine_labels(&["Index", "Diskful", "Index"]);
        assert!(field.is_machine_labels());
        assert_eq!(field.machine_label_names(), &["Diskful".to_string(), "Index".to_string()]);
        assert_eq!(
            field.sql_condition("Diskful").unwrap(),
            "FIND_IN_SET('Diskful', test_attributes_host_labels.value) AND \
             NOT FIND_IN_SET('Index', test_attributes_host_labels.value)"
        );

        let mut params = QueryParameters::new();
        field.add_query_parameters(&mut params);
        let headers = params.get(MACHINE_LABEL_HEADERS_PARAM).unwrap();
        assert_eq!(headers["machine_labels_0"][1], "Index");
    }
}

//! FILENAME: core/tko-query/src/collection.rs
//! PURPOSE: The registry of header fields available to a view.
//! CONTEXT: Fields are looked up by display name (UI selections) and by SQL
//! name (history, group-by lists). Both keys are unique and must resolve to
//! the same field; a collision is a configuration error and is never
//! silently resolved.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{QueryError, QueryResult};
use crate::field::{HeaderField, DEFAULT_HOST_LABELS_COLUMN, MACHINE_LABELS_BASE_SQL_NAME};
use crate::params::QueryParameters;

static GENERATED_SQL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{}(\d+)$", regex::escape(MACHINE_LABELS_BASE_SQL_NAME)))
        .expect("generated field pattern is a valid regex")
});

/// Parses the instance number out of a generated field's SQL name
/// (`machine_labels_3` -> 3).
pub fn parse_generated_sql_name(sql_name: &str) -> QueryResult<u32> {
    GENERATED_SQL_NAME
        .captures(sql_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .ok_or_else(|| QueryError::MalformedSqlName(sql_name.to_string()))
}

#[derive(Debug, Clone)]
pub struct HeaderFieldCollection {
    /// Fields in insertion order.
    fields: Vec<HeaderField>,
    /// sql_name -> index into `fields`.
    by_sql_name: HashMap<String, usize>,
    /// name -> index into `fields`.
    by_name: HashMap<String, usize>,
    /// Next number handed to a generated machine-label field.
    next_generated_number: u32,
    /// Backend column used by generated machine-label predicates.
    host_labels_column: String,
}

impl Default for HeaderFieldCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderFieldCollection {
    pub fn new() -> Self {
        Self::with_host_labels_column(DEFAULT_HOST_LABELS_COLUMN)
    }

    pub fn with_host_labels_column(column: impl Into<String>) -> Self {
        HeaderFieldCollection {
            fields: Vec::new(),
            by_sql_name: HashMap::new(),
            by_name: HashMap::new(),
            next_generated_number: 0,
            host_labels_column: column.into(),
        }
    }

    /// Seeds simple fields from a static `(name, sql_name)` list.
    pub fn populate_from_list<S: AsRef<str>>(&mut self, fields: &[(S, S)]) -> QueryResult<()> {
        for (name, sql_name) in fields {
            self.add(HeaderField::simple(name.as_ref(), sql_name.as_ref()))?;
        }
        Ok(())
    }

    pub fn add(&mut self, field: HeaderField) -> QueryResult<()> {
        if self.by_name.contains_key(field.name()) || self.by_sql_name.contains_key(field.sql_name())
        {
            return Err(QueryError::DuplicateField {
                name: field.name().to_string(),
                sql_name: field.sql_name().to_string(),
            });
        }
        let index = self.fields.len();
        self.by_name.insert(field.name().to_string(), index);
        self.by_sql_name.insert(field.sql_name().to_string(), index);
        self.fields.push(field);
        Ok(())
    }

    /// Removes a field by SQL name, returning it so the caller can tear
    /// down any input widgets bound to it.
    pub fn remove(&mut self, sql_name: &str) -> Option<HeaderField> {
        let index = self.by_sql_name.get(sql_name).copied()?;
        let removed = self.fields.remove(index);
        self.reindex();
        Some(removed)
    }

    fn reindex(&mut self) {
        self.by_name.clear();
        self.by_sql_name.clear();
        for (index, field) in self.fields.iter().enumerate() {
            self.by_name.insert(field.name().to_string(), index);
            self.by_sql_name.insert(field.sql_name().to_string(), index);
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn contains_sql_name(&self, sql_name: &str) -> bool {
        self.by_sql_name.contains_key(sql_name)
    }

    pub fn get_by_name(&self, name: &str) -> QueryResult<&HeaderField> {
        self.by_name
            .get(name)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| QueryError::UnknownField(name.to_string()))
    }

    pub fn get_by_sql_name(&self, sql_name: &str) -> QueryResult<&HeaderField> {
        if let Some(&index) = self.by_sql_name.get(sql_name) {
            return Ok(&self.fields[index]);
        }
        if sql_name.starts_with(MACHINE_LABELS_BASE_SQL_NAME) {
            // surfaces MalformedSqlName for garbage suffixes
            parse_generated_sql_name(sql_name)?;
        }
        Err(QueryError::UnknownField(sql_name.to_string()))
    }

    pub fn get_mut_by_sql_name(&mut self, sql_name: &str) -> QueryResult<&mut HeaderField> {
        match self.by_sql_name.get(sql_name) {
            Some(&index) => Ok(&mut self.fields[index]),
            None => Err(QueryError::UnknownField(sql_name.to_string())),
        }
    }

    /// Looks a field up by both keys and checks they agree.
    pub fn get(&self, name: &str, sql_name: &str) -> QueryResult<&HeaderField> {
        let by_name = self.by_name.get(name);
        let by_sql = self.by_sql_name.get(sql_name);
        match (by_name, by_sql) {
            (Some(a), Some(b)) if a == b => Ok(&self.fields[*a]),
            (None, None) => Err(QueryError::UnknownField(sql_name.to_string())),
            _ => Err(QueryError::InconsistentField {
                name: name.to_string(),
                sql_name: sql_name.to_string(),
            }),
        }
    }

    /// Instantiates a fresh, uniquely numbered machine-label field from the
    /// generator template and returns its SQL name.
    pub fn generate_machine_labels_field(&mut self) -> QueryResult<String> {
        let mut number = self.next_generated_number;
        while self.by_sql_name.contains_key(&format!("{}{}", MACHINE_LABELS_BASE_SQL_NAME, number)) {
            number += 1;
        }
        self.next_generated_number = number + 1;
        let field = HeaderField::machine_labels(number, self.host_labels_column.clone());
        let sql_name = field.sql_name().to_string();
        self.add(field)?;
        log::debug!(target: "QUERY", "generated field {}", sql_name);
        Ok(sql_name)
    }

    /// Recreates a generated field under a specific SQL name (history
    /// restore). Existing fields are left untouched.
    pub fn ensure_generated_field(&mut self, sql_name: &str) -> QueryResult<()> {
        if self.contains_sql_name(sql_name) {
            return Ok(());
        }
        let number = parse_generated_sql_name(sql_name)?;
        self.next_generated_number = self.next_generated_number.max(number + 1);
        self.add(HeaderField::machine_labels(number, self.host_labels_column.clone()))
    }

    /// Lets every field contribute its side information to `params`.
    pub fn add_query_parameters(&self, params: &mut QueryParameters) {
        for field in &self.fields {
            field.add_query_parameters(params);
        }
    }

    /// Adds query parameters only for the listed fields.
    pub fn add_query_parameters_for<S: AsRef<str>>(
        &self,
        sql_names: &[S],
        params: &mut QueryParameters,
    ) -> QueryResult<()> {
        for sql_name in sql_names {
            self.get_by_sql_name(sql_name.as_ref())?.add_query_parameters(params);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldKind, ParameterizedKind};

    fn collection() -> HeaderFieldCollection {
        let mut fields = HeaderFieldCollection::new();
        fields
            .populate_from_list(&[("Platform", "platform"), ("Kernel", "kernel")])
            .unwrap();
        fields
    }

    #[test]
    fn test_lookup_by_both_keys() {
        let fields = collection();
        assert_eq!(fields.get_by_name("Kernel").unwrap().sql_name(), "kernel");
        assert_eq!(fields.get_by_sql_name("platform").unwrap().name(), "Platform");
        assert!(fields.get("Kernel", "kernel").is_ok());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut fields = collection();
        let err = fields.add(HeaderField::simple("Kernel", "kernel_version")).unwrap_err();
        assert!(matches!(err, QueryError::DuplicateField { .. }));
        let err = fields.add(HeaderField::simple("Other", "platform")).unwrap_err();
        assert!(matches!(err, QueryError::DuplicateField { .. }));
    }

    #[test]
    fn test_inconsistent_keys_detected() {
        let fields = collection();
        assert!(matches!(
            fields.get("Kernel", "platform"),
            Err(QueryError::InconsistentField { .. })
        ));
    }

    #[test]
    fn test_generated_fields_are_numbered() {
        let mut fields = collection();
        let first = fields.generate_machine_labels_field().unwrap();
        let second = fields.generate_machine_labels_field().unwrap();
        assert_eq!(first, "machine_labels_0");
        assert_eq!(second, "machine_labels_1");

        fields.remove(&first).unwrap();
        assert!(!fields.contains_sql_name(&first));
        let third = fields.generate_machine_labels_field().unwrap();
        assert_eq!(third, "machine_labels_2");
        assert!(matches!(
            fields.get_by_sql_name("machine_labels_1").unwrap().kind(),
            FieldKind::MachineLabels { number: 1, .. }
        ));
    }

    #[test]
    fn test_malformed_generated_name() {
        let fields = collection();
        assert_eq!(
            fields.get_by_sql_name("machine_labels_x").unwrap_err(),
            QueryError::MalformedSqlName("machine_labels_x".to_string())
        );
        assert_eq!(
            fields.get_by_sql_name("machine_labels_7").unwrap_err(),
            QueryError::UnknownField("machine_labels_7".to_string())
        );
    }

    #[test]
    fn test_ensure_generated_field_restores_number() {
        let mut fields = collection();
        fields.ensure_generated_field("machine_labels_4").unwrap();
        assert_eq!(fields.generate_machine_labels_field().unwrap(), "machine_labels_5");
    }

    #[test]
    fn test_query_parameters_for_all_fields() {
        let mut fields = collection();
        fields
            .add(HeaderField::parameterized(ParameterizedKind::JobKeyval, "build").unwrap())
            .unwrap();
        let mut params = QueryParameters::new();
        fields.add_query_parameters(&mut params);
        assert_eq!(params.string_list("job_keyval_fields"), vec!["build".to_string()]);
    }
}

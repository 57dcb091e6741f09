//! FILENAME: core/tko-query/src/parameterized.rs
//! PURPOSE: User-managed list of parameterized fields ("custom fields").
//! CONTEXT: The user picks a field type and types a parameter; the
//! resulting field is registered in the shared HeaderFieldCollection and
//! removed from it again on delete. Input widgets are owned by the UI,
//! which is told about removals through the returned field.

use std::collections::HashSet;

use crate::collection::HeaderFieldCollection;
use crate::error::{QueryError, QueryResult};
use crate::field::{FieldKind, HeaderField, ParameterizedKind};
use crate::history::HistoryArguments;

#[derive(Debug, Clone, Default)]
pub struct ParameterizedFieldList {
    /// SQL names of the fields this list added, in insertion order.
    sql_names: Vec<String>,
    /// Identifiers of those fields, for duplicate detection.
    identifiers: HashSet<String>,
}

fn list_key(index: usize) -> String {
    format!("parameterized_field_{}", index)
}

impl ParameterizedFieldList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sql_names(&self) -> &[String] {
        &self.sql_names
    }

    /// Creates and registers a field from a type name and a parameter.
    /// Returns the new field's SQL name.
    pub fn add_field(
        &mut self,
        fields: &mut HeaderFieldCollection,
        type_name: &str,
        value: &str,
    ) -> QueryResult<String> {
        let kind = ParameterizedKind::from_type_name(type_name)?;
        let field = HeaderField::parameterized(kind, value)?;
        if self.identifiers.contains(&field.identifier()) {
            return Err(QueryError::FieldExists(field.name().to_string()));
        }
        self.register(fields, field)
    }

    /// Adds the field unless an identical one is already present.
    /// Returns whether a field was added.
    pub fn add_field_if_not_present(
        &mut self,
        fields: &mut HeaderFieldCollection,
        kind: ParameterizedKind,
        value: &str,
    ) -> QueryResult<bool> {
        let field = HeaderField::parameterized(kind, value)?;
        if self.identifiers.contains(&field.identifier()) || fields.contains_sql_name(field.sql_name())
        {
            return Ok(false);
        }
        self.register(fields, field)?;
        Ok(true)
    }

    fn register(
        &mut self,
        fields: &mut HeaderFieldCollection,
        field: HeaderField,
    ) -> QueryResult<String> {
        let sql_name = field.sql_name().to_string();
        let identifier = field.identifier();
        fields.add(field)?;
        self.sql_names.push(sql_name.clone());
        self.identifiers.insert(identifier);
        log::debug!(target: "QUERY", "added parameterized field {}", sql_name);
        Ok(sql_name)
    }

    /// Removes a field this list owns, handing it back for widget cleanup.
    pub fn delete_field(
        &mut self,
        fields: &mut HeaderFieldCollection,
        sql_name: &str,
    ) -> Option<HeaderField> {
        let position = self.sql_names.iter().position(|s| s == sql_name)?;
        self.sql_names.remove(position);
        let removed = fields.remove(sql_name)?;
        self.identifiers.remove(&removed.identifier());
        Some(removed)
    }

    /// Removes every field this list owns.
    pub fn reset(&mut self, fields: &mut HeaderFieldCollection) -> Vec<HeaderField> {
        let owned: Vec<String> = self.sql_names.clone();
        owned
            .iter()
            .filter_map(|sql_name| self.delete_field(fields, sql_name))
            .collect()
    }

    pub fn add_history_arguments(
        &self,
        fields: &HeaderFieldCollection,
        args: &mut HistoryArguments,
    ) {
        let owned = self
            .sql_names
            .iter()
            .filter_map(|sql_name| fields.get_by_sql_name(sql_name).ok());
        for (index, field) in owned.enumerate() {
            if let FieldKind::Parameterized { kind, value } = field.kind() {
                let base_key = list_key(index);
                args.insert(format!("{}_type", base_key), kind.type_name().to_string());
                args.insert(format!("{}_value", base_key), value.clone());
            }
        }
    }

    /// Replaces the owned fields with the ones described in `args`.
    pub fn handle_history_arguments(
        &mut self,
        fields: &mut HeaderFieldCollection,
        args: &HistoryArguments,
    ) -> QueryResult<()> {
        self.reset(fields);
        for index in 0.. {
            let base_key = list_key(index);
            let type_name = args.get(&format!("{}_type", base_key));
            let value = args.get(&format!("{}_value", base_key));
            match (type_name, value) {
                (Some(type_name), Some(value)) => {
                    self.add_field(fields, type_name, value)?;
                }
                _ => break,
            }
        }
        Ok(())
    }
}

//! FILENAME: core/tko-query/src/boolean_filter.rs
//! "All of" / "any of" list of `column condition` rows, with an optional
//! manual override of the generated filter string.

use crate::history::{parse_bool, HistoryArguments};
use crate::sql::join_strings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    All,
    Any,
}

impl BooleanOp {
    fn joiner(&self) -> &'static str {
        match self {
            BooleanOp::All => " AND ",
            BooleanOp::Any => " OR ",
        }
    }
}

/// One `{db column, condition}` row, e.g. `hostname` + `LIKE 'host1%'`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseFilter {
    pub db_column: String,
    pub condition: String,
}

impl DatabaseFilter {
    pub fn new(db_column: impl Into<String>, condition: impl Into<String>) -> Self {
        DatabaseFilter {
            db_column: db_column.into(),
            condition: condition.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.condition.is_empty()
    }

    fn filter_string(&self) -> String {
        format!("{} {}", self.db_column, self.condition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSelector {
    filters: Vec<DatabaseFilter>,
    op: BooleanOp,
    /// Hand-edited filter string replacing the generated one.
    manual_text: Option<String>,
}

impl Default for FilterSelector {
    fn default() -> Self {
        FilterSelector {
            filters: vec![DatabaseFilter::default()],
            op: BooleanOp::All,
            manual_text: None,
        }
    }
}

impl FilterSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(&self) -> &[DatabaseFilter] {
        &self.filters
    }

    pub fn op(&self) -> BooleanOp {
        self.op
    }

    pub fn set_op(&mut self, op: BooleanOp) {
        self.op = op;
    }

    /// Appends an empty row and returns its position.
    pub fn add_filter(&mut self) -> usize {
        self.filters.push(DatabaseFilter::default());
        self.filters.len() - 1
    }

    pub fn filter_mut(&mut self, index: usize) -> Option<&mut DatabaseFilter> {
        self.filters.get_mut(index)
    }

    /// Deleting the only row clears it instead.
    pub fn delete_filter(&mut self, index: usize) {
        if self.filters.len() <= 1 {
            self.reset();
        } else if index < self.filters.len() {
            self.filters.remove(index);
        }
    }

    pub fn reset(&mut self) {
        self.filters = vec![DatabaseFilter::default()];
    }

    /// Overrides the generated string. Rows are ignored while set.
    pub fn set_manual_text(&mut self, text: Option<String>) {
        self.manual_text = text;
    }

    pub fn is_edited(&self) -> bool {
        self.manual_text.is_some()
    }

    fn generated_string(&self) -> String {
        let parts: Vec<String> = self
            .filters
            .iter()
            .filter(|f| !f.is_empty())
            .map(DatabaseFilter::filter_string)
            .collect();
        join_strings(self.op.joiner(), &parts)
    }

    pub fn filter_string(&self) -> String {
        match &self.manual_text {
            Some(text) => text.clone(),
            None => self.generated_string(),
        }
    }

    pub fn add_to_history(&self, args: &mut HistoryArguments, prefix: &str) {
        for (index, filter) in self.filters.iter().enumerate() {
            args.insert(format!("{}[{}][db]", prefix, index), filter.db_column.clone());
            args.insert(format!("{}[{}][condition]", prefix, index), filter.condition.clone());
        }
        args.insert(format!("{}_all", prefix), (self.op == BooleanOp::All).to_string());
        args.insert(format!("{}_edited", prefix), self.is_edited().to_string());
        if let Some(text) = &self.manual_text {
            args.insert(format!("{}_text", prefix), text.clone());
        }
    }

    pub fn handle_history_arguments(&mut self, args: &HistoryArguments, prefix: &str) {
        let mut filters = Vec::new();
        while let Some(db) = args.get(&format!("{}[{}][db]", prefix, filters.len())) {
            let condition = args
                .get(&format!("{}[{}][condition]", prefix, filters.len()))
                .cloned()
                .unwrap_or_default();
            filters.push(DatabaseFilter::new(db.clone(), condition));
        }
        if filters.is_empty() {
            filters.push(DatabaseFilter::default());
        }
        self.filters = filters;

        self.op = if parse_bool(args.get(&format!("{}_all", prefix))) {
            BooleanOp::All
        } else {
            BooleanOp::Any
        };
        self.manual_text = if parse_bool(args.get(&format!("{}_edited", prefix))) {
            Some(args.get(&format!("{}_text", prefix)).cloned().unwrap_or_default())
        } else {
            None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> FilterSelector {
        let mut selector = FilterSelector::new();
        *selector.filter_mut(0).unwrap() = DatabaseFilter::new("hostname", "LIKE 'host1%'");
        selector.add_filter();
        let index = selector.add_filter();
        *selector.filter_mut(index).unwrap() = DatabaseFilter::new("status", "= 'FAIL'");
        selector
    }

    #[test]
    fn test_joins_nonempty_rows() {
        let mut selector = selector();
        assert_eq!(selector.filter_string(), "hostname LIKE 'host1%' AND status = 'FAIL'");
        selector.set_op(BooleanOp::Any);
        assert_eq!(selector.filter_string(), "hostname LIKE 'host1%' OR status = 'FAIL'");
    }

    #[test]
    fn test_manual_override() {
        let mut selector = selector();
        selector.set_manual_text(Some("test_idx > 5".into()));
        assert_eq!(selector.filter_string(), "test_idx > 5");
    }

    #[test]
    fn test_delete_last_row_resets() {
        let mut selector = FilterSelector::new();
        *selector.filter_mut(0).unwrap() = DatabaseFilter::new("hostname", "= 'a'");
        selector.delete_filter(0);
        assert_eq!(selector.filters(), &[DatabaseFilter::default()]);
    }

    #[test]
    fn test_history_round_trip() {
        let mut original = selector();
        original.set_op(BooleanOp::Any);
        original.set_manual_text(Some("kernel = '4.4'".into()));
        let mut args = HistoryArguments::new();
        original.add_to_history(&mut args, "seriesFilters");
        assert_eq!(args.get("seriesFilters[0][db]").map(String::as_str), Some("hostname"));

        let mut restored = FilterSelector::new();
        restored.handle_history_arguments(&args, "seriesFilters");
        assert_eq!(restored, original);
    }
}

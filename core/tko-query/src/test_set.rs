//! FILENAME: core/tko-query/src/test_set.rs
//! PURPOSE: Sets of tests selected by a user action, expressed as SQL.
//! CONTEXT: Built transiently on a cell click or selection action, then used
//! to refine the global condition (drilldown) or handed to an action
//! (abort, label, switch view). Never persisted.

use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::field::HeaderField;
use crate::filter::ConditionPayload;
use crate::sql::join_with_parens;

/// Conjunction of per-field predicates on top of the global condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionTestSet {
    initial: ConditionPayload,
    predicates: Vec<String>,
    single_test: bool,
}

impl ConditionTestSet {
    pub fn new(initial: ConditionPayload) -> Self {
        ConditionTestSet {
            initial,
            predicates: Vec::new(),
            single_test: false,
        }
    }

    /// A set known to match exactly one test, without a test index to hand.
    pub fn new_single(initial: ConditionPayload) -> Self {
        ConditionTestSet {
            single_test: true,
            ..Self::new(initial)
        }
    }

    pub fn add_condition(&mut self, predicate: impl Into<String>) {
        let predicate = predicate.into();
        if !predicate.trim().is_empty() {
            self.predicates.push(predicate);
        }
    }

    pub fn add_field(&mut self, field: &HeaderField, value: &str) -> QueryResult<()> {
        let predicate = field.sql_condition(value)?;
        self.add_condition(predicate);
        Ok(())
    }

    /// Pairs fields with values positionally. Values may be shorter than
    /// fields (a header cell for an outer field only).
    pub fn set_fields<S: AsRef<str>>(
        &mut self,
        fields: &[&HeaderField],
        values: &[S],
    ) -> QueryResult<()> {
        for (field, value) in fields.iter().zip(values) {
            self.add_field(field, value.as_ref())?;
        }
        Ok(())
    }

    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    pub fn initial(&self) -> &ConditionPayload {
        &self.initial
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestSet {
    Single { test_index: i64 },
    Condition(ConditionTestSet),
    /// Disjunction of the contained sets.
    Composite(Vec<TestSet>),
}

impl TestSet {
    /// Test set for one aggregated group. `axes` pairs each axis' field list
    /// with the group's values on that axis; axes whose header is absent are
    /// simply left out. A group holding exactly one test with a known index
    /// collapses to [`TestSet::Single`].
    pub fn for_group(
        initial: &ConditionPayload,
        axes: &[(&[&HeaderField], &[String])],
        test_count: u64,
        test_index: Option<i64>,
    ) -> QueryResult<TestSet> {
        if test_count == 1 {
            if let Some(test_index) = test_index {
                return Ok(TestSet::Single { test_index });
            }
        }
        let mut set = if test_count == 1 {
            ConditionTestSet::new_single(initial.clone())
        } else {
            ConditionTestSet::new(initial.clone())
        };
        for &(fields, values) in axes {
            set.set_fields(fields, values)?;
        }
        Ok(TestSet::Condition(set))
    }

    pub fn composite(sets: Vec<TestSet>) -> TestSet {
        TestSet::Composite(sets)
    }

    /// The condition contributed by the selection alone, without the global
    /// condition. Used to refine the global condition on drilldown.
    pub fn partial_sql_condition(&self) -> String {
        match self {
            TestSet::Single { test_index } => format!("test_idx = {}", test_index),
            TestSet::Condition(set) => join_with_parens(" AND ", &set.predicates),
            TestSet::Composite(sets) => {
                let parts: Vec<String> = sets.iter().map(TestSet::partial_sql_condition).collect();
                join_with_parens(" OR ", &parts)
            }
        }
    }

    /// The full condition selecting this set's tests.
    pub fn sql_condition(&self) -> String {
        match self {
            TestSet::Single { .. } => self.partial_sql_condition(),
            TestSet::Condition(set) => {
                let partial = self.partial_sql_condition();
                join_with_parens(" AND ", &[set.initial.extra_where.as_str(), partial.as_str()])
            }
            TestSet::Composite(sets) => {
                let parts: Vec<String> = sets.iter().map(TestSet::sql_condition).collect();
                join_with_parens(" OR ", &parts)
            }
        }
    }

    /// The condition payload for RPCs acting on this set: the global
    /// payload's side parameters with `extra_where` replaced by
    /// [`TestSet::sql_condition`].
    pub fn condition_payload(&self) -> ConditionPayload {
        let base = self.initial_payload().cloned().unwrap_or_default();
        ConditionPayload {
            extra_where: self.sql_condition(),
            ..base
        }
    }

    fn initial_payload(&self) -> Option<&ConditionPayload> {
        match self {
            TestSet::Single { .. } => None,
            TestSet::Condition(set) => Some(&set.initial),
            TestSet::Composite(sets) => sets.iter().find_map(TestSet::initial_payload),
        }
    }

    pub fn is_single_test(&self) -> bool {
        match self {
            TestSet::Single { .. } => true,
            TestSet::Condition(set) => set.single_test,
            TestSet::Composite(sets) => sets.len() == 1 && sets[0].is_single_test(),
        }
    }

    pub fn test_index(&self) -> Option<i64> {
        match self {
            TestSet::Single { test_index } => Some(*test_index),
            TestSet::Condition(_) => None,
            TestSet::Composite(sets) if sets.len() == 1 => sets[0].test_index(),
            TestSet::Composite(_) => None,
        }
    }
}

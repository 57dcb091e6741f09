//! FILENAME: core/tko-query/src/lib.rs
//! Query model for the TKO results browser.
//!
//! Layers:
//! - `field` / `collection`: header fields a view can group by, and the
//!   dual-keyed collection they live in
//! - `parameterized`: user-instantiated attribute/label/keyval fields
//! - `filter` / `boolean_filter`: the global condition and filter rows
//! - `test_set`: selections expressed as SQL, for drilldown and actions
//! - `status`: pass-rate summaries and their color buckets
//! - `history`: flat key/value state for bookmarks
//!
//! Nothing here performs I/O.

pub mod boolean_filter;
pub mod collection;
pub mod error;
pub mod field;
pub mod filter;
pub mod history;
pub mod parameterized;
pub mod params;
pub mod sql;
pub mod status;
pub mod test_set;

pub use boolean_filter::{BooleanOp, DatabaseFilter, FilterSelector};
pub use collection::HeaderFieldCollection;
pub use error::{QueryError, QueryResult};
pub use field::{FieldKind, HeaderField, ParameterizedKind};
pub use filter::{CommonFilter, ConditionPayload, FilterData, FilterId, FilterKind};
pub use history::{decode_history_token, encode_history_token, HistoryArguments};
pub use parameterized::ParameterizedFieldList;
pub use params::QueryParameters;
pub use sql::{join_with_parens, refine, JSON_NULL};
pub use status::{StatusColor, StatusSummary};
pub use test_set::{ConditionTestSet, TestSet};

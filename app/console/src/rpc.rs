//! FILENAME: app/console/src/rpc.rs
//! PURPOSE: JSON-RPC boundary to the TKO and AFE servers.
//! CONTEXT: Requests are `{"method", "params": [params], "id"}` POSTed to
//! the RPC endpoint; responses carry `result` or an `error` object. The
//! view only depends on the `RpcClient` trait so tests can swap in a fake.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tko_query::{ConditionPayload, QueryParameters};

use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::log_debug;

pub const STATUS_COUNTS_METHOD: &str = "get_status_counts";
pub const JOB_IDS_METHOD: &str = "get_job_ids";
pub const PERCENT_COMPLETE_METHOD: &str = "get_hqe_percentage_complete";
pub const TEST_VIEWS_METHOD: &str = "get_test_views";
pub const LABEL_ADD_METHOD: &str = "test_label_add_tests";
pub const LABEL_REMOVE_METHOD: &str = "test_label_remove_tests";

/// Keys that page a query; exports always fetch everything.
pub const PAGINATION_KEYS: [&str; 2] = ["query_start", "query_limit"];

#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> ConsoleResult<Value>;
}

pub fn request_body(method: &str, params: Value, id: u64) -> Value {
    json!({
        "method": method,
        "params": [params],
        "id": id,
    })
}

/// Extracts `result`, or turns a non-null `error` into `ConsoleError::Rpc`.
pub fn parse_response(payload: Value) -> ConsoleResult<Value> {
    if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
        let name = error
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("RpcError")
            .to_string();
        let message = match error.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => error.to_string(),
        };
        return Err(ConsoleError::Rpc { name, message });
    }
    Ok(payload.get("result").cloned().unwrap_or(Value::Null))
}

// ============================================================================
// HTTP PROXY
// ============================================================================

pub struct JsonRpcProxy {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcProxy {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ConsoleResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(JsonRpcProxy {
            client,
            url: url.into(),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn tko(config: &ConsoleConfig) -> ConsoleResult<Self> {
        Self::new(config.tko_rpc_url(), config.request_timeout())
    }

    pub fn afe(config: &ConsoleConfig) -> ConsoleResult<Self> {
        Self::new(config.afe_rpc_url(), config.request_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RpcClient for JsonRpcProxy {
    async fn call(&self, method: &str, params: Value) -> ConsoleResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = request_body(method, params, id);
        log_debug!("RPC", "{} #{} -> {}", method, id, self.url);

        let resp = self.client.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(ConsoleError::Rpc {
                name: "HttpError".to_string(),
                message: format!("{} returned HTTP {}", method, resp.status()),
            });
        }
        let payload: Value = resp.json().await?;
        parse_response(payload)
    }
}

// ============================================================================
// GROUP QUERIES
// ============================================================================

/// A grouped status-count request for a pivot.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupQuery {
    pub condition: ConditionPayload,
    pub row_fields: Vec<String>,
    pub column_fields: Vec<String>,
    /// Extra per-group fields returned as `extra_info` lines.
    pub extra_info: Vec<String>,
    /// Side information the selected fields need (attribute names, ...).
    pub field_params: QueryParameters,
}

impl GroupQuery {
    pub fn to_params(&self) -> QueryParameters {
        let mut params = self.condition.to_query_parameters();
        params.merge(&self.field_params);
        let group_by: Vec<&String> = self.row_fields.iter().chain(&self.column_fields).collect();
        params.insert("group_by", json!(group_by));
        params.insert("header_groups", json!([self.row_fields, self.column_fields]));
        if !self.extra_info.is_empty() {
            params.insert("extra_info", json!(self.extra_info));
        }
        params
    }
}

pub fn strip_pagination(params: &mut QueryParameters) {
    for key in PAGINATION_KEYS {
        params.remove(key);
    }
}

/// GET URL of the CSV export of `method(params)`: the whole request,
/// without pagination, url-encoded after `?`.
pub fn csv_url(csv_base: &str, method: &str, params: &QueryParameters) -> String {
    let mut params = params.clone();
    strip_pagination(&mut params);
    let request = request_body(method, params.into_value(), 0);
    format!("{}?{}", csv_base, urlencoding::encode(&request.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_result() {
        let payload = json!({"result": [1, 2], "error": null, "id": 0});
        assert_eq!(parse_response(payload).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_parse_response_error() {
        let payload = json!({"result": null, "error": {"name": "ValidationError", "message": "bad field"}});
        match parse_response(payload) {
            Err(ConsoleError::Rpc { name, message }) => {
                assert_eq!(name, "ValidationError");
                assert_eq!(message, "bad field");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_group_query_params() {
        let query = GroupQuery {
            condition: ConditionPayload::from_condition("status = 'FAIL'"),
            row_fields: vec!["kernel".to_string()],
            column_fields: vec!["platform".to_string(), "hostname".to_string()],
            extra_info: Vec::new(),
            field_params: QueryParameters::new(),
        };
        let params = query.to_params();
        assert_eq!(params.get("group_by"), Some(&json!(["kernel", "platform", "hostname"])));
        assert_eq!(
            params.get("header_groups"),
            Some(&json!([["kernel"], ["platform", "hostname"]]))
        );
        assert!(params.get_str("extra_where").unwrap().contains("status = 'FAIL'"));
        assert!(!params.contains_key("extra_info"));
    }

    #[test]
    fn test_csv_url_drops_pagination() {
        let mut params = QueryParameters::new();
        params.insert("extra_where", json!("hostname = 'a&b'"));
        params.insert("query_start", json!(0));
        params.insert("query_limit", json!(30));
        let url = csv_url("http://autotest/new_tko/server/csv/", STATUS_COUNTS_METHOD, &params);

        let (base, encoded) = url.split_once('?').unwrap();
        assert_eq!(base, "http://autotest/new_tko/server/csv/");
        assert!(!encoded.contains('&'));
        let request: Value = serde_json::from_str(&urlencoding::decode(encoded).unwrap()).unwrap();
        assert_eq!(request["method"], STATUS_COUNTS_METHOD);
        assert_eq!(request["params"][0], json!({"extra_where": "hostname = 'a&b'"}));
    }
}

//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for console integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use console_lib::{
    ConsoleConfig, ConsoleError, ConsoleResult, RecordingNotifier, RpcClient, SpreadsheetView,
};
use serde_json::{json, Value};
use spreadsheet_engine::MemorySurface;

pub type TestView = SpreadsheetView<FakeRpc, MemorySurface, RecordingNotifier>;

// ============================================================================
// FAKE RPC BACKEND
// ============================================================================

type Reply = Result<Value, (String, String)>;

#[derive(Default)]
struct FakeState {
    replies: HashMap<String, VecDeque<Reply>>,
    calls: Vec<(String, Value)>,
}

/// Scripted RPC server. Clones share the same script and call log.
#[derive(Clone, Default)]
pub struct FakeRpc {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for the next call to `method`.
    pub fn respond(&self, method: &str, result: Value) {
        let mut state = self.state.lock().unwrap();
        state.replies.entry(method.to_string()).or_default().push_back(Ok(result));
    }

    /// Queue an error reply for the next call to `method`.
    pub fn fail(&self, method: &str, name: &str, message: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .replies
            .entry(method.to_string())
            .or_default()
            .push_back(Err((name.to_string(), message.to_string())));
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Params of every call to `method`, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params)
            .collect()
    }
}

#[async_trait]
impl RpcClient for FakeRpc {
    async fn call(&self, method: &str, params: Value) -> ConsoleResult<Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((method.to_string(), params));
        match state.replies.get_mut(method).and_then(VecDeque::pop_front) {
            Some(Ok(result)) => Ok(result),
            Some(Err((name, message))) => Err(ConsoleError::Rpc { name, message }),
            None => Err(ConsoleError::Rpc {
                name: "NoReply".to_string(),
                message: format!("no scripted reply for {}", method),
            }),
        }
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// Test harness around a view wired to fake TKO and AFE servers.
pub struct TestHarness {
    pub view: TestView,
    pub tko: FakeRpc,
    pub afe: FakeRpc,
}

impl TestHarness {
    /// Create a harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ConsoleConfig::default())
    }

    pub fn with_config(config: ConsoleConfig) -> Self {
        let tko = FakeRpc::new();
        let afe = FakeRpc::new();
        let view = SpreadsheetView::new(
            tko.clone(),
            afe.clone(),
            MemorySurface::new(1024, 768),
            RecordingNotifier::new(),
            config,
        )
        .unwrap();
        TestHarness { view, tko, afe }
    }

    /// Create a harness with a small cell budget.
    pub fn with_max_cells(max_cell_count: usize) -> Self {
        Self::with_config(ConsoleConfig { max_cell_count, ..ConsoleConfig::default() })
    }

    pub fn notifier(&self) -> &RecordingNotifier {
        self.view.notifier()
    }

    /// Script a status-count reply.
    pub fn respond_status(&self, response: Value) {
        self.tko.respond("get_status_counts", response);
    }

    /// Params of the last status-count request.
    pub fn last_status_request(&self) -> Value {
        self.tko
            .calls_to("get_status_counts")
            .pop()
            .expect("no status-count request was sent")
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// A status-count response with one-field headers on both axes.
pub fn status_response(rows: &[&str], columns: &[&str], groups: Vec<Value>) -> Value {
    let rows: Vec<Vec<&str>> = rows.iter().map(|r| vec![*r]).collect();
    let columns: Vec<Vec<&str>> = columns.iter().map(|c| vec![*c]).collect();
    json!({
        "header_values": [rows, columns],
        "groups": groups,
    })
}

pub fn group(row: usize, column: usize, total: u64, passed: u64) -> Value {
    json!({
        "header_indices": [row, column],
        "group_count": total,
        "pass_count": passed,
        "complete_count": total,
        "incomplete_count": 0,
    })
}

pub fn single_test_group(row: usize, column: usize, test_idx: i64, passed: bool) -> Value {
    json!({
        "header_indices": [row, column],
        "group_count": 1,
        "pass_count": if passed { 1 } else { 0 },
        "complete_count": 1,
        "incomplete_count": 0,
        "test_idx": test_idx,
    })
}

/// Kernel rows by platform columns, two populated cells.
pub fn kernel_by_platform() -> Value {
    status_response(
        &["2.6.18", "2.6.24"],
        &["x86", "arm"],
        vec![group(0, 0, 5, 4), group(1, 1, 10, 10)],
    )
}

pub fn extra_where(params: &Value) -> String {
    params["extra_where"].as_str().unwrap_or_default().to_string()
}

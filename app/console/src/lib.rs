//! FILENAME: app/console/src/lib.rs
// PURPOSE: Console library: the spreadsheet view controller and its services.
// CONTEXT: Wires tko-query and spreadsheet-engine to a JSON-RPC backend, a
// notifier and the unified log.

pub mod config;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod rpc;
pub mod spreadsheet_view;

pub use config::ConsoleConfig;
pub use error::{ConsoleError, ConsoleResult};
pub use logging::{init_log_file, install_log_bridge, next_seq, sort_log_file, write_log, write_log_raw};
pub use notifier::{LogNotifier, Notification, Notifier, RecordingNotifier};
pub use rpc::{csv_url, GroupQuery, JsonRpcProxy, RpcClient};
pub use spreadsheet_view::{
    CellClick, ContextMenu, DrilldownType, MenuItem, RefreshOutcome, RefreshTicket,
    SpreadsheetView, ViewAction,
};

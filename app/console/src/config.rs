//! FILENAME: app/console/src/config.rs
//! PURPOSE: Console configuration: server endpoints, timeouts, render limits.
//! CONTEXT: Loaded from a JSON file whose fields are all optional, then
//! patched from the environment. `Default` is a usable local setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spreadsheet_engine::{
    SpreadsheetLimits, CELLS_PER_ITERATION, MAX_CELL_COUNT, ROWS_PROCESSED_PER_ITERATION,
};
use tko_query::field::DEFAULT_HOST_LABELS_COLUMN;

use crate::error::{ConsoleError, ConsoleResult};

pub const ENV_SERVER_URL: &str = "TKO_CONSOLE_SERVER_URL";
pub const ENV_LOG_FILE: &str = "TKO_CONSOLE_LOG_FILE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub server_url: String,
    pub tko_rpc_path: String,
    pub afe_rpc_path: String,
    pub csv_path: String,
    pub request_timeout_secs: u64,
    pub max_cell_count: usize,
    pub cells_per_iteration: usize,
    pub rows_processed_per_iteration: usize,
    /// Backend column holding a host's comma-separated labels.
    pub host_labels_column: String,
    pub log_file: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            server_url: "http://localhost".to_string(),
            tko_rpc_path: "/new_tko/server/rpc/".to_string(),
            afe_rpc_path: "/afe/server/rpc/".to_string(),
            csv_path: "/new_tko/server/csv/".to_string(),
            request_timeout_secs: 60,
            max_cell_count: MAX_CELL_COUNT,
            cells_per_iteration: CELLS_PER_ITERATION,
            rows_processed_per_iteration: ROWS_PROCESSED_PER_ITERATION,
            host_labels_column: DEFAULT_HOST_LABELS_COLUMN.to_string(),
            log_file: None,
        }
    }
}

impl ConsoleConfig {
    /// Reads a JSON config file and applies environment overrides.
    pub fn load(path: &Path) -> ConsoleResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: ConsoleConfig = serde_json::from_str(&text)
            .map_err(|e| ConsoleError::Config(format!("{:?}: {}", path, e)))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults patched from the environment.
    pub fn from_env() -> ConsoleResult<Self> {
        let mut config = ConsoleConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.trim().is_empty()) {
            self.server_url = url.trim().to_string();
        }
        if let Some(path) = lookup(ENV_LOG_FILE).filter(|v| !v.trim().is_empty()) {
            self.log_file = Some(PathBuf::from(path.trim()));
        }
    }

    pub fn validate(&self) -> ConsoleResult<()> {
        if self.server_url.trim().is_empty() {
            return Err(ConsoleError::Config("server_url is empty".to_string()));
        }
        if self.max_cell_count == 0 || self.cells_per_iteration == 0 || self.rows_processed_per_iteration == 0 {
            return Err(ConsoleError::Config("render limits must be positive".to_string()));
        }
        Ok(())
    }

    fn join(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    pub fn tko_rpc_url(&self) -> String {
        self.join(&self.tko_rpc_path)
    }

    pub fn afe_rpc_url(&self) -> String {
        self.join(&self.afe_rpc_path)
    }

    pub fn csv_url(&self) -> String {
        self.join(&self.csv_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn limits(&self) -> SpreadsheetLimits {
        SpreadsheetLimits {
            max_cell_count: self.max_cell_count,
            cells_per_iteration: self.cells_per_iteration,
            rows_processed_per_iteration: self.rows_processed_per_iteration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ConsoleConfig =
            serde_json::from_str(r#"{"server_url": "http://autotest/", "max_cell_count": 10}"#).unwrap();
        assert_eq!(config.tko_rpc_url(), "http://autotest/new_tko/server/rpc/");
        assert_eq!(config.csv_url(), "http://autotest/new_tko/server/csv/");
        assert_eq!(config.limits().max_cell_count, 10);
        assert_eq!(config.limits().cells_per_iteration, CELLS_PER_ITERATION);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ConsoleConfig::default();
        config.apply_overrides(|key| match key {
            ENV_SERVER_URL => Some("http://other".to_string()),
            ENV_LOG_FILE => Some("/tmp/console.log".to_string()),
            _ => None,
        });
        assert_eq!(config.afe_rpc_url(), "http://other/afe/server/rpc/");
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/console.log")));
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = ConsoleConfig::default();
        config.apply_overrides(|_| Some("  ".to_string()));
        assert_eq!(config, ConsoleConfig::default());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = ConsoleConfig { cells_per_iteration: 0, ..ConsoleConfig::default() };
        assert!(matches!(config.validate(), Err(ConsoleError::Config(_))));
    }
}

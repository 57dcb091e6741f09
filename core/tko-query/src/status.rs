//! FILENAME: core/tko-query/src/status.rs
//! Pass/complete/incomplete summaries and the color bucket they map to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Color bucket for a summary cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusColor {
    Green,
    LightGreen,
    Yellow,
    Orange,
    Red,
    Magenta,
    /// No completed tests.
    Blank,
}

/// Descending (min percent, color) table. First match wins.
const COLOR_THRESHOLDS: [(f64, StatusColor); 6] = [
    (95.0, StatusColor::Green),
    (90.0, StatusColor::LightGreen),
    (85.0, StatusColor::Yellow),
    (75.0, StatusColor::Orange),
    (1.0, StatusColor::Red),
    (0.0, StatusColor::Magenta),
];

impl StatusColor {
    pub fn for_counts(passed: u64, complete: u64) -> Self {
        if complete == 0 {
            return StatusColor::Blank;
        }
        let percent = passed as f64 * 100.0 / complete as f64;
        COLOR_THRESHOLDS
            .iter()
            .find(|(min_percent, _)| percent >= *min_percent)
            .map(|(_, color)| *color)
            .unwrap_or(StatusColor::Magenta)
    }

    /// CSS-style color value for renderers.
    pub fn css(&self) -> &'static str {
        match self {
            StatusColor::Green => "#32cd32",
            StatusColor::LightGreen => "#c0ff80",
            StatusColor::Yellow => "#ffff00",
            StatusColor::Orange => "#ffc040",
            StatusColor::Red => "#ff4040",
            StatusColor::Magenta => "#ff00ff",
            StatusColor::Blank => "#ffffff",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub passed: u64,
    pub complete: u64,
    pub incomplete: u64,
    pub total: u64,
    /// Extra per-cell content lines (additional selected content fields).
    #[serde(default)]
    pub extra_info: Vec<String>,
}

fn count(group: &Value, key: &str) -> u64 {
    group.get(key).and_then(Value::as_u64).unwrap_or(0)
}

impl StatusSummary {
    pub fn new(passed: u64, complete: u64, incomplete: u64, total: u64) -> Self {
        StatusSummary {
            passed,
            complete,
            incomplete,
            total,
            extra_info: Vec::new(),
        }
    }

    /// Reads the aggregate counts off one backend group row. Missing counts
    /// read as zero.
    pub fn from_group(group: &Value) -> Self {
        let extra_info = group
            .get("extra_info")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        StatusSummary {
            passed: count(group, "pass_count"),
            complete: count(group, "complete_count"),
            incomplete: count(group, "incomplete_count"),
            total: count(group, "group_count"),
            extra_info,
        }
    }

    pub fn color(&self) -> StatusColor {
        StatusColor::for_counts(self.passed, self.complete)
    }

    pub fn format_contents(&self) -> String {
        let mut contents = format!("{} / {}", self.passed, self.complete);
        if self.incomplete > 0 {
            contents.push_str(&format!(" ({} incomplete)", self.incomplete));
        }
        for line in &self.extra_info {
            contents.push('\n');
            contents.push_str(line);
        }
        contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(StatusColor::for_counts(95, 100), StatusColor::Green);
        assert_eq!(StatusColor::for_counts(94, 100), StatusColor::LightGreen);
        assert_eq!(StatusColor::for_counts(85, 100), StatusColor::Yellow);
        assert_eq!(StatusColor::for_counts(4, 5), StatusColor::Orange);
        assert_eq!(StatusColor::for_counts(1, 100), StatusColor::Red);
        assert_eq!(StatusColor::for_counts(0, 100), StatusColor::Magenta);
        assert_eq!(StatusColor::for_counts(0, 0), StatusColor::Blank);
    }

    #[test]
    fn test_format_contents() {
        let mut summary = StatusSummary::new(4, 5, 0, 5);
        assert_eq!(summary.format_contents(), "4 / 5");
        summary.incomplete = 2;
        summary.extra_info = vec!["reason: timeout".into()];
        assert_eq!(summary.format_contents(), "4 / 5 (2 incomplete)\nreason: timeout");
    }

    #[test]
    fn test_from_group() {
        let group = json!({
            "group_count": 7, "pass_count": 3, "complete_count": 6,
            "incomplete_count": 1, "extra_info": ["a", null, 2]
        });
        let summary = StatusSummary::from_group(&group);
        assert_eq!(summary, StatusSummary {
            passed: 3,
            complete: 6,
            incomplete: 1,
            total: 7,
            extra_info: vec!["a".into(), "".into(), "2".into()],
        });
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

const FALLBACK_FILE_STEM: &str = "tool-export";

/// Snapshot of one planning tool's form state, written as a standalone JSON file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExport {
    pub tool: String,
    pub exported_at: DateTime<Utc>,
    pub state: serde_json::Value,
}

impl ToolExport {
    #[must_use]
    pub fn new(tool: impl Into<String>, state: serde_json::Value, at: DateTime<Utc>) -> Self {
        Self {
            tool: tool.into(),
            exported_at: at,
            state,
        }
    }

    /// File name derived from the tool name, e.g. `"ROI Calculator"` becomes
    /// `roi-calculator.json`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let mut stem = String::with_capacity(self.tool.len());
        for ch in self.tool.chars() {
            if ch.is_ascii_alphanumeric() {
                stem.push(ch.to_ascii_lowercase());
            } else if !stem.is_empty() && !stem.ends_with('-') {
                stem.push('-');
            }
        }
        let stem = stem.trim_end_matches('-');
        let stem = if stem.is_empty() {
            FALLBACK_FILE_STEM
        } else {
            stem
        };
        format!("{stem}.json")
    }

    /// Pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the state cannot be encoded.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

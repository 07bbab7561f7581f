use std::fs;
use std::path::{Path, PathBuf};

use companion_core::Clock;
use companion_core::model::ToolExport;
use tracing::info;

use crate::error::ExportError;

/// Writes a tool's form state to a standalone, pretty-printed JSON file.
#[derive(Clone, Debug)]
pub struct ExportService {
    clock: Clock,
}

impl ExportService {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Build the export document without writing it.
    #[must_use]
    pub fn document(&self, tool_name: &str, state: serde_json::Value) -> ToolExport {
        ToolExport::new(tool_name, state, self.clock.now())
    }

    /// Write the export into `dir` (created if missing) and return its path.
    /// An existing export of the same tool is replaced.
    ///
    /// # Errors
    ///
    /// Returns `ExportError` if the document cannot be encoded or written.
    pub fn export(
        &self,
        tool_name: &str,
        state: serde_json::Value,
        dir: &Path,
    ) -> Result<PathBuf, ExportError> {
        let export = self.document(tool_name, state);
        let body = export.to_pretty_json()?;

        fs::create_dir_all(dir)?;
        let path = dir.join(export.file_name());
        fs::write(&path, body)?;

        info!(tool = tool_name, path = %path.display(), "exported tool state");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_core::time::fixed_clock;
    use serde_json::json;

    #[test]
    fn writes_pretty_json_named_after_tool() {
        let dir = tempfile::tempdir().unwrap();
        let svc = ExportService::new(fixed_clock());

        let path = svc
            .export(
                "Break-even Calculator",
                json!({"fixedCosts": 1200, "unitPrice": 30}),
                &dir.path().join("exports"),
            )
            .unwrap();

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("break-even-calculator.json")
        );
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"tool\": \"Break-even Calculator\""));
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["state"]["unitPrice"], 30);
        assert_eq!(parsed["exportedAt"], "2023-11-14T22:13:20Z");
    }
}

//! JSON report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use crate::domain::error::MacrocycleError;
use crate::domain::evaluation::Evaluation;
use crate::ports::report_port::ReportPort;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for JsonReportAdapter {
    fn render(&self, evaluation: &Evaluation) -> Result<String, MacrocycleError> {
        serde_json::to_string_pretty(evaluation).map_err(|e| MacrocycleError::Report {
            reason: format!("failed to serialize evaluation: {e}"),
        })
    }

    fn write(&self, evaluation: &Evaluation, output_path: &str) -> Result<(), MacrocycleError> {
        let mut json = self.render(evaluation)?;
        json.push('\n');

        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| MacrocycleError::Report {
                reason: format!("failed to create {}: {e}", parent.display()),
            })?;
        }
        fs::write(path, json).map_err(|e| MacrocycleError::Report {
            reason: format!("failed to write {output_path}: {e}"),
        })?;
        info!(path = output_path, "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine_config::EngineConfig;
    use crate::domain::evaluation::evaluate;
    use crate::domain::snapshot::IndicatorSnapshot;
    use tempfile::TempDir;

    fn fallback_evaluation() -> Evaluation {
        evaluate(&IndicatorSnapshot::empty(), &[], &[], None, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn render_uses_wire_names() {
        let json = JsonReportAdapter::new().render(&fallback_evaluation()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cycle"]["phase"], "EXPANSION");
        assert_eq!(value["timing"]["band"], "NEUTRAL");
        assert_eq!(value["config_version"], "builtin-1");
        assert!(value["alignment"].is_null());
        assert_eq!(value["allocation"]["weights"]["consumer_cyclical"], 20.0);
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("evaluation.json");
        JsonReportAdapter::new()
            .write(&fallback_evaluation(), path.to_str().unwrap())
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        assert!(content.contains("\"phase\": \"EXPANSION\""));
    }
}

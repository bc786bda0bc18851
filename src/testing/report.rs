//! Machine-readable run report

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::automation::ElementState;
use crate::common::Result;
use crate::engine::{Criticality, FlowOutcome, FlowResult, StepOutcome, StepResult};

/// Everything that happened in one `run` invocation
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub endpoint: String,
    pub passed: usize,
    pub failed: usize,
    pub flows: Vec<FlowReport>,
}

#[derive(Debug, Serialize)]
pub struct FlowReport {
    pub name: String,
    pub outcome: FlowOutcome,
    pub started_at: DateTime<Utc>,
    pub session_opened_at: Option<DateTime<Utc>>,
    pub session_closed_at: Option<DateTime<Utc>>,
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub name: String,
    pub action: &'static str,
    pub criticality: Criticality,
    pub outcome: StepOutcome,
    pub candidates: Vec<String>,
    pub matched_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<ElementState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
}

impl From<&StepResult> for StepReport {
    fn from(result: &StepResult) -> Self {
        Self {
            name: result.step.name.clone(),
            action: result.step.action.label(),
            criticality: result.step.criticality,
            outcome: result.outcome,
            candidates: result
                .step
                .queries()
                .into_iter()
                .map(str::to_string)
                .collect(),
            matched_query: result.matched_query().map(str::to_string),
            observed: result.observed.clone(),
            error: result.error.clone(),
            screenshot: result.artifact.clone(),
        }
    }
}

impl From<&FlowResult> for FlowReport {
    fn from(result: &FlowResult) -> Self {
        Self {
            name: result.flow_name.clone(),
            outcome: result.overall_outcome,
            started_at: result.started_at,
            session_opened_at: result.session_opened_at,
            session_closed_at: result.session_closed_at,
            app_id: result.app_id.clone(),
            error: result.error.clone(),
            steps: result.step_results.iter().map(StepReport::from).collect(),
        }
    }
}

impl RunReport {
    pub fn new(endpoint: impl Into<String>, results: &[FlowResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            generated_at: Utc::now(),
            endpoint: endpoint.into(),
            passed,
            failed: results.len() - passed,
            flows: results.iter().map(FlowReport::from).collect(),
        }
    }

    /// Write the report as pretty-printed JSON, creating parent directories
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            crate::common::paths::ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Report written to {}", path.display());
        Ok(())
    }
}

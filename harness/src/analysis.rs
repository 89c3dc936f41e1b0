//! Failure analysis over a test report

use crate::analyzer::ContextProvider;
use crate::runner::TestReport;
use model::AnalysisBackend;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ANALYSIS_UNAVAILABLE: &str = "LLM not available for analysis";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRecord {
    #[serde(rename = "test")]
    pub test_identifier: String,
    #[serde(rename = "error")]
    pub error_message: String,
    #[serde(rename = "analysis")]
    pub analysis_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureAnalysis {
    Records(Vec<AnalysisRecord>),
    /// No backend was configured.
    Unavailable,
}

impl FailureAnalysis {
    pub fn records(&self) -> &[AnalysisRecord] {
        match self {
            FailureAnalysis::Records(records) => records,
            FailureAnalysis::Unavailable => &[],
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, FailureAnalysis::Records(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            FailureAnalysis::Records(records) => json!(records),
            FailureAnalysis::Unavailable => json!({ "error": ANALYSIS_UNAVAILABLE }),
        }
    }

    pub fn render(&self) -> String {
        match self {
            FailureAnalysis::Unavailable => format!("Failure analysis: {}", ANALYSIS_UNAVAILABLE),
            FailureAnalysis::Records(records) if records.is_empty() => {
                "Failure analysis: no failed tests".to_string()
            }
            FailureAnalysis::Records(records) => {
                let mut out = format!("Failure analysis ({} failed):", records.len());
                for record in records {
                    out.push_str(&format!(
                        "\n  {}\n    Error: {}\n    Analysis: {}",
                        record.test_identifier, record.error_message, record.analysis_text
                    ));
                }
                out
            }
        }
    }
}

/// Ask `backend` about every failed test in `report`.
///
/// `path` names the code under test for the prompt; when absent the crash
/// location is used. A backend error for one test is written into that
/// test's record instead of aborting the rest.
pub async fn analyze_failures(
    report: &TestReport,
    backend: Option<&dyn AnalysisBackend>,
    context: Option<&dyn ContextProvider>,
    path: Option<&Path>,
) -> FailureAnalysis {
    let Some(backend) = backend else {
        warn!("{}", ANALYSIS_UNAVAILABLE);
        return FailureAnalysis::Unavailable;
    };

    let failed: Vec<_> = report.failed_tests().collect();
    if failed.is_empty() {
        debug!("No failed tests to analyze");
        return FailureAnalysis::Records(Vec::new());
    }

    info!(
        "Analyzing {} failed test(s) with the {} backend",
        failed.len(),
        backend.backend_name()
    );

    let mut records = Vec::with_capacity(failed.len());
    for test in failed {
        let error_message = test
            .crash_message
            .clone()
            .unwrap_or_else(|| "No crash message recorded".to_string());

        let crash_file = test.crash_path.as_deref().map(PathBuf::from);
        let code_context = match (context, crash_file.as_deref(), test.crash_line) {
            (Some(provider), Some(file), Some(line)) => provider.context(file, line),
            _ => None,
        };

        let file_label = path
            .or(crash_file.as_deref())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| test.nodeid.clone());

        let analysis_text = match backend
            .analyze_error(&file_label, &error_message, code_context.as_deref())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Analysis failed for {}: {}", test.nodeid, e);
                format!("Analysis failed: {}", e)
            }
        };

        records.push(AnalysisRecord {
            test_identifier: test.nodeid.clone(),
            error_message,
            analysis_text,
        });
    }

    FailureAnalysis::Records(records)
}

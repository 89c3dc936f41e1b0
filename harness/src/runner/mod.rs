//! Test orchestration
//!
//! [`TestOrchestrator`] runs pytest through a [`CommandRunner`], asks it to
//! write a machine-readable report into a private scratch directory, and reads
//! that report back. Every outcome, including "no report was written", comes
//! back as a value: failing tests are a normal result, not an error.
//!
//! The scratch directory lives as long as the orchestrator. Call
//! [`TestOrchestrator::dispose`] when done; dropping it without disposing
//! still removes the directory but swallows removal errors.

pub mod report;

use crate::config::RunnerConfig;
use crate::executor::{CommandRunner, ExecutionResult};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use report::{CoverageReport, CoverageTotals, Outcome, Summary, TestCase, TestReport};

const SCRATCH_PREFIX: &str = "debug-agent-";

/// Why a report file was not produced, read from pytest's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportMissingKind {
    /// Exit 1: tests ran but the report was not written.
    TestsRanNoReport,
    /// Exit 2: bad command line.
    UsageError,
    /// Exit 3: pytest crashed.
    InternalError,
    /// Exit 4: interrupted.
    Interrupted,
    Unknown(i32),
}

impl ReportMissingKind {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            1 => ReportMissingKind::TestsRanNoReport,
            2 => ReportMissingKind::UsageError,
            3 => ReportMissingKind::InternalError,
            4 => ReportMissingKind::Interrupted,
            other => ReportMissingKind::Unknown(other),
        }
    }
}

impl fmt::Display for ReportMissingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportMissingKind::TestsRanNoReport => f.write_str("tests ran, report not produced"),
            ReportMissingKind::UsageError => f.write_str("invocation usage error"),
            ReportMissingKind::InternalError => f.write_str("internal tool error"),
            ReportMissingKind::Interrupted => f.write_str("interrupted"),
            ReportMissingKind::Unknown(code) => write!(f, "unknown error with code {}", code),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum OrchestratorError {
    #[error("JSON report not found: {kind} (exit code {exit_code})")]
    ReportMissing {
        kind: ReportMissingKind,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to parse JSON report: {details} (exit code {exit_code})")]
    ReportParseFailure { details: String, exit_code: i32 },

    #[error("Test command could not be executed: {message}")]
    Execution { message: String },

    #[error("Unexpected error handling report: {details}")]
    Unexpected { details: String },
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoverageError {
    #[error("Coverage run failed: {message}")]
    Failed { message: String },
}

pub type CoverageResult<T> = Result<T, CoverageError>;

pub struct TestOrchestrator {
    runner: Arc<dyn CommandRunner>,
    config: RunnerConfig,
    scratch: TempDir,
}

impl TestOrchestrator {
    /// Create an orchestrator and its scratch directory.
    pub fn new(runner: Arc<dyn CommandRunner>, config: RunnerConfig) -> io::Result<Self> {
        let scratch = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
        debug!("Created scratch directory {}", scratch.path().display());
        Ok(Self {
            runner,
            config,
            scratch,
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Remove the scratch directory and everything left in it.
    pub fn dispose(self) -> io::Result<()> {
        let path = self.scratch.path().to_path_buf();
        self.scratch.close()?;
        debug!("Removed scratch directory {}", path.display());
        Ok(())
    }

    fn unique_report_path(&self, stem: &str) -> PathBuf {
        self.scratch
            .path()
            .join(format!("{}-{}.json", stem, Uuid::new_v4()))
    }

    fn pytest_command(&self, target: &str) -> Vec<String> {
        vec![
            self.runner.interpreter().to_string_lossy().into_owned(),
            "-m".to_string(),
            "pytest".to_string(),
            target.to_string(),
        ]
    }

    /// Run pytest on `target` and return its JSON report.
    pub async fn run_tests(
        &self,
        target: &str,
        cwd: Option<&Path>,
        extra_args: &[String],
    ) -> OrchestratorResult<TestReport> {
        let report_path = self.unique_report_path("report");

        let mut command = self.pytest_command(target);
        command.push("--json-report".to_string());
        command.push(format!("--json-report-file={}", report_path.display()));
        command.push("--disable-warnings".to_string());
        command.push("-qq".to_string());
        command.extend(self.config.extra_args.iter().cloned());
        command.extend(extra_args.iter().cloned());

        info!("Running pytest on target: '{}'", target);
        let execution = self.runner.run(&command, cwd).await.map_err(|e| {
            error!("Failed to run pytest: {}", e);
            OrchestratorError::Execution {
                message: e.to_string(),
            }
        })?;

        log_output("pytest", &execution);

        let text = match std::fs::read_to_string(&report_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let kind = ReportMissingKind::from_exit_code(execution.exit_code);
                warn!(
                    "Pytest JSON report not found ({}). Exit code {}: {}",
                    report_path.display(),
                    execution.exit_code,
                    kind
                );
                return Err(OrchestratorError::ReportMissing {
                    kind,
                    exit_code: execution.exit_code,
                    stdout: execution.stdout,
                    stderr: execution.stderr,
                });
            }
            Err(e) => {
                error!("Failed to read {}: {}", report_path.display(), e);
                return Err(OrchestratorError::Unexpected {
                    details: e.to_string(),
                });
            }
        };

        self.discard_report(&report_path);

        let report = TestReport::from_json(&text).map_err(|details| {
            error!("Failed to parse pytest JSON report: {}", details);
            OrchestratorError::ReportParseFailure {
                details,
                exit_code: execution.exit_code,
            }
        })?;

        info!(
            "Parsed test report: {} passed, {} failed of {}",
            report.summary().passed,
            report.summary().failed,
            report.summary().total
        );
        Ok(report)
    }

    /// Run pytest with pytest-cov and return the coverage.py JSON report.
    pub async fn run_with_coverage(
        &self,
        target: &str,
        cwd: Option<&Path>,
    ) -> CoverageResult<CoverageReport> {
        let report_path = self.unique_report_path("coverage");

        let mut command = self.pytest_command(target);
        command.push("--cov".to_string());
        command.push(format!("--cov-report=json:{}", report_path.display()));
        command.push("--disable-warnings".to_string());
        command.push("-qq".to_string());
        command.extend(self.config.extra_args.iter().cloned());

        info!("Running pytest with coverage on target: '{}'", target);
        let execution = self
            .runner
            .run(&command, cwd)
            .await
            .map_err(|e| coverage_failure(e.to_string()))?;

        log_output("pytest --cov", &execution);

        let text = std::fs::read_to_string(&report_path).map_err(|e| {
            coverage_failure(format!(
                "coverage report not readable ({}), exit code {}",
                e, execution.exit_code
            ))
        })?;

        self.discard_report(&report_path);

        CoverageReport::from_json(&text)
            .map_err(|e| coverage_failure(format!("invalid coverage report: {}", e)))
    }

    fn discard_report(&self, path: &Path) {
        if self.config.keep_reports {
            info!("Keeping report {}", path.display());
            return;
        }
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove report {}: {}", path.display(), e);
        }
    }
}

fn coverage_failure(message: String) -> CoverageError {
    error!("Coverage run failed: {}", message);
    CoverageError::Failed { message }
}

fn log_output(tool: &str, execution: &ExecutionResult) {
    if !execution.stdout.is_empty() {
        debug!("{} stdout:\n{}", tool, execution.stdout);
    }
    if !execution.stderr.is_empty() {
        debug!("{} stderr:\n{}", tool, execution.stderr);
    }
}

//! Task dispatcher
//!
//! [`Agent`] exposes the harness's actions to the CLI:
//!
//! 1. `debug_code` → static analysis → run the script → analyze a failure
//! 2. `run_tests` → pytest report → summary → optional failure analysis
//! 3. `run_coverage` → pytest-cov report → summary
//! 4. `suggest_tests` → read source → ask the backend
//!
//! Every action runs once; nothing is retried. Progress is printed for the
//! user, diagnostics go through `tracing`.

pub mod debugger;

use crate::analysis::{analyze_failures, FailureAnalysis};
use crate::analyzer::{AnalyzerError, CodeAnalyzer};
use crate::config::RunnerConfig;
use crate::executor::{CommandRunner, ExecutorError};
use crate::runner::{
    CoverageError, CoverageReport, OrchestratorError, TestOrchestrator, TestReport,
};
use model::AnalysisBackend;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use debugger::DebugOutcome;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Static analysis failed: {0}")]
    Analysis(#[from] AnalyzerError),

    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutorError),

    #[error("Scratch directory error: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("LLM not available for analysis")]
    AnalysisUnavailable,

    #[error("Test generation failed for {}: {message}", .path.display())]
    Generation { path: PathBuf, message: String },
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Options for a test run.
#[derive(Debug, Clone, Default)]
pub struct TestRunOptions {
    pub cwd: Option<PathBuf>,
    pub extra_args: Vec<String>,
    /// Send failed tests to the analysis backend.
    pub analyze: bool,
}

/// What `run_tests` produced.
#[derive(Debug, Clone)]
pub struct TestRunOutcome {
    pub result: Result<TestReport, OrchestratorError>,
    pub analysis: Option<FailureAnalysis>,
}

pub struct Agent {
    runner: Arc<dyn CommandRunner>,
    analyzer: CodeAnalyzer,
    backend: Option<Arc<dyn AnalysisBackend>>,
    runner_config: RunnerConfig,
}

impl Agent {
    pub fn new(runner: Arc<dyn CommandRunner>, runner_config: RunnerConfig) -> Self {
        Self {
            runner,
            analyzer: CodeAnalyzer::new(),
            backend: None,
            runner_config,
        }
    }

    pub fn with_backend(mut self, backend: Option<Arc<dyn AnalysisBackend>>) -> Self {
        if let Some(backend) = &backend {
            info!("Agent using {} analysis backend", backend.backend_name());
        }
        self.backend = backend;
        self
    }

    pub fn with_analyzer(mut self, analyzer: CodeAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn backend(&self) -> Option<&dyn AnalysisBackend> {
        self.backend.as_deref()
    }

    /// Default action when no task was requested.
    pub fn run(&self) {
        println!("No specific task provided via arguments.");
        println!("Agent is running... Waiting for tasks.");
    }

    pub async fn debug_code(&self, file_path: &Path) -> AgentResult<DebugOutcome> {
        println!("\n--- Agent Task: Debug Code ---");
        println!("File to debug: {}", file_path.display());
        let outcome = debugger::debug_file(
            self.runner.as_ref(),
            &self.analyzer,
            self.backend(),
            file_path,
        )
        .await;
        println!("------------------------------\n");
        outcome
    }

    pub async fn run_tests(
        &self,
        target: &str,
        options: &TestRunOptions,
    ) -> AgentResult<TestRunOutcome> {
        println!("\n--- Agent Task: Run Tests ---");
        println!("Target for tests: {}", target);

        let orchestrator = TestOrchestrator::new(self.runner.clone(), self.runner_config.clone())
            .map_err(AgentError::Scratch)?;
        let result = orchestrator
            .run_tests(target, options.cwd.as_deref(), &options.extra_args)
            .await;
        release(orchestrator);

        match &result {
            Ok(report) => println!("{}", report.summary().render()),
            Err(e) => println!("{}", render_orchestrator_error(e)),
        }

        let analysis = match (&result, options.analyze) {
            (Ok(report), true) => {
                let analysis =
                    analyze_failures(report, self.backend(), Some(&self.analyzer), None).await;
                println!("{}", analysis.render());
                Some(analysis)
            }
            _ => None,
        };

        println!("---------------------------\n");
        Ok(TestRunOutcome { result, analysis })
    }

    pub async fn run_coverage(
        &self,
        target: &str,
        cwd: Option<&Path>,
    ) -> AgentResult<Result<CoverageReport, CoverageError>> {
        println!("\n--- Agent Task: Coverage ---");
        println!("Target for coverage: {}", target);

        let orchestrator = TestOrchestrator::new(self.runner.clone(), self.runner_config.clone())
            .map_err(AgentError::Scratch)?;
        let result = orchestrator.run_with_coverage(target, cwd).await;
        release(orchestrator);

        match &result {
            Ok(report) => println!("{}", report.render()),
            Err(e) => println!("  {}", e),
        }
        println!("----------------------------\n");
        Ok(result)
    }

    pub async fn suggest_tests(&self, file_path: &Path) -> AgentResult<String> {
        println!("\n--- Agent Task: Suggest Tests ---");
        println!("File: {}", file_path.display());

        let code = std::fs::read_to_string(file_path).map_err(|e| AgentError::Generation {
            path: file_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let Some(backend) = self.backend() else {
            warn!("Test suggestion requested without an analysis backend");
            return Err(AgentError::AnalysisUnavailable);
        };

        let suggestion = backend
            .suggest_tests(&file_path.display().to_string(), Some(&code))
            .await
            .map_err(|e| AgentError::Generation {
                path: file_path.to_path_buf(),
                message: e.to_string(),
            })?;

        println!("{}", suggestion);
        println!("---------------------------------\n");
        Ok(suggestion)
    }
}

/// Dispose of a finished orchestrator. The run's result is already in hand,
/// so a removal failure is only logged.
fn release(orchestrator: TestOrchestrator) {
    let scratch = orchestrator.scratch_dir().to_path_buf();
    if let Err(e) = orchestrator.dispose() {
        warn!(
            "Failed to remove scratch directory {}: {}",
            scratch.display(),
            e
        );
    }
}

/// Text shown when pytest produced no usable report.
pub fn render_orchestrator_error(error: &OrchestratorError) -> String {
    let mut out = format!("  Error running tests: {}", error);
    if let OrchestratorError::ReportMissing { stdout, stderr, .. } = error {
        if !stdout.trim().is_empty() {
            out.push_str(&format!("\n  Pytest stdout:\n{}", stdout.trim_end()));
        }
        if !stderr.trim().is_empty() {
            out.push_str(&format!("\n  Pytest stderr:\n{}", stderr.trim_end()));
        }
    }
    out
}

pub mod agent;
pub mod analysis;
pub mod analyzer;
pub mod config;
pub mod executor;
pub mod runner;

pub use agent::{Agent, AgentError, AgentResult, DebugOutcome, TestRunOptions, TestRunOutcome};
pub use analysis::{analyze_failures, AnalysisRecord, FailureAnalysis, ANALYSIS_UNAVAILABLE};
pub use analyzer::{
    traceback_line, AnalyzerError, AnalyzerResult, CodeAnalyzer, ContextProvider, SourceSummary,
    SyntaxTree,
};
pub use config::{load_env_file, ConfigError, ConfigResult, HarnessConfig, RunnerConfig};
pub use executor::{CommandRunner, ExecutionResult, Executor, ExecutorError, ExecutorResult};
pub use runner::{
    CoverageError, CoverageReport, OrchestratorError, OrchestratorResult, Outcome,
    ReportMissingKind, Summary, TestCase, TestOrchestrator, TestReport,
};

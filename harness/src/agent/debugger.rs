//! Debug flow for a single Python file

use super::{AgentError, AgentResult};
use crate::analyzer::{traceback_line, AnalyzerError, CodeAnalyzer, SourceSummary};
use crate::executor::{CommandRunner, ExecutionResult};
use model::AnalysisBackend;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutcome {
    /// Static analysis rejected the file; nothing was executed.
    Stopped { reason: String },
    /// The file ran.
    Executed {
        summary: SourceSummary,
        result: ExecutionResult,
        /// Backend output for a failed run, when a backend is configured.
        analysis: Option<String>,
    },
}

impl DebugOutcome {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            DebugOutcome::Executed { result, .. } => Some(result.exit_code),
            DebugOutcome::Stopped { .. } => None,
        }
    }
}

pub(super) async fn debug_file(
    runner: &dyn CommandRunner,
    analyzer: &CodeAnalyzer,
    backend: Option<&dyn AnalysisBackend>,
    file_path: &Path,
) -> AgentResult<DebugOutcome> {
    println!("Attempting to debug {}...", file_path.display());

    let tree = match analyzer.analyze_file(file_path) {
        Ok(tree) => tree,
        Err(e @ (AnalyzerError::FileNotFound { .. } | AnalyzerError::SyntaxError { .. })) => {
            println!("Debugging stopped due to initial analysis error: {}", e);
            return Ok(DebugOutcome::Stopped {
                reason: e.to_string(),
            });
        }
        Err(e) => return Err(AgentError::Analysis(e)),
    };

    println!(
        "Static analysis passed for {} ({} functions, {} classes, {} lines).",
        file_path.display(),
        tree.summary.functions.len(),
        tree.summary.classes.len(),
        tree.summary.line_count
    );

    let result = runner.run_script(file_path, &[], None).await?;
    print_execution(&result);

    if result.success() {
        println!(
            "{} executed successfully (exit code 0).",
            file_path.display()
        );
        return Ok(DebugOutcome::Executed {
            summary: tree.summary,
            result,
            analysis: None,
        });
    }

    println!("Execution failed. Analyzing error...");
    let analysis = match backend {
        Some(backend) => {
            let code_context = traceback_line(&result.stderr, file_path)
                .and_then(|line| analyzer.snippet(&tree.source, line));
            info!(
                "Requesting error analysis for {} (context: {})",
                file_path.display(),
                code_context.is_some()
            );

            match backend
                .analyze_error(
                    &file_path.display().to_string(),
                    &result.stderr,
                    code_context.as_deref(),
                )
                .await
            {
                Ok(text) => {
                    println!("Analysis:\n{}", text);
                    Some(text)
                }
                Err(e) => {
                    warn!("Error analysis failed: {}", e);
                    println!("Error analysis failed: {}", e);
                    None
                }
            }
        }
        None => {
            println!("No analysis backend configured; skipping error analysis.");
            None
        }
    };

    Ok(DebugOutcome::Executed {
        summary: tree.summary,
        result,
        analysis,
    })
}

fn print_execution(result: &ExecutionResult) {
    println!("--- Execution Output ---");
    if !result.stdout.is_empty() {
        println!("Stdout:");
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        println!("Stderr:");
        println!("{}", result.stderr);
    }
    println!("Exit Code: {}", result.exit_code);
    println!("------------------------");
}

//! Test doubles shared by the harness integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use harness::{CommandRunner, ExecutionResult, ExecutorError, ExecutorResult};
use model::{AnalysisBackend, AnalysisError, AnalysisResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What the fake tool does with the report path it is given.
#[derive(Clone)]
pub enum ReportBehavior {
    /// Write this text to the requested report path.
    Write(String),
    /// Leave the report path untouched.
    Skip,
    /// Fail before running, as if the interpreter were missing.
    CommandNotFound,
    /// Delete the directory the report was supposed to land in.
    RemoveScratchDir,
}

/// Pretends to be `python -m pytest`: writes a canned report to whichever
/// path the command line asks for and exits with a fixed code.
pub struct FakePytest {
    pub behavior: ReportBehavior,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub commands: Mutex<Vec<Vec<String>>>,
    pub report_paths: Mutex<Vec<PathBuf>>,
}

impl FakePytest {
    pub fn new(behavior: ReportBehavior, exit_code: i32) -> Self {
        Self {
            behavior,
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            commands: Mutex::new(Vec::new()),
            report_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn with_output(mut self, stdout: &str, stderr: &str) -> Self {
        self.stdout = stdout.to_string();
        self.stderr = stderr.to_string();
        self
    }

    pub fn last_command(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    pub fn report_paths(&self) -> Vec<PathBuf> {
        self.report_paths.lock().unwrap().clone()
    }
}

fn requested_report_path(command: &[String]) -> Option<PathBuf> {
    command.iter().find_map(|arg| {
        arg.strip_prefix("--json-report-file=")
            .or_else(|| arg.strip_prefix("--cov-report=json:"))
            .map(PathBuf::from)
    })
}

#[async_trait]
impl CommandRunner for FakePytest {
    async fn run(
        &self,
        command: &[String],
        _cwd: Option<&Path>,
    ) -> ExecutorResult<ExecutionResult> {
        self.commands.lock().unwrap().push(command.to_vec());

        if let ReportBehavior::CommandNotFound = self.behavior {
            return Err(ExecutorError::CommandNotFound {
                program: command.first().cloned().unwrap_or_default(),
            });
        }

        if let Some(path) = requested_report_path(command) {
            self.report_paths.lock().unwrap().push(path.clone());
            match &self.behavior {
                ReportBehavior::Write(text) => {
                    std::fs::write(&path, text).map_err(|source| ExecutorError::ExecutionFailure {
                        command: command.join(" "),
                        source,
                    })?;
                }
                ReportBehavior::RemoveScratchDir => {
                    if let Some(dir) = path.parent() {
                        let _ = std::fs::remove_dir_all(dir);
                    }
                }
                _ => {}
            }
        }

        Ok(ExecutionResult {
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        })
    }

    fn interpreter(&self) -> &Path {
        Path::new("python3")
    }
}

/// Runs scripts by returning a canned result.
pub struct FakeInterpreter {
    pub result: ExecutionResult,
    pub calls: AtomicUsize,
}

impl FakeInterpreter {
    pub fn new(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            result: ExecutionResult {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for FakeInterpreter {
    async fn run(
        &self,
        _command: &[String],
        _cwd: Option<&Path>,
    ) -> ExecutorResult<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }

    fn interpreter(&self) -> &Path {
        Path::new("python3")
    }
}

/// A runner whose program never exists.
pub struct MissingInterpreter;

#[async_trait]
impl CommandRunner for MissingInterpreter {
    async fn run(
        &self,
        command: &[String],
        _cwd: Option<&Path>,
    ) -> ExecutorResult<ExecutionResult> {
        Err(ExecutorError::CommandNotFound {
            program: command.first().cloned().unwrap_or_default(),
        })
    }

    fn interpreter(&self) -> &Path {
        Path::new("python-missing")
    }
}

/// Records every request and answers with a fixed string.
pub struct RecordingBackend {
    pub answer: String,
    pub fail: bool,
    pub requests: Mutex<Vec<(String, String, Option<String>)>>,
}

impl RecordingBackend {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisBackend for RecordingBackend {
    async fn analyze_error(
        &self,
        file_path: &str,
        error_output: &str,
        code_context: Option<&str>,
    ) -> AnalysisResult<String> {
        self.requests.lock().unwrap().push((
            file_path.to_string(),
            error_output.to_string(),
            code_context.map(str::to_string),
        ));
        if self.fail {
            return Err(AnalysisError::ServiceUnavailable {
                message: "backend offline".to_string(),
            });
        }
        Ok(self.answer.clone())
    }

    async fn suggest_tests(
        &self,
        file_path: &str,
        code_content: Option<&str>,
    ) -> AnalysisResult<String> {
        self.requests.lock().unwrap().push((
            file_path.to_string(),
            String::new(),
            code_content.map(str::to_string),
        ));
        if self.fail {
            return Err(AnalysisError::Generation {
                message: "backend offline".to_string(),
            });
        }
        Ok(self.answer.clone())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

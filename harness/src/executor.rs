//! External process execution
//!
//! Every subprocess the harness starts goes through a [`CommandRunner`]. A
//! non-zero exit code is reported as data in [`ExecutionResult`]; only faults
//! that prevent the process from running at all become errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// Exit code recorded when the process was terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Command not found: {program}")]
    CommandNotFound { program: String },

    #[error("Failed to execute '{command}': {source}")]
    ExecutionFailure {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Command '{command}' timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Outcome of one finished process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` (program followed by its arguments) to completion.
    async fn run(&self, command: &[String], cwd: Option<&Path>) -> ExecutorResult<ExecutionResult>;

    /// Interpreter used for scripts and `-m` module invocations.
    fn interpreter(&self) -> &Path;

    /// Run a script through [`CommandRunner::interpreter`].
    async fn run_script(
        &self,
        script: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> ExecutorResult<ExecutionResult> {
        let mut command = vec![
            self.interpreter().to_string_lossy().into_owned(),
            script.to_string_lossy().into_owned(),
        ];
        command.extend(args.iter().cloned());
        self.run(&command, cwd).await
    }
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone)]
pub struct Executor {
    interpreter: PathBuf,
    timeout: Option<Duration>,
}

impl Executor {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new("python3")
    }
}

#[async_trait]
impl CommandRunner for Executor {
    async fn run(&self, command: &[String], cwd: Option<&Path>) -> ExecutorResult<ExecutionResult> {
        let command_line = command.join(" ");

        let Some((program, args)) = command.split_first() else {
            return Err(ExecutorError::ExecutionFailure {
                command: command_line,
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        // A missing working directory would otherwise surface as NotFound
        // from spawn and be mistaken for a missing program.
        if let Some(dir) = cwd {
            if !dir.is_dir() {
                return Err(ExecutorError::ExecutionFailure {
                    command: command_line,
                    source: io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("working directory {} does not exist", dir.display()),
                    ),
                });
            }
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!("Running command: {}", command_line);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                error!("Command not found: {}", program);
                ExecutorError::CommandNotFound {
                    program: program.clone(),
                }
            } else {
                error!("Failed to spawn '{}': {}", command_line, e);
                ExecutorError::ExecutionFailure {
                    command: command_line.clone(),
                    source: e,
                }
            }
        })?;

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!("Command '{}' exceeded {:?}, killed", command_line, limit);
                    return Err(ExecutorError::Timeout {
                        command: command_line,
                        timeout: limit,
                    });
                }
            },
            None => child.wait_with_output().await,
        };

        let output = waited.map_err(|e| ExecutorError::ExecutionFailure {
            command: command_line.clone(),
            source: e,
        })?;

        let result = ExecutionResult {
            exit_code: output.status.code().unwrap_or(SIGNAL_EXIT_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            "Command '{}' exited with {}",
            command_line, result.exit_code
        );
        Ok(result)
    }

    fn interpreter(&self) -> &Path {
        &self.interpreter
    }
}

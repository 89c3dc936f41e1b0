//! Harness configuration
//!
//! Built once at the process boundary (TOML file, then environment and
//! command-line overrides) and passed into constructors. The environment may
//! be seeded from a `.env` file first. Nothing below `main` reads the
//! environment.

use model::{BackendKind, LlmConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PROCESS_TIMEOUT_SECS: u64 = 300;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL_NAME: &str = "LLM_MODEL_NAME";
pub const ENV_BACKEND: &str = "LLM_BACKEND";
pub const ENV_OLLAMA_URL: &str = "OLLAMA_BASE_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to load env file {}: {source}", .path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interpreter for scripts and `python -m pytest`.
    pub python: PathBuf,
    /// `None` or `0` disables the limit.
    pub timeout_secs: Option<u64>,
    /// Leave report files in the scratch directory after reading them.
    pub keep_reports: bool,
    /// Appended to every pytest invocation.
    pub extra_args: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            timeout_secs: Some(DEFAULT_PROCESS_TIMEOUT_SECS),
            keep_reports: false,
            extra_args: Vec::new(),
        }
    }
}

impl RunnerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub runner: RunnerConfig,
    pub llm: LlmConfig,
}

impl HarnessConfig {
    /// Load from a TOML file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply the LLM settings found in the environment.
    pub fn apply_env(mut self) -> ConfigResult<Self> {
        self.llm = apply_llm_env(self.llm, |key| std::env::var(key).ok())?;
        Ok(self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.runner.python.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                message: "Python interpreter cannot be empty".to_string(),
            });
        }

        self.llm
            .validate()
            .map_err(|message| ConfigError::Invalid { message })
    }
}

/// Load `KEY=value` pairs from an env file into the process environment.
///
/// With no path, `.env` is searched for from the current directory upward and
/// its absence is not an error. Variables already set are never overwritten.
pub fn load_env_file(path: Option<&Path>) -> ConfigResult<Option<PathBuf>> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|source| ConfigError::EnvFile {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.not_found() => Ok(None),
            Err(source) => Err(ConfigError::EnvFile {
                path: PathBuf::from(".env"),
                source,
            }),
        },
    }
}

fn apply_llm_env(
    mut llm: LlmConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigResult<LlmConfig> {
    if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
        llm.api_key = Some(key);
    }
    if let Some(name) = lookup(ENV_MODEL_NAME).filter(|v| !v.is_empty()) {
        llm.model_name = name;
    }
    if let Some(backend) = lookup(ENV_BACKEND).filter(|v| !v.is_empty()) {
        llm.backend = backend
            .parse::<BackendKind>()
            .map_err(|message| ConfigError::Invalid { message })?;
    }
    if let Some(url) = lookup(ENV_OLLAMA_URL).filter(|v| !v.is_empty()) {
        llm.base_url = url;
    }
    Ok(llm)
}

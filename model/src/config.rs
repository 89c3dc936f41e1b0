use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Which analysis backend the harness should talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// No backend; analysis requests report "unavailable".
    None,
    /// Canned responses, no network.
    #[default]
    Placeholder,
    /// A local Ollama server.
    Ollama,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::None => "none",
            BackendKind::Placeholder => "placeholder",
            BackendKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(BackendKind::None),
            "placeholder" | "stub" => Ok(BackendKind::Placeholder),
            "ollama" => Ok(BackendKind::Ollama),
            other => Err(format!(
                "unknown backend '{}', expected one of: none, placeholder, ollama",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: BackendKind,
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model_name: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            api_key: None,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: 120,
            temperature: 0.2,
        }
    }
}

impl LlmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model_name.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }

        if self.backend == BackendKind::Ollama {
            if self.base_url.is_empty() {
                return Err("Base URL cannot be empty".to_string());
            }

            if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
                return Err("Base URL must start with http:// or https://".to_string());
            }
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 2.0".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

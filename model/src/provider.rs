use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Test generation failed: {message}")]
    Generation { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// The seam where a language model plugs in.
///
/// Callers only ever see text in and text out, so swapping the placeholder for
/// a real model does not change any call site.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Explain a failure given the captured error output and, optionally, the
    /// source lines around the failure.
    async fn analyze_error(
        &self,
        file_path: &str,
        error_output: &str,
        code_context: Option<&str>,
    ) -> AnalysisResult<String>;

    /// Propose unit tests for a source file.
    async fn suggest_tests(
        &self,
        file_path: &str,
        code_content: Option<&str>,
    ) -> AnalysisResult<String>;

    fn backend_name(&self) -> &'static str;
}

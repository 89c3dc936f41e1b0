use crate::config::LlmConfig;
use crate::prompts::{preview, ErrorAnalysisPrompt, TestSuggestionPrompt};
use crate::provider::{AnalysisBackend, AnalysisResult};
use async_trait::async_trait;
use tracing::{info, warn};

pub const PLACEHOLDER_ANALYSIS: &str =
    "Placeholder LLM analysis: Check the error message and stack trace.";
pub const PLACEHOLDER_SUGGESTION: &str =
    "# Placeholder LLM suggestion: Add tests for edge cases and common inputs.";

/// Backend that never leaves the process.
///
/// It renders the request it would have sent and answers with fixed text, so
/// the rest of the harness can be exercised without a model.
pub struct PlaceholderBackend {
    model_name: String,
}

impl PlaceholderBackend {
    pub fn new(config: &LlmConfig) -> Self {
        if !config.has_api_key() {
            warn!("LLM API key not provided. Functionality will be limited.");
        }
        info!("LLM interface initialized for model: {}", config.model_name);

        Self {
            model_name: config.model_name.clone(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl Default for PlaceholderBackend {
    fn default() -> Self {
        Self {
            model_name: crate::config::DEFAULT_MODEL_NAME.to_string(),
        }
    }
}

#[async_trait]
impl AnalysisBackend for PlaceholderBackend {
    async fn analyze_error(
        &self,
        file_path: &str,
        error_output: &str,
        code_context: Option<&str>,
    ) -> AnalysisResult<String> {
        let prompt = ErrorAnalysisPrompt::build(file_path, error_output, code_context);
        info!(
            model = %self.model_name,
            "LLM analysis request (not sent, placeholder backend):\n{}",
            prompt
        );
        Ok(PLACEHOLDER_ANALYSIS.to_string())
    }

    async fn suggest_tests(
        &self,
        file_path: &str,
        code_content: Option<&str>,
    ) -> AnalysisResult<String> {
        let prompt = TestSuggestionPrompt::build(file_path, code_content.map(preview).as_deref());
        info!(
            model = %self.model_name,
            "LLM test generation request (not sent, placeholder backend):\n{}",
            prompt
        );
        Ok(PLACEHOLDER_SUGGESTION.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "placeholder"
    }
}

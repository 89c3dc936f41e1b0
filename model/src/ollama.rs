use crate::config::LlmConfig;
use crate::prompts::{ErrorAnalysisPrompt, TestSuggestionPrompt, SYSTEM_PROMPT};
use crate::provider::{AnalysisBackend, AnalysisError, AnalysisResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Serialize)]
struct OllamaApiRequest {
    model: String,
    messages: Vec<OllamaApiMessage>,
    stream: bool,
    options: OllamaApiOptions,
}

#[derive(Serialize)]
struct OllamaApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct OllamaApiOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaApiResponse {
    message: OllamaApiResponseMessage,
}

#[derive(Deserialize)]
struct OllamaApiResponseMessage {
    content: String,
}

/// Analysis backend that talks to an Ollama server's `/api/chat` endpoint.
///
/// One request per call, no streaming and no retry.
pub struct OllamaBackend {
    http_client: reqwest::Client,
    base_url: String,
    model_name: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn new(config: &LlmConfig) -> AnalysisResult<Self> {
        config
            .validate()
            .map_err(|message| AnalysisError::InvalidConfig { message })?;

        let base_url = if config.base_url.ends_with('/') {
            config.base_url.clone()
        } else {
            format!("{}/", config.base_url)
        };

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AnalysisError::InvalidConfig {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        info!(
            "Ollama analysis backend initialized for model {} at {}",
            config.model_name, base_url
        );

        Ok(Self {
            http_client,
            base_url,
            model_name: config.model_name.clone(),
            temperature: config.temperature,
        })
    }

    fn build_request_body(&self, prompt: String) -> OllamaApiRequest {
        OllamaApiRequest {
            model: self.model_name.clone(),
            messages: vec![
                OllamaApiMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                OllamaApiMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
            options: OllamaApiOptions {
                temperature: self.temperature,
            },
        }
    }

    async fn complete(&self, prompt: String) -> AnalysisResult<String> {
        let url = format!("{}api/chat", self.base_url);
        let body = self.build_request_body(prompt);
        let started = Instant::now();

        debug!("Sending analysis request to {}", url);

        let http_response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::ServiceUnavailable {
                        message: "Request timeout".to_string(),
                    }
                } else if e.is_connect() {
                    AnalysisError::ServiceUnavailable {
                        message: format!("Cannot connect to Ollama service at {}", self.base_url),
                    }
                } else {
                    AnalysisError::Network(e)
                }
            })?;

        let status = http_response.status();
        if !status.is_success() {
            let error_text = http_response.text().await.unwrap_or_default();
            error!("Ollama API returned {}: {}", status, error_text);
            return Err(AnalysisError::ServiceUnavailable {
                message: format!("Ollama API returned {}: {}", status, error_text),
            });
        }

        let raw = http_response.text().await?;
        let response: OllamaApiResponse = serde_json::from_str(&raw)?;

        debug!(
            "Analysis response received in {:?} ({} chars)",
            started.elapsed(),
            response.message.content.len()
        );

        Ok(response.message.content)
    }
}

#[async_trait]
impl AnalysisBackend for OllamaBackend {
    async fn analyze_error(
        &self,
        file_path: &str,
        error_output: &str,
        code_context: Option<&str>,
    ) -> AnalysisResult<String> {
        self.complete(ErrorAnalysisPrompt::build(
            file_path,
            error_output,
            code_context,
        ))
        .await
    }

    async fn suggest_tests(
        &self,
        file_path: &str,
        code_content: Option<&str>,
    ) -> AnalysisResult<String> {
        self.complete(TestSuggestionPrompt::build(file_path, code_content))
            .await
            .map_err(|e| AnalysisError::Generation {
                message: e.to_string(),
            })
    }

    fn backend_name(&self) -> &'static str {
        "ollama"
    }
}

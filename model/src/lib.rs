pub mod config;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod placeholder;
pub mod prompts;
pub mod provider;

use std::sync::Arc;

pub use config::{BackendKind, LlmConfig};
pub use placeholder::{PlaceholderBackend, PLACEHOLDER_ANALYSIS, PLACEHOLDER_SUGGESTION};
pub use provider::{AnalysisBackend, AnalysisError, AnalysisResult};

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

/// Build the backend selected by `config`.
///
/// `BackendKind::None` yields `Ok(None)`: callers treat an absent backend as
/// "analysis unavailable" rather than an error.
pub fn create_backend(config: &LlmConfig) -> AnalysisResult<Option<Arc<dyn AnalysisBackend>>> {
    match config.backend {
        BackendKind::None => Ok(None),
        BackendKind::Placeholder => Ok(Some(Arc::new(PlaceholderBackend::new(config)))),
        #[cfg(feature = "ollama")]
        BackendKind::Ollama => Ok(Some(Arc::new(OllamaBackend::new(config)?))),
        #[cfg(not(feature = "ollama"))]
        BackendKind::Ollama => Err(AnalysisError::InvalidConfig {
            message: "built without the 'ollama' feature".to_string(),
        }),
    }
}

pub mod prelude {
    pub use crate::config::*;
    pub use crate::placeholder::*;
    pub use crate::provider::*;

    #[cfg(feature = "ollama")]
    pub use crate::ollama::*;
}

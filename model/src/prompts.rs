//! Prompt templates for the analysis backends
//!
//! Both backends render the same text: the placeholder logs it for human
//! inspection, the Ollama backend sends it as the user message.

/// Characters of source shown when previewing a file in logs.
pub const PREVIEW_CHARS: usize = 200;

pub const SYSTEM_PROMPT: &str =
    "You are a Python debugging assistant. Be concise and concrete.";

/// Prompt asking the model to explain a failure.
///
/// # Example
/// ```
/// use model::prompts::ErrorAnalysisPrompt;
///
/// let prompt = ErrorAnalysisPrompt::build("app.py", "ZeroDivisionError", Some("1 / 0"));
/// assert!(prompt.contains("FILE: app.py"));
/// assert!(prompt.contains("1 / 0"));
/// ```
pub struct ErrorAnalysisPrompt;

impl ErrorAnalysisPrompt {
    pub fn build(file_path: &str, error_output: &str, code_context: Option<&str>) -> String {
        let mut prompt = format!(
            "A Python program failed.\n\
             FILE: {}\n\
             ERROR OUTPUT:\n{}\n",
            file_path,
            error_output.trim_end()
        );

        if let Some(context) = code_context {
            prompt.push_str(&format!("CODE CONTEXT:\n{}\n", context.trim_end()));
        }

        prompt.push_str("\nExplain the root cause in 1-3 sentences and suggest a fix.");
        prompt
    }
}

/// Prompt asking the model for pytest test cases.
pub struct TestSuggestionPrompt;

impl TestSuggestionPrompt {
    pub fn build(file_path: &str, code_content: Option<&str>) -> String {
        let mut prompt = format!("Write pytest unit tests for the module at {}.\n", file_path);

        match code_content {
            Some(code) => prompt.push_str(&format!("SOURCE:\n{}\n", code.trim_end())),
            None => prompt.push_str("The source was not provided; infer from the path.\n"),
        }

        prompt.push_str("\nCover edge cases and common inputs. Reply with Python code only.");
        prompt
    }
}

/// First [`PREVIEW_CHARS`] characters of `code`, with an ellipsis when cut.
pub fn preview(code: &str) -> String {
    match code.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &code[..cut]),
        None => code.to_string(),
    }
}

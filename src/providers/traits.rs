use async_trait::async_trait;

/// Output format hint passed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    /// Ask for a bare JSON document. Best effort: callers must still
    /// validate what comes back.
    Json,
}

/// A single, non-streaming completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f64,
    pub format: ResponseFormat,
}

impl CompletionRequest {
    /// Deterministic (zero-temperature) request expecting JSON output.
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.0,
            format: ResponseFormat::Json,
        }
    }
}

/// An LLM backend that turns a prompt into text.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Run one completion. Exactly one outbound call; no retries.
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String>;
}

//! LLM-backed classification of free text into a note or a checklist.
//!
//! The model is asked for `{"title", "type", "content"}` JSON, but its
//! output is treated as untrusted: anything that does not parse into that
//! shape becomes [`ClassificationError::MalformedOutput`].

pub mod prompt;

use serde::Serialize;
use std::sync::Arc;

use crate::config::schema::DEFAULT_TITLE;
use crate::providers::{CompletionRequest, Provider};

/// What the model thinks the text should become.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaptureKind {
    Note,
    List,
}

/// Content exactly as the model shaped it. Not yet reconciled with `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Items(Vec<String>),
}

/// Validated model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    /// Never empty.
    pub title: String,
    pub kind: CaptureKind,
    pub content: Content,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    /// The model answered, but not with the JSON object we asked for.
    #[error("model returned malformed output: {0}")]
    MalformedOutput(String),
    /// The completion call itself failed.
    #[error("completion request failed: {0}")]
    Provider(String),
}

/// Turns one piece of text into a [`ClassificationResult`] with one LLM call.
pub struct TextClassifier {
    provider: Arc<dyn Provider>,
    default_title: String,
}

impl TextClassifier {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::with_default_title(provider, DEFAULT_TITLE)
    }

    pub fn with_default_title(provider: Arc<dyn Provider>, default_title: impl Into<String>) -> Self {
        Self {
            provider,
            default_title: default_title.into(),
        }
    }

    /// Classify `text`. Callers reject empty input before getting here.
    ///
    /// One provider call per invocation; no caching, no retry.
    pub async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassificationError> {
        let request = CompletionRequest::json(prompt::build_prompt(text));

        let raw = self.provider.complete(&request).await.map_err(|e| {
            tracing::error!(provider = self.provider.name(), "Classification call failed: {e}");
            ClassificationError::Provider(e.to_string())
        })?;

        let result = parse_response(&raw, &self.default_title);
        match &result {
            Ok(parsed) => tracing::debug!(
                title = %parsed.title,
                kind = ?parsed.kind,
                "Classified capture"
            ),
            Err(e) => tracing::warn!("Rejected model output: {e}"),
        }
        result
    }
}

/// Parse and validate raw model output.
pub fn parse_response(
    raw: &str,
    default_title: &str,
) -> Result<ClassificationResult, ClassificationError> {
    let body = strip_code_fence(raw.trim());

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ClassificationError::MalformedOutput(format!("not valid JSON: {e}")))?;

    let Some(object) = value.as_object() else {
        return Err(ClassificationError::MalformedOutput(
            "top-level value is not an object".into(),
        ));
    };

    let title = object
        .get("title")
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(default_title)
        .to_string();

    let kind = match object.get("type").and_then(|t| t.as_str()) {
        Some(t) if t.trim().eq_ignore_ascii_case("LIST") => CaptureKind::List,
        Some(t) if t.trim().eq_ignore_ascii_case("NOTE") => CaptureKind::Note,
        Some(other) => {
            tracing::debug!("Unknown capture type '{other}', treating as NOTE");
            CaptureKind::Note
        }
        None => CaptureKind::Note,
    };

    let content = match object.get("content") {
        Some(serde_json::Value::String(s)) => Content::Text(s.clone()),
        Some(serde_json::Value::Array(items)) => Content::Items(
            items
                .iter()
                .map(item_text)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(serde_json::Value::Null) | None => {
            return Err(ClassificationError::MalformedOutput(
                "missing \"content\"".into(),
            ))
        }
        Some(other) => {
            return Err(ClassificationError::MalformedOutput(format!(
                "\"content\" must be a string or an array, got {}",
                json_type_name(other)
            )))
        }
    };

    Ok(ClassificationResult {
        title,
        kind,
        content,
    })
}

fn item_text(value: &serde_json::Value) -> Result<String, ClassificationError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(ClassificationError::MalformedOutput(format!(
            "list item must be text, got {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Remove a surrounding ```` ```json ... ``` ```` fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening line.
    match inner.find('\n') {
        Some(pos) => inner[pos + 1..].trim(),
        None => inner.trim(),
    }
}

//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::traits::{CompletionRequest, Provider, ResponseFormat};
use crate::config::LlmConfig;

/// Gemini REST request body (non-streaming).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini text provider.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Build from `LlmConfig`. Fails when no API key is configured.
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            anyhow::bail!("GEMINI_API_KEY is not set");
        };
        Ok(Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_body<'a>(request: &'a CompletionRequest) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: match request.format {
                    ResponseFormat::Json => Some("application/json"),
                    ResponseFormat::Text => None,
                },
            },
        }
    }

    fn extract_text(response: GenerateContentResponse) -> anyhow::Result<String> {
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            anyhow::bail!("Gemini returned no candidate text");
        }
        Ok(text)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        let body = Self::build_body(request);

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_body = resp.text().await.unwrap_or_default();
            tracing::error!("Gemini request failed: {status}: {error_body}");
            anyhow::bail!("Gemini API error: {status}");
        }

        let parsed: GenerateContentResponse = resp.json().await?;
        Self::extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new(
            "test-key".into(),
            "gemini-2.0-flash".into(),
            server.uri(),
            Duration::from_secs(5),
        )
    }

    fn candidate_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn request_body_asks_for_json_at_zero_temperature() {
        let request = CompletionRequest::json("hola");
        let body = serde_json::to_value(GeminiProvider::build_body(&request)).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hola");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn text_format_omits_mime_type() {
        let request = CompletionRequest {
            prompt: "x".into(),
            temperature: 0.5,
            format: ResponseFormat::Text,
        };
        let body = serde_json::to_value(GeminiProvider::build_body(&request)).unwrap();
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn from_config_requires_api_key() {
        let config = LlmConfig::default();
        assert!(GeminiProvider::from_config(&config).is_err());

        let config = LlmConfig {
            api_key: Some("k".into()),
            ..LlmConfig::default()
        };
        let provider = GeminiProvider::from_config(&config).unwrap();
        assert_eq!(provider.model(), "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn complete_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(candidate_body(r#"{"title":"t"}"#)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let text = provider
            .complete(&CompletionRequest::json("prompt"))
            .await
            .unwrap();
        assert_eq!(text, r#"{"title":"t"}"#);
    }

    #[tokio::test]
    async fn complete_joins_multiple_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] }
                }]
            })))
            .mount(&server)
            .await;

        let text = provider_for(&server)
            .complete(&CompletionRequest::json("p"))
            .await
            .unwrap();
        assert_eq!(text, "{\"a\":1}");
    }

    #[tokio::test]
    async fn complete_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&CompletionRequest::json("p"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn complete_rejects_empty_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&CompletionRequest::json("p"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no candidate text"));
    }
}

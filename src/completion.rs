//! Completion service abstraction and implementations.
//!
//! Defines the [`CompletionService`] trait the answer synthesizer calls, and
//! two implementations:
//! - **[`DisabledCompletion`]**: always fails pre-flight; used when
//!   `completion.provider = "disabled"`.
//! - **[`GeminiClient`]**: calls the Gemini `generateContent` REST endpoint.
//!
//! The service is constructed once and injected ([`create_service`]), so
//! tests can substitute their own implementation.
//!
//! # Retry Strategy
//!
//! [`GeminiClient`] retries transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 401/403 → configuration error, no retry
//! - Other HTTP 4xx → transport error, no retry
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::error::AssistantError;

/// Generation settings sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub system_instruction: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Raw result of a completion call. `text` may be unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: Option<String>,
}

/// A text-generation backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Check that the service can be called at all (credential present,
    /// provider enabled). Must not touch the network.
    fn preflight(&self) -> Result<(), AssistantError>;

    /// Submit one prompt.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Completion, AssistantError>;
}

/// Build the service named by `config.provider`.
///
/// A missing credential is not an error here: the Gemini client is still
/// built and reports the problem through [`CompletionService::preflight`].
pub fn create_service(config: &CompletionConfig) -> Result<Arc<dyn CompletionService>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "gemini" => {
            let api_key = credential_from_env(&config.api_key_env);
            Ok(Arc::new(GeminiClient::new(config, api_key)?))
        }
        other => anyhow::bail!("Unknown completion provider: {}", other),
    }
}

/// Read a non-blank credential from `var`.
pub fn credential_from_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============ Disabled Service ============

/// A service that refuses every call.
pub struct DisabledCompletion;

#[async_trait]
impl CompletionService for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn preflight(&self) -> Result<(), AssistantError> {
        Err(AssistantError::Configuration(
            "completion provider is disabled".to_string(),
        ))
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Completion, AssistantError> {
        Err(AssistantError::Configuration(
            "completion provider is disabled".to_string(),
        ))
    }
}

// ============ Gemini ============

/// Client for `POST {base_url}/v1beta/models/{model}:generateContent`.
pub struct GeminiClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl GeminiClient {
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            max_retries: config.max_retries,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl CompletionService for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn preflight(&self) -> Result<(), AssistantError> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(AssistantError::Configuration(
                "API key is not set".to_string(),
            )),
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Completion, AssistantError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AssistantError::Configuration("API key is not set".to_string()))?;

        let body = request_body(prompt, options);
        let url = self.endpoint();
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, delay_secs = delay.as_secs(), "retrying completion call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("x-goog-api-key", api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            AssistantError::Transport(format!("malformed response body: {}", e))
                        })?;
                        return parse_gemini_response(&json);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(AssistantError::Transport(format!(
                            "Gemini API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 401 || status.as_u16() == 403 {
                        return Err(AssistantError::Configuration(format!(
                            "Gemini rejected the credential ({}): {}",
                            status, body_text
                        )));
                    }

                    // Client error (not 429): fail now
                    return Err(AssistantError::Transport(format!(
                        "Gemini API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(AssistantError::Transport(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            AssistantError::Transport("completion failed after retries".to_string())
        }))
    }
}

/// JSON body of a `generateContent` request.
pub fn request_body(prompt: &str, options: &GenerationOptions) -> serde_json::Value {
    serde_json::json!({
        "contents": [
            { "role": "user", "parts": [ { "text": prompt } ] }
        ],
        "systemInstruction": {
            "parts": [ { "text": options.system_instruction } ]
        },
        "generationConfig": {
            "temperature": options.temperature,
            "maxOutputTokens": options.max_output_tokens,
        }
    })
}

/// Parse a `generateContent` response.
///
/// Joins the text parts of the first candidate. A well-formed response with
/// no candidate text yields `text: None`.
pub fn parse_gemini_response(json: &serde_json::Value) -> Result<Completion, AssistantError> {
    if !json.is_object() {
        return Err(AssistantError::Transport(
            "Invalid Gemini response: expected a JSON object".to_string(),
        ));
    }

    let parts = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());

    let text = parts.map(|parts| {
        parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("")
    });

    Ok(Completion {
        text: text.filter(|t| !t.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> GenerationOptions {
        GenerationOptions {
            system_instruction: "be brief".to_string(),
            temperature: 0.2,
            max_output_tokens: 128,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body("hello", &options());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 128);
        let temp = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_parse_joins_parts() {
        let json = serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": "Hello, " }, { "text": "world" } ] } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ]
        });
        let completion = parse_gemini_response(&json).unwrap();
        assert_eq!(completion.text.as_deref(), Some("Hello, world"));
    }

    #[test]
    fn test_parse_missing_text_is_none() {
        let json = serde_json::json!({ "candidates": [] });
        assert_eq!(parse_gemini_response(&json).unwrap().text, None);

        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(parse_gemini_response(&json).unwrap().text, None);
    }

    #[test]
    fn test_parse_non_object_is_transport_error() {
        let err = parse_gemini_response(&serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, AssistantError::Transport(_)));
    }

    #[test]
    fn test_gemini_preflight_requires_key() {
        let config = CompletionConfig::default();
        let client = GeminiClient::new(&config, None).unwrap();
        assert!(matches!(client.preflight(), Err(AssistantError::Configuration(_))));

        let client = GeminiClient::new(&config, Some("   ".to_string())).unwrap();
        assert!(client.preflight().is_err());

        let client = GeminiClient::new(&config, Some("k".to_string())).unwrap();
        assert!(client.preflight().is_ok());
        assert_eq!(client.model_name(), "gemini-2.5-flash");
    }

    #[test]
    fn test_endpoint() {
        let config = CompletionConfig {
            base_url: "http://localhost:9/".to_string(),
            ..CompletionConfig::default()
        };
        let client = GeminiClient::new(&config, None).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_disabled_service() {
        let config = CompletionConfig {
            provider: "disabled".to_string(),
            ..CompletionConfig::default()
        };
        let service = create_service(&config).unwrap();
        assert_eq!(service.model_name(), "disabled");
        assert!(service.preflight().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let config = CompletionConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            max_retries: 0,
            timeout_secs: 5,
            ..CompletionConfig::default()
        };
        let client = GeminiClient::new(&config, Some("k".to_string())).unwrap();
        let err = client.generate("hi", &options()).await.unwrap_err();
        assert!(matches!(err, AssistantError::Transport(_)));
    }
}

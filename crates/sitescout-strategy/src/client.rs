//! HTTP client for the OpenAI chat completions API.
//!
//! Wraps `reqwest` with the error classification the retry loop needs:
//! 429 becomes [`StrategyError::RateLimited`], other non-2xx statuses and
//! network failures become [`StrategyError::ApiFailure`]. Use
//! [`LlmClient::with_base_url`] to point at a mock server in tests.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::StrategyError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/";

/// One completed chat call: the assistant text plus token accounting.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: String,
    pub tokens_used: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: Url,
}

impl LlmClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::ApiFailure`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn new(api_key: &str, model: &str, timeout_ms: u64) -> Result<Self, StrategyError> {
        Self::with_base_url(api_key, model, timeout_ms, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::ApiFailure`] if the `reqwest::Client` cannot
    /// be constructed, or [`StrategyError::InvalidResponse`] if `base_url`
    /// does not parse.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        timeout_ms: u64,
        base_url: &str,
    ) -> Result<Self, StrategyError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| {
            StrategyError::InvalidResponse(format!("invalid base URL '{base_url}': {e}"))
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            base_url,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one system+user exchange and returns the assistant reply.
    ///
    /// # Errors
    ///
    /// - [`StrategyError::RateLimited`] on HTTP 429.
    /// - [`StrategyError::ApiFailure`] on network failure or other non-2xx.
    /// - [`StrategyError::Parsing`] if the envelope does not match.
    /// - [`StrategyError::InvalidResponse`] if the reply carries no choices.
    pub async fn chat(&self, system: &str, user: &str) -> Result<ChatOutcome, StrategyError> {
        let url = self
            .base_url
            .join("v1/chat/completions")
            .map_err(|e| StrategyError::InvalidResponse(format!("bad endpoint URL: {e}")))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            // Deterministic runs want the lowest-variance decoding the API offers.
            temperature: 0.0,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(StrategyError::RateLimited);
        }
        let body = response.error_for_status()?.text().await?;

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|source| StrategyError::Parsing {
                context: "chat completion envelope".to_owned(),
                source,
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| StrategyError::InvalidResponse("no choices in reply".to_owned()))?;

        Ok(ChatOutcome {
            content,
            tokens_used: parsed.usage.map_or(0, |u| u.total_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-test",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": content } }
            ],
            "usage": { "prompt_tokens": 40, "completion_tokens": 12, "total_tokens": 52 }
        })
    }

    #[tokio::test]
    async fn chat_returns_content_and_token_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hello")))
            .mount(&server)
            .await;

        let client = LlmClient::with_base_url("sk-test", "gpt-4o-mini", 5_000, &server.uri())
            .unwrap();
        let outcome = client.chat("system", "user").await.unwrap();
        assert_eq!(outcome.content, "hello");
        assert_eq!(outcome.tokens_used, 52);
    }

    #[tokio::test]
    async fn status_429_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = LlmClient::with_base_url("sk-test", "gpt-4o-mini", 5_000, &server.uri())
            .unwrap();
        let result = client.chat("system", "user").await;
        assert!(matches!(result, Err(StrategyError::RateLimited)));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = LlmClient::with_base_url("sk-test", "gpt-4o-mini", 5_000, &server.uri())
            .unwrap();
        let result = client.chat("system", "user").await;
        assert!(matches!(result, Err(StrategyError::ApiFailure(_))));
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-test",
                "choices": []
            })))
            .mount(&server)
            .await;

        let client = LlmClient::with_base_url("sk-test", "gpt-4o-mini", 5_000, &server.uri())
            .unwrap();
        let result = client.chat("system", "user").await;
        assert!(matches!(result, Err(StrategyError::InvalidResponse(_))));
    }
}

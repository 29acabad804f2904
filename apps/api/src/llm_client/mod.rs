//! The one HTTP client for the external messages API. Suggestion and ATS
//! features go through it; nothing else talks to the provider directly.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;
const ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to the AI provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI provider answered {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("AI output is not the expected JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("AI provider still failing after {0} attempts")]
    Exhausted(u32),

    #[error("AI response had no text")]
    NoText,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<Block>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl MessagesResponse {
    fn into_text(self) -> Option<String> {
        self.content
            .into_iter()
            .filter(|block| block.kind == "text")
            .find_map(|block| block.text)
    }
}

/// Outcome of a single HTTP exchange.
enum Attempt {
    Done(MessagesResponse),
    Retry(LlmError),
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, endpoint: String, model: String) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key,
            endpoint,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one user turn and returns the model's text.
    ///
    /// Transport failures, 429 and 5xx are retried up to `ATTEMPTS` times with
    /// doubling backoff. Any other non-2xx ends the call immediately.
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let mut last = LlmError::Exhausted(ATTEMPTS);
        for attempt in 0..ATTEMPTS {
            if attempt > 0 {
                let wait = backoff(attempt);
                warn!(attempt, wait_ms = wait.as_millis() as u64, error = %last, "retrying AI request");
                tokio::time::sleep(wait).await;
            }
            match self.send_once(&body).await? {
                Attempt::Done(response) => {
                    if let Some(usage) = &response.usage {
                        debug!(
                            model = %self.model,
                            input_tokens = usage.input_tokens,
                            output_tokens = usage.output_tokens,
                            "AI request finished"
                        );
                    }
                    return response.into_text().ok_or(LlmError::NoText);
                }
                Attempt::Retry(err) => last = err,
            }
        }
        Err(last)
    }

    async fn send_once(&self, body: &MessagesRequest<'_>) -> Result<Attempt, LlmError> {
        let sent = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await;
        let response = match sent {
            Ok(response) => response,
            Err(err) => return Ok(Attempt::Retry(LlmError::Transport(err))),
        };

        let status = response.status();
        if status.is_success() {
            return Ok(Attempt::Done(response.json().await?));
        }

        let raw = response.text().await.unwrap_or_default();
        let err = LlmError::Provider {
            status: status.as_u16(),
            message: provider_message(raw),
        };
        if is_transient(status) {
            Ok(Attempt::Retry(err))
        } else {
            Err(err)
        }
    }

    /// The prompt must ask for JSON; fenced output is tolerated.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let text = self.complete(prompt, system).await?;
        Ok(serde_json::from_str(unfence(&text))?)
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS << attempt.saturating_sub(1))
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn provider_message(raw: String) -> String {
    match serde_json::from_str::<ErrorEnvelope>(&raw) {
        Ok(envelope) => envelope.error.message,
        Err(_) => raw,
    }
}

/// Removes a surrounding markdown code fence, with or without a language tag.
fn unfence(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = match inner.split_once('\n') {
        Some((tag, rest)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => rest,
        _ => inner,
    };
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfence_tagged_block() {
        let input = "```json\n{\"suggestions\": [\"a\"]}\n```";
        assert_eq!(unfence(input), "{\"suggestions\": [\"a\"]}");
    }

    #[test]
    fn test_unfence_bare_block() {
        assert_eq!(unfence("```\n{\"score\": 70}\n```"), "{\"score\": 70}");
    }

    #[test]
    fn test_unfence_leaves_plain_json() {
        assert_eq!(unfence("  {\"score\": 70}  "), "{\"score\": 70}");
    }

    #[test]
    fn test_unfence_unterminated_fence() {
        assert_eq!(unfence("```json\n{\"score\": 1}"), "{\"score\": 1}");
    }

    #[test]
    fn test_text_skips_non_text_blocks() {
        let response: MessagesResponse = serde_json::from_value(serde_json::json!({
            "content": [
                { "type": "tool_use" },
                { "type": "text", "text": "hello" }
            ],
            "usage": { "input_tokens": 3, "output_tokens": 1 }
        }))
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("hello"));
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(1000));
        assert_eq!(backoff(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::BAD_GATEWAY));
        assert!(!is_transient(StatusCode::BAD_REQUEST));
        assert!(!is_transient(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_provider_message_prefers_envelope() {
        let raw = r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad model"}}"#;
        assert_eq!(provider_message(raw.to_string()), "bad model");
        assert_eq!(provider_message("gateway down".to_string()), "gateway down");
    }

    #[tokio::test]
    async fn test_unreachable_provider_exhausts_retries() {
        let client = LlmClient::new(
            "key".to_string(),
            "http://127.0.0.1:1/v1/messages".to_string(),
            "test-model".to_string(),
        )
        .unwrap();
        assert_eq!(client.model(), "test-model");
        let err = client.call_json::<serde_json::Value>("hi", "sys").await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
    }
}

//! [`LlmDriver`] – OpenAI-compatible chat-completions client.
//!
//! Talks to any server exposing `POST {base_url}/chat/completions` with
//! bearer authentication: xAI (`https://api.x.ai/v1`, the default), OpenAI,
//! or a local Ollama instance (`http://localhost:11434/v1`).
//!
//! Without an API key the driver is *disabled*: every call returns
//! [`LlmError::Disabled`] immediately and callers fall back to their
//! heuristic paths.
//!
//! # Example
//!
//! ```rust,no_run
//! use recall_runtime::llm_driver::LlmDriver;
//!
//! # async fn demo() -> Result<(), recall_runtime::llm_driver::LlmError> {
//! let driver = LlmDriver::new("https://api.x.ai/v1", "grok-2-latest", Some("xai-...".into()));
//! let reply = driver.complete("You are concise.", "Say hi").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampling temperature for every request.
pub const TEMPERATURE: f32 = 0.2;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from LLM driver operations.
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key is configured.
    #[error("LLM is disabled (no API key configured)")]
    Disabled,
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response from the model server could not be used.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

/// `content` is either a plain string or a list of typed parts.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<serde_json::Value>),
}

fn reply_text(response: ChatResponse) -> Result<String, LlmError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::BadResponse("empty choices array".into()))?
        .message
        .content
        .ok_or_else(|| LlmError::BadResponse("message has no content".into()))?;

    match content {
        MessageContent::Text(text) => Ok(text),
        MessageContent::Parts(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect();
            let joined = joined.trim();
            if joined.is_empty() {
                Err(LlmError::BadResponse("content parts carry no text".into()))
            } else {
                Ok(joined.to_string())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmDriver
// ─────────────────────────────────────────────────────────────────────────────

/// An async client for an OpenAI-compatible chat-completions endpoint.
///
/// Construct once and reuse for every turn.
pub struct LlmDriver {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmDriver")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", if self.api_key.is_some() { &"<redacted>" } else { &"<not set>" })
            .finish()
    }
}

impl LlmDriver {
    /// Create a driver for `base_url` (trailing `/` ignored) and `model`.
    ///
    /// An empty or missing `api_key` leaves the driver disabled.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            client: reqwest::Client::new(),
        }
    }

    /// Whether an API key is configured.
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a system prompt and a single user prompt; return the reply text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.chat(&[ChatMessage::system(system), ChatMessage::user(user)])
            .await
    }

    /// Send `messages` to the model and return the assistant's reply text.
    ///
    /// # Errors
    ///
    /// [`LlmError::Disabled`] without an API key, [`LlmError::Http`] if the
    /// request fails or returns a non-success status, and
    /// [`LlmError::BadResponse`] if the body carries no usable text.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::Disabled)?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
        };

        let response: ChatResponse = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        reply_text(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<String, LlmError> {
        reply_text(serde_json::from_str(raw).expect("valid response json"))
    }

    // ── message types ────────────────────────────────────────────────────────

    #[test]
    fn chat_message_serializes_role() {
        let json = serde_json::to_string(&ChatMessage::system("hello")).unwrap();
        assert!(json.contains("\"system\""));
    }

    #[test]
    fn request_body_shape() {
        let messages = [ChatMessage::user("hi")];
        let body = ChatRequest {
            model: "grok-2-latest",
            messages: &messages,
            temperature: TEMPERATURE,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "grok-2-latest");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    // ── response parsing ─────────────────────────────────────────────────────

    #[test]
    fn string_content_is_returned() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Hello!"}}]}"#;
        assert_eq!(parse(raw).unwrap(), "Hello!");
    }

    #[test]
    fn part_list_content_is_joined() {
        let raw = r#"{"choices":[{"message":{"content":[{"type":"text","text":"Hel"},{"type":"text","text":"lo"},42]}}]}"#;
        assert_eq!(parse(raw).unwrap(), "Hello");
    }

    #[test]
    fn empty_choices_is_bad_response() {
        assert!(matches!(parse(r#"{"choices":[]}"#), Err(LlmError::BadResponse(_))));
        assert!(matches!(parse(r#"{}"#), Err(LlmError::BadResponse(_))));
    }

    #[test]
    fn null_content_is_bad_response() {
        let raw = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert!(matches!(parse(raw), Err(LlmError::BadResponse(_))));
    }

    // ── driver ───────────────────────────────────────────────────────────────

    #[test]
    fn driver_without_key_is_disabled() {
        assert!(!LlmDriver::new("https://api.x.ai/v1", "m", None).is_enabled());
        assert!(!LlmDriver::new("https://api.x.ai/v1", "m", Some("  ".into())).is_enabled());
        assert!(LlmDriver::new("https://api.x.ai/v1", "m", Some("k".into())).is_enabled());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let driver = LlmDriver::new("http://localhost:11434/v1/", "llama3", None);
        assert_eq!(driver.base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let driver = LlmDriver::new("https://api.x.ai/v1", "m", Some("xai-secret".into()));
        let debug = format!("{driver:?}");
        assert!(!debug.contains("xai-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn disabled_driver_fails_fast() {
        let driver = LlmDriver::new("http://127.0.0.1:9", "m", None);
        assert!(matches!(driver.complete("s", "u").await, Err(LlmError::Disabled)));
    }
}

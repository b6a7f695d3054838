//! The [`ChatBackend`] trait and the OpenRouter-compatible HTTP transport.
//!
//! The trait is the crate's only seam to the outside world: send an ordered
//! message history plus per-call options, get back a typed reply or a
//! [`BackendError`]. Each call is stateless; callers own any retry policy.

use crate::api::error::BackendError;
use crate::{Message, MessageRole};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default endpoint for the HTTP backend.
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Request timeout for the HTTP backend.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Invocation contract ────────────────────────────────────────────

/// Per-call generation options.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// System prompt prepended to the history.
    pub system_prompt: Option<String>,
    /// Sampling temperature, clamped to `[0.0, 1.0]`.
    pub temperature: Option<f32>,
    /// Cap on generated tokens.
    pub max_output_tokens: Option<u32>,
}

impl InvokeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }
}

/// A successful backend reply: whole-response text plus reported usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The backend client interface.
///
/// Implementations are invoked concurrently by the comparator, so they must
/// be `Send + Sync`; share one behind an `Arc`.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `history` (oldest first) with `options`, returning the whole
    /// reply or a typed error. No retries happen inside this call.
    async fn invoke(
        &self,
        history: &[Message],
        options: &InvokeOptions,
    ) -> Result<BackendReply, BackendError>;
}

// ── Wire types ─────────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct WireMessage {
    role: String,
    content: String,
}

impl WireMessage {
    fn from_message(msg: &Message) -> Self {
        let role = match msg.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        Self {
            role: role.into(),
            content: msg.content.clone(),
        }
    }
}

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorBody>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

/// Error envelope some APIs wrap a non-success body in.
#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize, Debug)]
struct UsageInfo {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

// ── HTTP backend ───────────────────────────────────────────────────

/// Async HTTP backend for OpenRouter-style chat completion APIs.
pub struct OpenRouterBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenRouterBackend {
    /// Create a backend for `model` with the given API key.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_url(api_key, model, OPENROUTER_URL)
    }

    /// Create a backend pointed at a custom endpoint (proxies, test servers).
    pub fn with_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent("confab-rs/0.2")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Unreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            url: url.into(),
        })
    }

    /// The model this backend targets.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(&self, history: &[Message], options: &InvokeOptions) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(ref prompt) = options.system_prompt {
            messages.push(WireMessage {
                role: "system".into(),
                content: prompt.clone(),
            });
        }
        messages.extend(history.iter().map(WireMessage::from_message));

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: options.max_output_tokens,
            temperature: options.temperature,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenRouterBackend {
    async fn invoke(
        &self,
        history: &[Message],
        options: &InvokeOptions,
    ) -> Result<BackendReply, BackendError> {
        if self.api_key.trim().is_empty() {
            return Err(BackendError::Unauthenticated);
        }

        let body = self.build_body(history, options);
        debug!(
            "backend request: model={}, messages={}, max_tokens={:?}, temp={:?}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| BackendError::Unreachable(format!("failed to read response: {e}")))?;

        debug!(
            "backend response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len(),
        );

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(BackendError::Unauthenticated);
        }
        if !status.is_success() {
            // Prefer the structured error message; fall back to the raw body.
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| text.trim().to_string());
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: RawChatResponse = serde_json::from_str(&text)
            .map_err(|e| BackendError::Malformed(format!("failed to parse response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: err.message,
            });
        }

        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::Malformed("response contained no choices".into()))?;

        let usage = parsed.usage.unwrap_or(UsageInfo {
            prompt_tokens: None,
            completion_tokens: None,
        });

        Ok(BackendReply {
            text: content,
            input_tokens: usage.prompt_tokens.unwrap_or(0),
            output_tokens: usage.completion_tokens.unwrap_or(0),
        })
    }
}

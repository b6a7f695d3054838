//! Conversation manager with automatic compaction, plus a multi-backend
//! comparator for fanning one query out to several assistant backends.
//!
//! `confab-rs` solves two problems that make a chat client non-trivial:
//!
//! 1. A conversation grows without bound. The [`ChatManager`](chat::ChatManager)
//!    owns an append-only message log with token accounting and replaces the
//!    oldest turns with a single synthesized summary once a configurable
//!    threshold is reached — without breaking ordering or addressability,
//!    and without ever leaving a half-finished exchange in the log.
//!
//! 2. Comparing several independent, unreliable backends requires concurrent
//!    dispatch with per-backend failure isolation. The
//!    [`Comparator`](compare::Comparator) fans a query out to N backends,
//!    collects every outcome (success or error) into a deterministic,
//!    configuration-ordered result set, and runs one synthesis pass over
//!    the aggregate.
//!
//! # Getting started
//!
//! ```ignore
//! use confab_rs::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BackendError> {
//!     let api_key = std::env::var("OPENROUTER_KEY").unwrap();
//!     let backend = Arc::new(OpenRouterBackend::new(api_key, "anthropic/claude-sonnet-4")?);
//!
//!     let config = ChatConfig::new("anthropic/claude-sonnet-4")
//!         .with_system_prompt("You are a helpful assistant.")
//!         .with_compaction_threshold(10);
//!
//!     let mut chat = ChatManager::new(backend.clone(), config);
//!     if let Some(reply) = chat.submit("What is a borrow checker?").await? {
//!         println!("{}", reply.content);
//!     }
//!     println!("{}", chat.token_totals().summary());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | [`ChatBackend`](api::ChatBackend) trait, [`BackendError`](api::BackendError) taxonomy, OpenRouter-compatible HTTP backend |
//! | [`chat`] | [`ConversationLog`](chat::ConversationLog), token ledger, compaction, [`ChatManager`](chat::ChatManager) |
//! | [`compare`] | Concurrent fan-out/fan-in across backends, [`ComparisonRun`](compare::ComparisonRun) records, synthesis pass |
//! | [`config`] | Dependency-injected [`ChatConfig`](config::ChatConfig) and per-model pricing |
//! | [`store`] | Opaque key-value persistence boundary with file and in-memory backends |
//!
//! # Design principles
//!
//! 1. **Nothing here is fatal.** Backend failures during an exchange roll the
//!    log back; failures during compaction are logged and retried on the next
//!    qualifying send; a failed comparator backend becomes a per-slot error
//!    record; a failed synthesis call degrades to a placeholder string.
//!    Every failure path returns to a well-defined idle state.
//!
//! 2. **Owned state, explicit mutation.** The log and the run history are
//!    owned data structures mutated only through their managers. There is no
//!    ambient shared state and no global singleton — configuration is passed
//!    in at construction.
//!
//! 3. **Deterministic aggregation.** Comparator results are indexed by
//!    backend configuration position, not arrival order, so output is stable
//!    regardless of which backend responds first.

pub mod api;
pub mod chat;
pub mod compare;
pub mod config;
pub mod prelude;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

// ── Identifiers ────────────────────────────────────────────────────

/// Generate an opaque, unique identifier with the given prefix.
///
/// Combines a nanosecond timestamp with a process-wide counter to handle
/// sub-nanosecond calls.
pub fn generate_id(prefix: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{ts:x}-{count:04x}")
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in a conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Capitalized label for transcript rendering ("User" / "Assistant").
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Token usage reported by a backend for a single exchange.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A single message in a conversation log.
///
/// Messages are never mutated after creation; they are removed only when a
/// compaction replaces them with a summary. Summary messages always carry
/// `role = Assistant` (enforced by [`Message::summary`]).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    /// Opaque identifier, unique within the process.
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Backend-reported usage. Present on assistant replies, absent on user
    /// turns and summaries.
    pub token_usage: Option<TokenUsage>,
    /// Whether this message was synthesized by compaction.
    pub is_summary: bool,
}

impl Message {
    /// Create a user message timestamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: generate_id("msg"),
            role: MessageRole::User,
            content: content.into(),
            created_at: Utc::now(),
            token_usage: None,
            is_summary: false,
        }
    }

    /// Create an assistant reply carrying the backend-reported usage.
    pub fn assistant(content: impl Into<String>, token_usage: Option<TokenUsage>) -> Self {
        Self {
            id: generate_id("msg"),
            role: MessageRole::Assistant,
            content: content.into(),
            created_at: Utc::now(),
            token_usage,
            is_summary: false,
        }
    }

    /// Create a compaction summary, backdated to the earliest message it
    /// replaces so log ordering survives the swap.
    pub fn summary(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: generate_id("msg"),
            role: MessageRole::Assistant,
            content: content.into(),
            created_at,
            token_usage: None,
            is_summary: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_unique() {
        let a = generate_id("msg");
        let b = generate_id("msg");
        assert_ne!(a, b);
        assert!(a.starts_with("msg-"));
    }

    #[test]
    fn message_constructors() {
        let user = Message::user("hello");
        assert_eq!(user.role, MessageRole::User);
        assert!(!user.is_summary);
        assert!(user.token_usage.is_none());

        let usage = TokenUsage {
            input_tokens: 5,
            output_tokens: 8,
        };
        let reply = Message::assistant("hi", Some(usage));
        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(reply.token_usage, Some(usage));
    }

    #[test]
    fn summaries_are_assistant_role() {
        let ts = Utc::now();
        let summary = Message::summary("earlier turns condensed", ts);
        assert_eq!(summary.role, MessageRole::Assistant);
        assert!(summary.is_summary);
        assert_eq!(summary.created_at, ts);
    }

    #[test]
    fn role_labels_and_display() {
        assert_eq!(MessageRole::User.label(), "User");
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
    }

    #[test]
    fn message_serde_roundtrip() {
        let msg = Message::assistant(
            "reply",
            Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            }),
        );
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }
}

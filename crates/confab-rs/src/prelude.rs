//! Convenience re-exports for common `confab-rs` types.
//!
//! Meant to be glob-imported when building on the crate:
//!
//! ```ignore
//! use confab_rs::prelude::*;
//! ```
//!
//! This pulls in the types needed for the vast majority of programs: the
//! [`ChatManager`] and its config, the [`Comparator`] and its records, the
//! [`ChatBackend`] trait with the [`OpenRouterBackend`] implementation, and
//! the persistence helpers. Specialized items (wire constants, the summary
//! prompt) are intentionally excluded — import those from their modules
//! directly when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Message, MessageRole, TokenUsage, generate_id};

// ── Backends ────────────────────────────────────────────────────────
pub use crate::api::{BackendError, BackendReply, ChatBackend, InvokeOptions, OpenRouterBackend};

// ── Conversation management ─────────────────────────────────────────
pub use crate::chat::{
    ChatManager, ChatState, CompactionConfig, CompactionStats, ConversationLog,
    ConversationSnapshot, TokenTotals,
};

// ── Comparison ──────────────────────────────────────────────────────
pub use crate::compare::{
    BackendDescriptor, BackendResult, Comparator, ComparisonRun, RunStatus,
};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::config::{ChatConfig, ModelPricing, pricing_for_model};

// ── Persistence ─────────────────────────────────────────────────────
pub use crate::store::{
    FileStore, KvStore, MemoryStore, StoreError, load_json_or_default, save_json,
};

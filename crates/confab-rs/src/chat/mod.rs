//! Conversation state: the ordered log, token accounting, and compaction.
//!
//! Three layers, innermost first:
//!
//! 1. **[`log`]** — [`ConversationLog`], the append-only ordered message
//!    sequence with identity-addressed removal and a derived token ledger.
//!    The ledger is a pure fold over the log; it can never go stale.
//!
//! 2. **[`compaction`]** — the policy for replacing the oldest `threshold`
//!    non-summary messages with one synthesized summary: batch selection,
//!    transcript rendering, and the atomic swap.
//!
//! 3. **[`manager`]** — [`ChatManager`], the per-conversation state machine
//!    that runs exchanges against a [`ChatBackend`](crate::api::ChatBackend),
//!    rolls back failed exchanges, and triggers compaction after successful
//!    ones.
//!
//! One `ChatManager` owns one conversation; operations on it are strictly
//! sequential. Different conversations are independent values and may run
//! concurrently.

pub mod compaction;
pub mod log;
pub mod manager;

// Re-export commonly used items at the module level.
pub use compaction::{CompactionConfig, CompactionStats};
pub use log::{ConversationLog, TokenTotals};
pub use manager::{ChatManager, ChatState, ConversationSnapshot};

//! Threshold-triggered compaction: replace the oldest raw turns with one
//! synthesized summary to bound context size.
//!
//! Compaction fires when the count of non-summary messages reaches the
//! configured threshold. The batch is always the oldest `threshold`
//! non-summary messages in log order; existing summaries are never batched,
//! so a log of summaries alone is never re-summarized. The swap is atomic:
//! if the summarization call fails, the log is left untouched and compaction
//! simply retries on the next qualifying send.

use crate::Message;
use crate::chat::log::ConversationLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The prompt used for summarization. Instructs the model to produce a
/// terse summary and nothing else.
pub const SUMMARY_PROMPT: &str = "\
Summarize the following conversation in 2-3 sentences. Capture the topics \
discussed, key facts established, and any open questions. Respond with the \
summary text only — no preamble, no commentary.";

/// Configuration for the compaction policy.
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// Number of non-summary messages that triggers compaction. The batch
    /// has exactly this size.
    pub threshold: usize,
    /// Cap on the summary's generated tokens.
    pub max_summary_tokens: u32,
    /// Temperature for the summarization call (low — summaries should be
    /// factual, not creative).
    pub temperature: f32,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            max_summary_tokens: 256,
            temperature: 0.3,
        }
    }
}

/// Counters recorded across a conversation's compactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionStats {
    /// Number of summaries created.
    pub summary_count: u64,
    /// Total messages replaced by summaries.
    pub compressed_message_count: u64,
}

impl CompactionStats {
    /// Record one successful compaction of `batch_size` messages.
    pub fn record(&mut self, batch_size: usize) {
        self.summary_count += 1;
        self.compressed_message_count += batch_size as u64;
    }
}

/// A compaction batch selected from a log: message ids, rendered transcript,
/// and the timestamp the summary inherits.
#[derive(Debug)]
pub struct CompactionBatch {
    pub message_ids: Vec<String>,
    pub transcript: String,
    pub earliest_created_at: DateTime<Utc>,
}

/// Select the oldest `threshold` non-summary messages for compaction.
///
/// Returns `None` when fewer than `threshold` non-summary messages exist —
/// including when the log holds nothing but summaries.
pub fn select_batch(log: &ConversationLog, threshold: usize) -> Option<CompactionBatch> {
    if threshold == 0 || log.non_summary_count() < threshold {
        return None;
    }

    let batch: Vec<&Message> = log
        .messages()
        .iter()
        .filter(|m| !m.is_summary)
        .take(threshold)
        .collect();

    let earliest_created_at = batch
        .iter()
        .map(|m| m.created_at)
        .min()
        .unwrap_or_else(Utc::now);

    Some(CompactionBatch {
        message_ids: batch.iter().map(|m| m.id.clone()).collect(),
        transcript: render_transcript(&batch),
        earliest_created_at,
    })
}

/// Render messages as a `"<Role>: <content>"` transcript, oldest first.
fn render_transcript(batch: &[&Message]) -> String {
    batch
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

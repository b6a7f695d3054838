//! The append-only conversation log and its derived token ledger.

use crate::config::ModelPricing;
use crate::{Message, TokenUsage};
use serde::{Deserialize, Serialize};

/// Cumulative token totals, derived from the log on demand.
///
/// Never stored independently: recomputing the fold after every mutation is
/// cheap and keeps the ledger consistent with the log by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenTotals {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Format as a short log-friendly string.
    pub fn summary(&self) -> String {
        format!(
            "tokens: {} input + {} output = {} total",
            self.input_tokens,
            self.output_tokens,
            self.total(),
        )
    }
}

/// Ordered sequence of messages for one conversation, oldest first.
///
/// Mutation happens only through this type's methods; callers observe the
/// log through [`messages()`](Self::messages) and the derived accessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages in conversation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Count of messages not produced by compaction.
    pub fn non_summary_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_summary).count()
    }

    /// Count of compaction summaries currently in the log.
    pub fn summary_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_summary).count()
    }

    /// Append a message at the tail.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Atomically remove every message whose id is in `batch_ids` and insert
    /// `summary` at the head of the log.
    ///
    /// This is the compaction swap: either the whole batch is replaced or —
    /// if the caller never gets here because the summarization call failed —
    /// nothing changes.
    pub fn replace_with_summary(&mut self, batch_ids: &[String], summary: Message) {
        self.messages.retain(|m| !batch_ids.contains(&m.id));
        self.messages.insert(0, summary);
    }

    /// Token ledger: a pure fold over the messages' recorded usage.
    pub fn token_totals(&self) -> TokenTotals {
        self.messages
            .iter()
            .filter_map(|m| m.token_usage)
            .fold(TokenTotals::default(), |acc, u: TokenUsage| TokenTotals {
                input_tokens: acc.input_tokens + u.input_tokens as u64,
                output_tokens: acc.output_tokens + u.output_tokens as u64,
            })
    }

    /// Estimated cost of the conversation so far, in USD.
    pub fn estimated_cost(&self, pricing: &ModelPricing) -> f64 {
        let totals = self.token_totals();
        pricing.estimate_cost(totals.input_tokens, totals.output_tokens)
    }

    /// Reset to empty. Idempotent.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn usage(input: u32, output: u32) -> Option<TokenUsage> {
        Some(TokenUsage {
            input_tokens: input,
            output_tokens: output,
        })
    }

    #[test]
    fn totals_fold_over_assistant_usage() {
        let mut log = ConversationLog::new();
        log.push(Message::user("a"));
        log.push(Message::assistant("b", usage(5, 8)));
        log.push(Message::user("c"));
        log.push(Message::assistant("d", usage(10, 2)));

        let totals = log.token_totals();
        assert_eq!(totals.input_tokens, 15);
        assert_eq!(totals.output_tokens, 10);
        assert_eq!(totals.total(), 25);
    }

    #[test]
    fn totals_track_mutations() {
        let mut log = ConversationLog::new();
        log.push(Message::assistant("x", usage(100, 50)));
        assert_eq!(log.token_totals().input_tokens, 100);

        log.clear();
        assert_eq!(log.token_totals(), TokenTotals::default());
    }

    #[test]
    fn replace_with_summary_swaps_batch_for_head_summary() {
        let mut log = ConversationLog::new();
        log.push(Message::user("q1"));
        log.push(Message::assistant("a1", usage(5, 5)));
        log.push(Message::user("q2"));
        log.push(Message::assistant("a2", usage(5, 5)));

        let batch_ids: Vec<String> = log.messages()[..2].iter().map(|m| m.id.clone()).collect();
        let summary = Message::summary("q1/a1 condensed", log.messages()[0].created_at);
        log.replace_with_summary(&batch_ids, summary);

        assert_eq!(log.len(), 3);
        assert!(log.messages()[0].is_summary);
        assert_eq!(log.non_summary_count(), 2);
        assert_eq!(log.summary_count(), 1);
        // Only the surviving assistant turn counts toward the ledger.
        assert_eq!(log.token_totals().input_tokens, 5);
    }

    #[test]
    fn estimated_cost_uses_pricing_rates() {
        let mut log = ConversationLog::new();
        log.push(Message::assistant("x", usage(1_000_000, 0)));

        let pricing = ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        };
        assert!((log.estimated_cost(&pricing) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut log = ConversationLog::new();
        log.push(Message::user("x"));
        log.clear();
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn snapshot_roundtrip() {
        let mut log = ConversationLog::new();
        log.push(Message::user("hello"));
        log.push(Message::summary("older turns", Utc::now()));

        let json = serde_json::to_string(&log).unwrap();
        let parsed: ConversationLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.summary_count(), 1);
    }
}

//! [`ChatManager`]: the per-conversation exchange loop.
//!
//! One manager owns one conversation. Exchanges are strictly sequential —
//! `submit` takes `&mut self`, so overlapping operations on the same
//! conversation are unrepresentable. The failed-exchange guarantee is
//! structural: the pending user turn is sent as part of the request history
//! but appended to the log only together with the assistant reply, so a
//! failed (or cancelled mid-await) submit leaves the log byte-identical to
//! its pre-submit state with no compensating mutation.

use crate::api::{BackendError, ChatBackend, InvokeOptions};
use crate::chat::compaction::{self, CompactionStats, SUMMARY_PROMPT};
use crate::chat::log::{ConversationLog, TokenTotals};
use crate::config::ChatConfig;
use crate::{Message, TokenUsage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state of a conversation, for observers.
///
/// `Idle → Sending → (Idle | Compacting) → Idle`. The exclusive-borrow
/// discipline is what actually serializes operations; this enum just reports
/// where the last operation left off. Dropping an in-flight future resets
/// it to `Idle`, same as a failure would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Sending,
    Compacting,
}

/// Resets the reported state to `Idle` on drop. Wrapped around every await
/// so a future dropped mid-flight cannot leave a stale phase reported.
struct StateReset<'a>(&'a mut ChatState);

impl Drop for StateReset<'_> {
    fn drop(&mut self) {
        *self.0 = ChatState::Idle;
    }
}

/// Persistable snapshot of a conversation: log, counters, and the
/// per-conversation options worth carrying across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub log: ConversationLog,
    pub stats: CompactionStats,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
}

/// Owns the ordered message log, token accounting, and compaction policy
/// for one conversation.
pub struct ChatManager {
    backend: Arc<dyn ChatBackend>,
    config: ChatConfig,
    log: ConversationLog,
    stats: CompactionStats,
    state: ChatState,
}

impl ChatManager {
    pub fn new(backend: Arc<dyn ChatBackend>, config: ChatConfig) -> Self {
        Self {
            backend,
            config,
            log: ConversationLog::new(),
            stats: CompactionStats::default(),
            state: ChatState::Idle,
        }
    }

    // ── Exchange ───────────────────────────────────────────────────

    /// Run one user exchange.
    ///
    /// Empty or whitespace-only input is a no-op and returns `Ok(None)`
    /// without touching the log or the backend. On success the user turn and
    /// assistant reply are appended together, the ledger reflects the new
    /// usage, and the compaction trigger is evaluated. On failure the log is
    /// unchanged and the error is returned verbatim.
    pub async fn submit(&mut self, text: &str) -> Result<Option<Message>, BackendError> {
        if text.trim().is_empty() {
            debug!("ignoring empty submit");
            return Ok(None);
        }

        self.state = ChatState::Sending;
        let pending = Message::user(text);

        // Full current log plus the new turn; summaries are included so the
        // backend sees the compacted history.
        let mut history: Vec<Message> = self.log.messages().to_vec();
        history.push(pending.clone());

        let options = self.config.invoke_options();
        let outcome = {
            let _reset = StateReset(&mut self.state);
            self.backend.invoke(&history, &options).await
        };
        match outcome {
            Ok(reply) => {
                let usage = TokenUsage {
                    input_tokens: reply.input_tokens,
                    output_tokens: reply.output_tokens,
                };
                let assistant = Message::assistant(reply.text, Some(usage));
                self.log.push(pending);
                self.log.push(assistant.clone());
                debug!(
                    "exchange complete: {} messages, {}",
                    self.log.len(),
                    self.log.token_totals().summary(),
                );

                self.maybe_compact().await;
                Ok(Some(assistant))
            }
            Err(e) => {
                // The pending turn was never appended; the log is untouched.
                warn!("exchange failed, conversation rolled back: {e}");
                Err(e)
            }
        }
    }

    // ── Compaction ─────────────────────────────────────────────────

    /// Evaluate the compaction trigger and, if due, summarize the oldest
    /// `threshold` non-summary messages.
    ///
    /// A summarization failure is non-fatal: it is logged and the log stays
    /// unchanged, so the next qualifying send retries.
    async fn maybe_compact(&mut self) {
        let threshold = self.config.compaction.threshold;
        let Some(batch) = compaction::select_batch(&self.log, threshold) else {
            return;
        };

        self.state = ChatState::Compacting;
        debug!("compacting {} messages", batch.message_ids.len());

        let options = InvokeOptions::new()
            .with_system_prompt(SUMMARY_PROMPT)
            .with_temperature(self.config.compaction.temperature)
            .with_max_output_tokens(self.config.compaction.max_summary_tokens);
        let request = vec![Message::user(batch.transcript.clone())];

        let outcome = {
            let _reset = StateReset(&mut self.state);
            self.backend.invoke(&request, &options).await
        };
        match outcome {
            Ok(reply) => {
                let summary = Message::summary(reply.text, batch.earliest_created_at);
                self.log.replace_with_summary(&batch.message_ids, summary);
                self.stats.record(batch.message_ids.len());
                info!(
                    "compaction {}: {} messages -> 1 summary",
                    self.stats.summary_count,
                    batch.message_ids.len(),
                );
            }
            Err(e) => {
                // Swallowed: the completed exchange already succeeded.
                warn!("compaction failed, will retry on next qualifying send: {e}");
            }
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Reset the log and all counters. Idempotent.
    pub fn clear(&mut self) {
        self.log.clear();
        self.stats = CompactionStats::default();
        self.state = ChatState::Idle;
    }

    /// Capture a persistable snapshot of this conversation.
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            log: self.log.clone(),
            stats: self.stats,
            system_prompt: self.config.system_prompt.clone(),
            temperature: self.config.temperature,
        }
    }

    /// Restore a previously captured snapshot, replacing the current log,
    /// counters, and per-conversation options.
    pub fn restore(&mut self, snapshot: ConversationSnapshot) {
        self.log = snapshot.log;
        self.stats = snapshot.stats;
        self.config.system_prompt = snapshot.system_prompt;
        self.config.temperature = snapshot.temperature;
        self.state = ChatState::Idle;
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn token_totals(&self) -> TokenTotals {
        self.log.token_totals()
    }

    /// Estimated conversation cost in USD under the configured pricing.
    pub fn estimated_cost(&self) -> f64 {
        self.log.estimated_cost(&self.config.pricing)
    }

    pub fn compaction_stats(&self) -> CompactionStats {
        self.stats
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;
    use crate::api::BackendReply;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend fake that replays scripted outcomes and records each request.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<BackendReply, BackendError>>>,
        requests: Mutex<Vec<(usize, Option<String>)>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<BackendReply, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(usize, Option<String>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn invoke(
            &self,
            history: &[Message],
            options: &InvokeOptions,
        ) -> Result<BackendReply, BackendError> {
            self.requests
                .lock()
                .unwrap()
                .push((history.len(), options.system_prompt.clone()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Unreachable("script exhausted".into())))
        }
    }

    fn reply(text: &str, input: u32, output: u32) -> Result<BackendReply, BackendError> {
        Ok(BackendReply {
            text: text.into(),
            input_tokens: input,
            output_tokens: output,
        })
    }

    fn manager(
        script: Vec<Result<BackendReply, BackendError>>,
        threshold: usize,
    ) -> (ChatManager, Arc<ScriptedBackend>) {
        let backend = ScriptedBackend::new(script);
        let config = ChatConfig::new("test/model").with_compaction_threshold(threshold);
        (ChatManager::new(backend.clone(), config), backend)
    }

    #[tokio::test]
    async fn successful_exchanges_alternate_roles() {
        let (mut chat, _) = manager(vec![reply("r1", 5, 8), reply("r2", 3, 4)], 100);

        chat.submit("one").await.unwrap();
        chat.submit("two").await.unwrap();

        let roles: Vec<MessageRole> = chat.log().messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant,
            ]
        );
        let totals = chat.token_totals();
        assert_eq!(totals.input_tokens, 8);
        assert_eq!(totals.output_tokens, 12);
    }

    #[tokio::test]
    async fn failed_submit_leaves_log_unchanged() {
        let (mut chat, _) = manager(
            vec![
                reply("hello there", 5, 8),
                Err(BackendError::Unreachable("connection refused".into())),
            ],
            100,
        );

        chat.submit("hi").await.unwrap();
        let before: Vec<String> = chat.log().messages().iter().map(|m| m.id.clone()).collect();
        let totals_before = chat.token_totals();

        let err = chat.submit("bye").await.unwrap_err();
        assert!(matches!(err, BackendError::Unreachable(_)));

        let after: Vec<String> = chat.log().messages().iter().map(|m| m.id.clone()).collect();
        assert_eq!(after, before);
        assert_eq!(chat.log().len(), 2);
        assert_eq!(chat.token_totals(), totals_before);
        assert_eq!(chat.state(), ChatState::Idle);
    }

    #[tokio::test]
    async fn concrete_scenario_from_empty() {
        let (mut chat, _) = manager(
            vec![
                reply("hello!", 5, 8),
                Err(BackendError::Rejected {
                    status: 500,
                    message: "boom".into(),
                }),
            ],
            100,
        );

        chat.submit("hi").await.unwrap();
        assert_eq!(chat.log().len(), 2);
        assert_eq!(chat.token_totals().input_tokens, 5);
        assert_eq!(chat.token_totals().output_tokens, 8);

        assert!(chat.submit("bye").await.is_err());
        assert_eq!(chat.log().len(), 2);
        assert_eq!(chat.token_totals().input_tokens, 5);
        assert_eq!(chat.token_totals().output_tokens, 8);
    }

    #[tokio::test]
    async fn empty_input_is_noop() {
        let (mut chat, backend) = manager(vec![], 100);
        assert!(chat.submit("").await.unwrap().is_none());
        assert!(chat.submit("   \n\t").await.unwrap().is_none());
        assert!(chat.log().is_empty());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn submit_sends_full_history_plus_pending_turn() {
        let (mut chat, backend) = manager(vec![reply("a", 1, 1), reply("b", 1, 1)], 100);
        chat.submit("one").await.unwrap();
        chat.submit("two").await.unwrap();

        let requests = backend.requests();
        assert_eq!(requests[0].0, 1); // just the pending turn
        assert_eq!(requests[1].0, 3); // prior exchange + pending turn
    }

    #[tokio::test]
    async fn compaction_fires_at_threshold() {
        // Threshold 4: two exchanges reach 4 non-summary messages, then the
        // third scripted result answers the summarization call.
        let (mut chat, backend) = manager(
            vec![reply("a", 1, 1), reply("b", 1, 1), reply("summary text", 2, 2)],
            4,
        );

        chat.submit("one").await.unwrap();
        assert_eq!(chat.compaction_stats().summary_count, 0);

        chat.submit("two").await.unwrap();
        let stats = chat.compaction_stats();
        assert_eq!(stats.summary_count, 1);
        assert_eq!(stats.compressed_message_count, 4);

        assert_eq!(chat.log().len(), 1);
        assert!(chat.log().messages()[0].is_summary);
        assert_eq!(chat.log().messages()[0].content, "summary text");
        assert_eq!(chat.log().non_summary_count(), 0);
        // The ledger folds over the current log: the compacted turns took
        // their recorded usage with them, and the summary carries none.
        assert_eq!(chat.token_totals(), TokenTotals::default());

        // The summarization request was a single-turn history with the
        // summary system prompt.
        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].0, 1);
        assert_eq!(requests[2].1.as_deref(), Some(SUMMARY_PROMPT));
    }

    #[tokio::test]
    async fn compaction_failure_is_swallowed_and_retried() {
        let (mut chat, _) = manager(
            vec![
                reply("a", 1, 1),
                reply("b", 1, 1),
                Err(BackendError::Unreachable("summarizer down".into())),
                reply("c", 1, 1),
                reply("late summary", 1, 1),
            ],
            4,
        );

        chat.submit("one").await.unwrap();
        // Second exchange triggers compaction, which fails: the exchange
        // still succeeds and the log keeps all 4 messages.
        chat.submit("two").await.unwrap();
        assert_eq!(chat.compaction_stats().summary_count, 0);
        assert_eq!(chat.log().len(), 4);

        // Next send retries compaction (6 >= 4) and succeeds.
        chat.submit("three").await.unwrap();
        assert_eq!(chat.compaction_stats().summary_count, 1);
        assert_eq!(chat.log().non_summary_count(), 2);
    }

    #[tokio::test]
    async fn summaries_survive_and_are_never_rebatched() {
        let (mut chat, _) = manager(
            vec![
                reply("a", 1, 1),
                reply("summary one", 1, 1),
                reply("b", 1, 1),
                reply("summary two", 1, 1),
            ],
            2,
        );

        chat.submit("one").await.unwrap();
        assert_eq!(chat.log().summary_count(), 1);

        chat.submit("two").await.unwrap();
        // The first summary was not part of the second batch.
        assert_eq!(chat.log().summary_count(), 2);
        assert_eq!(chat.compaction_stats().compressed_message_count, 4);
        assert_eq!(chat.log().non_summary_count(), 0);
    }

    #[tokio::test]
    async fn summary_inherits_earliest_batch_timestamp() {
        let (mut chat, _) = manager(vec![reply("a", 1, 1), reply("s", 1, 1)], 2);

        chat.submit("one").await.unwrap();
        let summary = &chat.log().messages()[0];
        assert!(summary.is_summary);
        // Backdated: no later than the exchange that produced the batch.
        assert!(summary.created_at <= chat.log().messages().last().unwrap().created_at);
    }

    #[tokio::test]
    async fn cancelled_submit_rolls_back_and_returns_idle() {
        struct StalledBackend;

        #[async_trait]
        impl ChatBackend for StalledBackend {
            async fn invoke(
                &self,
                _history: &[Message],
                _options: &InvokeOptions,
            ) -> Result<BackendReply, BackendError> {
                std::future::pending().await
            }
        }

        let mut chat = ChatManager::new(Arc::new(StalledBackend), ChatConfig::new("test/model"));
        let cancelled = tokio::time::timeout(Duration::from_millis(10), chat.submit("hi")).await;
        assert!(cancelled.is_err());

        // Dropping the in-flight future gives the same guarantees as a
        // failed exchange: empty log, idle state.
        assert!(chat.log().is_empty());
        assert_eq!(chat.state(), ChatState::Idle);
        assert_eq!(chat.token_totals(), TokenTotals::default());
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let (mut chat, _) = manager(vec![reply("a", 5, 5), reply("s", 1, 1)], 2);
        chat.submit("one").await.unwrap();
        assert!(chat.compaction_stats().summary_count > 0);

        chat.clear();
        chat.clear(); // idempotent
        assert!(chat.log().is_empty());
        assert_eq!(chat.token_totals(), TokenTotals::default());
        assert_eq!(chat.compaction_stats(), CompactionStats::default());
    }

    #[tokio::test]
    async fn snapshot_restore_roundtrip() {
        let (mut chat, _) = manager(vec![reply("a", 5, 8)], 100);
        chat.submit("one").await.unwrap();
        let snapshot = chat.snapshot();

        let (mut restored, _) = manager(vec![], 100);
        restored.restore(snapshot);
        assert_eq!(restored.log().len(), 2);
        assert_eq!(restored.token_totals().input_tokens, 5);
    }

    #[tokio::test]
    async fn estimated_cost_reflects_pricing() {
        let backend = ScriptedBackend::new(vec![reply("a", 1_000_000, 0)]);
        let config = ChatConfig::new("test/model").with_pricing(crate::config::ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        });
        let mut chat = ChatManager::new(backend, config);
        chat.submit("one").await.unwrap();
        assert!((chat.estimated_cost() - 3.0).abs() < 1e-9);
    }
}

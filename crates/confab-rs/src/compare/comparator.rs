//! Concurrent fan-out across backends with a fan-in barrier and a
//! synthesis pass.
//!
//! Each backend invocation is spawned as an independent task that writes its
//! outcome into a pre-sized slot indexed by configuration position — no
//! shared append target, no locking during fan-out. The collect loop is the
//! barrier: a run's results are attached only once every task has terminated
//! (success or failure). Dropping the returned future mid-run aborts all
//! outstanding tasks and skips synthesis.

use crate::Message;
use crate::api::{ChatBackend, InvokeOptions};
use crate::compare::run::{BackendDescriptor, BackendResult, ComparisonRun, RunStatus};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Placeholder attached when the synthesis call itself fails. The run still
/// reaches `Complete` with its per-backend results intact.
pub const SYNTHESIS_UNAVAILABLE: &str =
    "[Synthesis unavailable: the synthesis call failed. Per-backend results are complete.]";

/// Deterministic synthesis text for a run with zero configured backends.
pub const NO_BACKENDS_SYNTHESIS: &str = "[No backends configured; nothing to compare.]";

/// Instruction for the synthesis pass.
const SYNTHESIS_PROMPT: &str = "\
You are given one query and the responses of several assistant backends, \
including any failures, with latency and token counts. Write a 2-3 sentence \
comparison covering response quality, speed, and which backend is the best \
fit for this kind of query. Respond with the comparison only.";

/// Dispatches one query to N backends concurrently and synthesizes a
/// verdict over the aggregate. Owns the history of completed runs.
pub struct Comparator {
    /// Backend used for the synthesis pass.
    synthesizer: Arc<dyn ChatBackend>,
    /// Options applied to every fan-out invocation.
    options: InvokeOptions,
    runs: Vec<ComparisonRun>,
}

impl Comparator {
    pub fn new(synthesizer: Arc<dyn ChatBackend>) -> Self {
        Self {
            synthesizer,
            options: InvokeOptions::new(),
            runs: Vec::new(),
        }
    }

    /// Set the generation options used for fan-out invocations.
    pub fn with_options(mut self, options: InvokeOptions) -> Self {
        self.options = options;
        self
    }

    // ── Compare ────────────────────────────────────────────────────

    /// Fan `query` out to `backends`, wait for every outcome, synthesize,
    /// and record the run.
    ///
    /// An empty or whitespace-only query is a no-op returning `None`. The
    /// returned run is always `Complete`: per-backend failures become error
    /// slots, and a synthesis failure degrades to
    /// [`SYNTHESIS_UNAVAILABLE`].
    pub async fn compare(
        &mut self,
        query: &str,
        backends: &[BackendDescriptor],
    ) -> Option<&ComparisonRun> {
        if query.trim().is_empty() {
            debug!("ignoring empty comparison query");
            return None;
        }

        let mut run = ComparisonRun::new(query);
        run.results = self.fan_out(query, backends).await;
        run.status = RunStatus::ResultsReady;
        info!(
            "comparison {}: {} backends, {} succeeded",
            run.id,
            run.results.len(),
            run.results.iter().filter(|r| r.is_success()).count(),
        );

        run.synthesis = Some(self.synthesize(&run, backends.is_empty()).await);
        run.status = RunStatus::Complete;

        self.runs.push(run);
        self.runs.last()
    }

    /// Spawn one task per backend and collect outcomes into slots indexed
    /// by configuration position. Returns when every task has terminated.
    async fn fan_out(&self, query: &str, backends: &[BackendDescriptor]) -> Vec<BackendResult> {
        let mut slots: Vec<Option<BackendResult>> = (0..backends.len()).map(|_| None).collect();
        let mut tasks: JoinSet<(usize, BackendResult)> = JoinSet::new();

        for (idx, descriptor) in backends.iter().enumerate() {
            let descriptor = descriptor.clone();
            let query = query.to_string();
            let options = self.options.clone();
            tasks.spawn(async move {
                let start = Instant::now();
                // Single-turn history: backends are independent and share no
                // conversation state.
                let history = vec![Message::user(query)];
                let result = match descriptor.backend.invoke(&history, &options).await {
                    Ok(reply) => BackendResult::success(
                        &descriptor,
                        reply.text,
                        start.elapsed(),
                        reply.input_tokens,
                        reply.output_tokens,
                    ),
                    Err(e) => BackendResult::failure(&descriptor, &e, start.elapsed()),
                };
                (idx, result)
            });
        }

        // Fan-in barrier: wait for all tasks, success or failure alike.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => warn!("fan-out task panicked: {e}"),
            }
        }

        // A panicked task leaves its slot empty; record it as a failure so
        // the result set always has one entry per configured backend.
        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    BackendResult::failure(
                        &backends[idx],
                        &crate::api::BackendError::Unreachable("backend task aborted".into()),
                        std::time::Duration::ZERO,
                    )
                })
            })
            .collect()
    }

    /// Run the synthesis pass over a results-ready run.
    async fn synthesize(&self, run: &ComparisonRun, no_backends: bool) -> String {
        if no_backends {
            return NO_BACKENDS_SYNTHESIS.to_string();
        }

        let options = InvokeOptions::new()
            .with_system_prompt(SYNTHESIS_PROMPT)
            .with_temperature(0.3);
        let request = vec![Message::user(run.render_results_block())];

        match self.synthesizer.invoke(&request, &options).await {
            Ok(reply) => reply.text,
            Err(e) => {
                warn!("synthesis call failed, attaching placeholder: {e}");
                SYNTHESIS_UNAVAILABLE.to_string()
            }
        }
    }

    // ── History ────────────────────────────────────────────────────

    /// Completed runs, oldest first.
    pub fn runs(&self) -> &[ComparisonRun] {
        &self.runs
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Discard all run history. Idempotent.
    pub fn clear_results(&mut self) {
        self.runs.clear();
    }

    /// Replace the run history (used when reloading persisted state).
    pub fn restore(&mut self, runs: Vec<ComparisonRun>) {
        self.runs = runs;
    }
}

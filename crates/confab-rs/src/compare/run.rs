//! Records produced by a comparison: per-backend results and the run itself.

use crate::api::{BackendError, ChatBackend};
use crate::generate_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ── Backend descriptor ─────────────────────────────────────────────

/// A configured comparison target: identity plus the capability to invoke
/// it. Immutable once constructed; shared read-only across runs.
#[derive(Clone)]
pub struct BackendDescriptor {
    /// Stable identifier, carried into results.
    pub id: String,
    /// Human-readable name used in results and the synthesis prompt.
    pub display_name: String,
    /// The endpoint capability.
    pub backend: Arc<dyn ChatBackend>,
}

impl BackendDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        backend: Arc<dyn ChatBackend>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            backend,
        }
    }
}

impl std::fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

// ── Per-backend result ─────────────────────────────────────────────

/// Outcome of one backend invocation within a run.
///
/// Exactly one of `response_text` / `error` is set. Created once, immutable
/// thereafter, owned by the run that requested it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendResult {
    pub backend_id: String,
    pub display_name: String,
    pub response_text: Option<String>,
    /// Wall-clock time of the invocation, recorded regardless of outcome.
    pub latency: Duration,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Rendered error for failed invocations.
    pub error: Option<String>,
}

impl BackendResult {
    pub fn success(
        descriptor: &BackendDescriptor,
        text: String,
        latency: Duration,
        input_tokens: u32,
        output_tokens: u32,
    ) -> Self {
        Self {
            backend_id: descriptor.id.clone(),
            display_name: descriptor.display_name.clone(),
            response_text: Some(text),
            latency,
            input_tokens,
            output_tokens,
            error: None,
        }
    }

    /// A failed invocation: zero token counts, error text set.
    pub fn failure(descriptor: &BackendDescriptor, error: &BackendError, latency: Duration) -> Self {
        Self {
            backend_id: descriptor.id.clone(),
            display_name: descriptor.display_name.clone(),
            response_text: None,
            latency,
            input_tokens: 0,
            output_tokens: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ── Comparison run ─────────────────────────────────────────────────

/// Lifecycle of a comparison run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created; fan-out not yet complete.
    Pending,
    /// All backend results collected, in configuration order.
    ResultsReady,
    /// Synthesis attached (real or placeholder).
    Complete,
}

/// One comparison: the query, every backend's outcome in configuration
/// order, and the synthesized verdict.
///
/// Mutated exactly twice after creation — results attached, then synthesis
/// attached — and immutable once `Complete`. Fields are crate-private so
/// only the comparator performs those two mutations; callers read through
/// the accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRun {
    pub(crate) id: String,
    pub(crate) query: String,
    /// Ordered by backend configuration position, not arrival order.
    pub(crate) results: Vec<BackendResult>,
    pub(crate) synthesis: Option<String>,
    pub(crate) status: RunStatus,
    pub(crate) created_at: DateTime<Utc>,
}

impl ComparisonRun {
    pub(crate) fn new(query: impl Into<String>) -> Self {
        Self {
            id: generate_id("run"),
            query: query.into(),
            results: Vec::new(),
            synthesis: None,
            status: RunStatus::Pending,
            created_at: Utc::now(),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Per-backend outcomes, ordered by configuration position.
    pub fn results(&self) -> &[BackendResult] {
        &self.results
    }

    pub fn synthesis(&self) -> Option<&str> {
        self.synthesis.as_deref()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Render the collected results as the synthesis-pass prompt body:
    /// one numbered entry per backend, in order, with either the response
    /// plus latency/token counts or the error message.
    pub fn render_results_block(&self) -> String {
        let mut block = format!("Query: {}\n", self.query);
        for (i, result) in self.results.iter().enumerate() {
            block.push_str(&format!("\n{}. {}\n", i + 1, result.display_name));
            match (&result.response_text, &result.error) {
                (Some(text), _) => {
                    block.push_str(&format!(
                        "Response: {text}\nLatency: {:.2}s, tokens: {} in / {} out\n",
                        result.latency.as_secs_f64(),
                        result.input_tokens,
                        result.output_tokens,
                    ));
                }
                (None, Some(error)) => {
                    block.push_str(&format!("Error: {error}\n"));
                }
                (None, None) => {
                    block.push_str("Error: no result recorded\n");
                }
            }
        }
        block
    }
}

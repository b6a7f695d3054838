//! Multi-backend comparison: fan one query out to several independent
//! backends, collect every outcome, and synthesize a verdict.
//!
//! - **[`run`]** — the immutable-after-completion records:
//!   [`BackendDescriptor`] (configured identity + endpoint capability),
//!   [`BackendResult`] (one per backend, success or error), and
//!   [`ComparisonRun`] with its `Pending → ResultsReady → Complete`
//!   lifecycle.
//!
//! - **[`comparator`]** — [`Comparator`], which runs the fan-out (one
//!   concurrent task per backend, each writing into its own
//!   configuration-indexed slot), waits at the fan-in barrier for all of
//!   them, and then makes one synthesis call over the aggregate.
//!
//! Failure isolation is absolute: one backend failing never cancels,
//! delays, or corrupts another's result, and a failed synthesis call
//! degrades to a placeholder string instead of discarding gathered results.

pub mod comparator;
pub mod run;

// Re-export commonly used items at the module level.
pub use comparator::{Comparator, NO_BACKENDS_SYNTHESIS, SYNTHESIS_UNAVAILABLE};
pub use run::{BackendDescriptor, BackendResult, ComparisonRun, RunStatus};

//! Typed failure taxonomy for backend invocations.

use thiserror::Error;

/// Everything that can go wrong talking to a backend.
///
/// Exactly one variant applies to any given failure:
///
/// - [`Unauthenticated`](Self::Unauthenticated) — the credential is missing
///   or invalid; re-sending the same request cannot succeed.
/// - [`Unreachable`](Self::Unreachable) — the request never produced an HTTP
///   response (DNS, connect, TLS, timeout). A per-backend timeout added by a
///   caller should map onto this variant so it flows through the same
///   isolation paths.
/// - [`Rejected`](Self::Rejected) — the backend answered with a non-success
///   status and an error body.
/// - [`Malformed`](Self::Malformed) — the backend answered, but the response
///   could not be decoded into the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("missing or invalid credential")]
    Unauthenticated,

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed backend response: {0}")]
    Malformed(String),
}

//! The backend client boundary: everything between the managers and a
//! concrete assistant endpoint.
//!
//! - [`error`] — the [`BackendError`] taxonomy: `Unauthenticated`,
//!   `Unreachable`, `Rejected(status, message)`, `Malformed`. Every failure
//!   a backend can produce maps onto exactly one of these.
//! - [`client`] — the [`ChatBackend`] trait (send a history, get a typed
//!   reply or error; stateless per call, no retries inside), plus
//!   [`OpenRouterBackend`], a concrete HTTP transport for OpenRouter-style
//!   chat completion APIs.
//!
//! Retry policy, if any, belongs to callers. Nothing above this boundary
//! knows how a backend is transported.

pub mod client;
pub mod error;

// Re-export commonly used items at the module level.
pub use client::{BackendReply, ChatBackend, InvokeOptions, OpenRouterBackend};
pub use error::BackendError;

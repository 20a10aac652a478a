//! Chat-completions transport layer for promptsplit.
//!
//! Everything the pipeline needs to talk to an unreliable LLM HTTP service:
//! message types, a backend trait, an OpenAI-compatible HTTP backend that
//! classifies every outcome into a single [`ErrorKind`], and a retry
//! coordinator with jittered exponential backoff.

pub mod error;
pub mod http;
pub mod retry;
pub mod types;

pub use error::{ErrorKind, LlmError};
pub use http::{ChatBackend, HttpParams};
pub use retry::{RetryPolicy, RetryStats, Retrier};
pub use types::{ChatRequest, LlmBackend, LlmResult, Message, Role};

//! promptsplit: a resilient LLM pipeline that decomposes a large prompt into
//! subsystems, sub-prompts, generated code, and an agent DSL.
//!
//! The work lives in the member crates; this crate hosts the CLI and
//! re-exports the pieces embedders need.

pub mod cli;
pub mod logging;

pub use promptsplit_config::Config;
pub use promptsplit_engine::{
    Pipeline, PipelineReport, ProgressSink, StageContext, StageEnv, StageId,
};
pub use promptsplit_llm::{
    ChatBackend, ChatRequest, LlmBackend, LlmError, LlmResult, Retrier, RetryPolicy,
};

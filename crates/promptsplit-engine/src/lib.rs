//! Pipeline engine for promptsplit.
//!
//! Hosts the offline text chunker, the order-preserving concurrent
//! dispatcher, the seven pipeline stages, and the orchestrator that threads a
//! [`StageContext`] through them with progress reporting and per-stage
//! artifact files.

pub mod artifacts;
pub mod chunker;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod stage;
pub mod stages;

pub use chunker::split;
pub use context::{
    CodegenEntry, CodegenOutcome, DslEntry, DslOutcome, StageContext, SubPrompt, Subsystem,
    TestCase,
};
pub use dispatcher::map_ordered;
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineReport};
pub use progress::{NullSink, ProgressSink, TracingSink};
pub use stage::{Stage, StageEnv, StageId};

//! Stage abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use promptsplit_config::Config;
use promptsplit_llm::{ChatRequest, Message, Retrier};

use crate::context::StageContext;
use crate::error::PipelineError;

/// Identity of each pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    ExtractVariables,
    AnnotateText,
    GenerateDiagram,
    SplitSubsystems,
    GenerateSubPrompts,
    GenerateCode,
    ConvertToDsl,
}

impl StageId {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::ExtractVariables => "extract_variables",
            StageId::AnnotateText => "annotate_text",
            StageId::GenerateDiagram => "generate_diagram",
            StageId::SplitSubsystems => "split_subsystems",
            StageId::GenerateSubPrompts => "generate_sub_prompts",
            StageId::GenerateCode => "generate_code",
            StageId::ConvertToDsl => "convert_to_dsl",
        }
    }

    /// The standard execution order.
    #[must_use]
    pub fn all() -> [StageId; 7] {
        [
            StageId::ExtractVariables,
            StageId::AnnotateText,
            StageId::GenerateDiagram,
            StageId::SplitSubsystems,
            StageId::GenerateSubPrompts,
            StageId::GenerateCode,
            StageId::ConvertToDsl,
        ]
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared environment handed to every stage.
#[derive(Clone)]
pub struct StageEnv {
    pub retrier: Retrier,
    pub chunk_size: usize,
    pub max_workers: usize,
    pub timeout: Duration,
    pub codegen_enabled: bool,
    pub test_case_count: u32,
}

impl StageEnv {
    pub fn new(retrier: Retrier, config: &Config) -> Self {
        Self {
            retrier,
            chunk_size: config.chunk_size,
            max_workers: config.max_workers,
            timeout: config.timeout(),
            codegen_enabled: config.codegen.enabled,
            test_case_count: config.codegen.test_case_count,
        }
    }

    /// Build a request carrying the environment's timeout.
    #[must_use]
    pub fn request(&self, messages: Vec<Message>) -> ChatRequest {
        ChatRequest::new(messages).with_timeout(self.timeout)
    }
}

/// One pipeline stage.
///
/// `run` mutates the context in place and returns the payload attached to the
/// stage's 100% progress event.
#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    async fn run(&self, ctx: &mut StageContext, env: &StageEnv)
    -> Result<Value, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(StageId::ExtractVariables.as_str(), "extract_variables");
        assert_eq!(StageId::ConvertToDsl.as_str(), "convert_to_dsl");
        let names: Vec<&str> = StageId::all().iter().map(StageId::as_str).collect();
        assert_eq!(names.len(), 7);
        let unique: std::collections::HashSet<&&str> = names.iter().collect();
        assert_eq!(unique.len(), 7);
    }

    #[test]
    fn stage_id_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StageId::GenerateSubPrompts).unwrap(),
            "\"generate_sub_prompts\""
        );
    }
}

//! Variable extraction over concurrent chunks.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use promptsplit_llm::{LlmError, Message};

use crate::chunker;
use crate::context::StageContext;
use crate::dispatcher::map_ordered;
use crate::error::PipelineError;
use crate::stage::{Stage, StageEnv, StageId};
use crate::stages::prompts;

pub struct ExtractVariablesStage;

#[async_trait]
impl Stage for ExtractVariablesStage {
    fn id(&self) -> StageId {
        StageId::ExtractVariables
    }

    async fn run(
        &self,
        ctx: &mut StageContext,
        env: &StageEnv,
    ) -> Result<Value, PipelineError> {
        let chunks = chunker::split(&ctx.input_text, env.chunk_size)?;
        let chunk_count = chunks.len();
        debug!(chunk_count, "dispatching variable extraction");

        let retrier = env.retrier.clone();
        let timeout = env.timeout;
        let per_chunk: Vec<Vec<String>> =
            map_ordered(chunks, env.max_workers, move |_, chunk: String| {
                let retrier = retrier.clone();
                async move {
                    let request = promptsplit_llm::ChatRequest::new(vec![
                        Message::system(prompts::VARIABLE_EXTRACTION),
                        Message::user(chunk),
                    ])
                    .with_timeout(timeout);
                    let result = retrier.call(request).await?;
                    Ok::<_, LlmError>(promptsplit_extraction::extract_variable_names(
                        &result.content,
                    ))
                }
            })
            .await;

        // Flatten in chunk order, first occurrence wins.
        let mut variables: Vec<String> = Vec::new();
        for name in per_chunk.into_iter().flatten() {
            if !variables.contains(&name) {
                variables.push(name);
            }
        }

        debug!(variables = variables.len(), "variable extraction complete");
        ctx.variables = variables;

        Ok(json!({
            "chunks": chunk_count,
            "variables": ctx.variables,
        }))
    }
}

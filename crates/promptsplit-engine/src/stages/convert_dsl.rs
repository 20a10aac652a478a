//! Agent DSL conversion with the code-coverage skip rule.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use promptsplit_llm::{LlmError, Message};

use crate::context::{DslEntry, DslOutcome, StageContext, SubPrompt};
use crate::dispatcher::map_ordered;
use crate::error::PipelineError;
use crate::stage::{Stage, StageEnv, StageId};
use crate::stages::prompts;

pub struct ConvertToDslStage;

/// True for sub-prompt `index` when code generation produced a non-empty
/// implementation for it.
fn covered_by_code(ctx: &StageContext, index: usize) -> bool {
    ctx.codegen
        .as_ref()
        .and_then(|outcome| outcome.entries.get(index))
        .is_some_and(crate::context::CodegenEntry::has_code)
}

#[async_trait]
impl Stage for ConvertToDslStage {
    fn id(&self) -> StageId {
        StageId::ConvertToDsl
    }

    async fn run(
        &self,
        ctx: &mut StageContext,
        env: &StageEnv,
    ) -> Result<Value, PipelineError> {
        let total = ctx.subprompts.len();
        let work: Vec<(usize, SubPrompt)> = ctx
            .subprompts
            .iter()
            .cloned()
            .enumerate()
            .filter(|(index, _)| !covered_by_code(ctx, *index))
            .collect();
        let skipped_count = total - work.len();
        let processed = work.len();
        debug!(total, processed, skipped_count, "dispatching DSL conversion");

        let retrier = env.retrier.clone();
        let timeout = env.timeout;
        let results: Vec<DslEntry> = map_ordered(
            work,
            env.max_workers,
            move |_, (index, subprompt): (usize, SubPrompt)| {
                let retrier = retrier.clone();
                async move {
                    let request = promptsplit_llm::ChatRequest::new(vec![
                        Message::system(prompts::DSL_CONVERSION),
                        Message::user(prompts::DSL_EXAMPLE_INPUT),
                        Message::assistant(prompts::DSL_EXAMPLE_OUTPUT),
                        Message::user(prompts::frame_input(&subprompt.prompt)),
                    ])
                    .with_timeout(timeout);
                    let result = retrier.call(request).await?;
                    Ok::<_, LlmError>(DslEntry {
                        index,
                        name: subprompt.name,
                        dsl: promptsplit_extraction::extract_agent_block(&result.content),
                    })
                }
            },
        )
        .await;

        // Failed slots come back as defaults with an empty dsl field.
        let entries: Vec<DslEntry> = results
            .into_iter()
            .filter(|entry| !entry.dsl.trim().is_empty())
            .collect();
        let success_count = entries.len();
        let failed_count = processed - success_count;

        debug!(success_count, failed_count, skipped_count, "DSL conversion complete");
        let payload = json!({
            "processed": processed,
            "success_count": success_count,
            "failed_count": failed_count,
            "skipped_count": skipped_count,
        });
        ctx.dsl = Some(DslOutcome {
            entries,
            success_count,
            failed_count,
            skipped_count,
        });
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CodegenEntry, CodegenOutcome};

    fn ctx_with_codegen(codes: &[&str]) -> StageContext {
        let mut ctx = StageContext::new("input");
        ctx.subprompts = (0..codes.len())
            .map(|i| SubPrompt {
                name: format!("sub{i}"),
                prompt: format!("prompt {i}"),
                ..SubPrompt::default()
            })
            .collect();
        ctx.codegen = Some(CodegenOutcome::from_entries(
            codes
                .iter()
                .enumerate()
                .map(|(i, code)| CodegenEntry {
                    name: format!("sub{i}"),
                    is_implementable: !code.is_empty(),
                    code: (*code).to_string(),
                    ..CodegenEntry::default()
                })
                .collect(),
        ));
        ctx
    }

    #[test]
    fn coverage_follows_generated_code() {
        let ctx = ctx_with_codegen(&["", "def run(): pass", ""]);
        assert!(!covered_by_code(&ctx, 0));
        assert!(covered_by_code(&ctx, 1));
        assert!(!covered_by_code(&ctx, 2));
    }

    #[test]
    fn no_codegen_outcome_means_nothing_is_covered() {
        let mut ctx = StageContext::new("input");
        ctx.subprompts = vec![SubPrompt::default(); 3];
        assert!(!covered_by_code(&ctx, 0));
        assert!(!covered_by_code(&ctx, 2));
    }

    #[test]
    fn disabled_codegen_covers_nothing() {
        let mut ctx = StageContext::new("input");
        ctx.subprompts = vec![SubPrompt::default(); 2];
        ctx.codegen = Some(CodegenOutcome::disabled());
        assert!(!covered_by_code(&ctx, 0));
        assert!(!covered_by_code(&ctx, 1));
    }
}

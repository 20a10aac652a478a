//! Optional code generation: judge, implement, then write test cases.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use promptsplit_llm::{LlmError, Message, Retrier};

use crate::context::{CodegenEntry, CodegenOutcome, StageContext, SubPrompt, TestCase};
use crate::dispatcher::map_ordered;
use crate::error::PipelineError;
use crate::stage::{Stage, StageEnv, StageId};
use crate::stages::prompts;

pub struct GenerateCodeStage;

#[async_trait]
impl Stage for GenerateCodeStage {
    fn id(&self) -> StageId {
        StageId::GenerateCode
    }

    async fn run(
        &self,
        ctx: &mut StageContext,
        env: &StageEnv,
    ) -> Result<Value, PipelineError> {
        if !env.codegen_enabled {
            debug!("code generation disabled, recording empty outcome");
            ctx.codegen = Some(CodegenOutcome::disabled());
            return Ok(json!({"enabled": false, "total": 0}));
        }

        let retrier = env.retrier.clone();
        let timeout = env.timeout;
        let test_case_count = env.test_case_count;
        let entries: Vec<CodegenEntry> = map_ordered(
            ctx.subprompts.clone(),
            env.max_workers,
            move |_, subprompt: SubPrompt| {
                let retrier = retrier.clone();
                async move {
                    // Per-entry failures are recorded on the entry, never
                    // propagated; the batch always completes.
                    Ok::<_, LlmError>(
                        generate_for_subprompt(&retrier, timeout, test_case_count, subprompt)
                            .await,
                    )
                }
            },
        )
        .await;

        let outcome = CodegenOutcome::from_entries(entries);
        debug!(
            total = outcome.total,
            implementable = outcome.implementable_count,
            successful = outcome.successful_count,
            failed = outcome.failed_count,
            "code generation complete"
        );

        let payload = json!({
            "enabled": true,
            "total": outcome.total,
            "implementable_count": outcome.implementable_count,
            "successful_count": outcome.successful_count,
            "failed_count": outcome.failed_count,
        });
        ctx.codegen = Some(outcome);
        Ok(payload)
    }
}

/// Judge implementability, then generate code, then test cases. Sub-step
/// failures stop the chain for this entry and land in `entry.error`.
async fn generate_for_subprompt(
    retrier: &Retrier,
    timeout: Duration,
    test_case_count: u32,
    subprompt: SubPrompt,
) -> CodegenEntry {
    let mut entry = CodegenEntry {
        name: subprompt.name.clone(),
        ..CodegenEntry::default()
    };

    let judge_request = promptsplit_llm::ChatRequest::new(vec![
        Message::system(prompts::JUDGE_IMPLEMENTABLE),
        Message::user(prompts::frame_input(&subprompt.prompt)),
    ])
    .with_timeout(timeout);

    match retrier.call(judge_request).await {
        Ok(result) => {
            let Some(value) =
                promptsplit_extraction::extract(&result.content, "is_implementable")
            else {
                entry.error = Some("unrecoverable judge response".to_string());
                return entry;
            };
            entry.is_implementable = value["is_implementable"].as_bool().unwrap_or(false);
            entry.reason = value["reason"].as_str().unwrap_or_default().to_string();
            entry.annotation = value["annotation"].as_str().unwrap_or_default().to_string();
        }
        Err(err) => {
            entry.error = Some(format!("judge call failed: {err}"));
            return entry;
        }
    }

    if !entry.is_implementable {
        return entry;
    }

    let code_request = promptsplit_llm::ChatRequest::new(vec![
        Message::system(prompts::GENERATE_CODE),
        Message::user(prompts::frame_input(&subprompt.prompt)),
    ])
    .with_timeout(timeout);

    match retrier.call(code_request).await {
        Ok(result) => {
            match promptsplit_extraction::extract_fenced_block(&result.content, "python") {
                Some(code) => entry.code = code,
                None => entry.error = Some("no code block in response".to_string()),
            }
        }
        Err(err) => entry.error = Some(format!("code call failed: {err}")),
    }

    if !entry.has_code() {
        return entry;
    }

    let cases_request = promptsplit_llm::ChatRequest::new(vec![
        Message::system(prompts::GENERATE_TEST_CASES),
        Message::user(format!(
            "Write {test_case_count} test cases for this module:\n```python\n{}\n```",
            entry.code
        )),
    ])
    .with_timeout(timeout);

    // Missing test cases never void working code.
    match retrier.call(cases_request).await {
        Ok(result) => {
            if let Some(value) = promptsplit_extraction::extract(&result.content, "test_cases")
            {
                entry.test_cases =
                    serde_json::from_value::<Vec<TestCase>>(value["test_cases"].clone())
                        .unwrap_or_default();
            }
        }
        Err(err) => warn!(name = %entry.name, error = %err, "test case call failed"),
    }

    entry
}

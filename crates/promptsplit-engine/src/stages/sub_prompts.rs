//! Standalone sub-prompt generation.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use promptsplit_llm::Message;

use crate::context::{StageContext, SubPrompt};
use crate::error::PipelineError;
use crate::stage::{Stage, StageEnv, StageId};
use crate::stages::prompts;

pub struct GenerateSubPromptsStage;

#[async_trait]
impl Stage for GenerateSubPromptsStage {
    fn id(&self) -> StageId {
        StageId::GenerateSubPrompts
    }

    async fn run(
        &self,
        ctx: &mut StageContext,
        env: &StageEnv,
    ) -> Result<Value, PipelineError> {
        let subsystems_json = serde_json::to_string_pretty(&ctx.subsystems)
            .map_err(|e| PipelineError::Payload(format!("serializing subsystems: {e}")))?;
        let user_content = format!(
            "Subsystems:\n{subsystems_json}\n\nCollaboration:\n{}\n\nOriginal prompt:\n{}",
            ctx.collaboration,
            prompts::frame_input(&ctx.annotated_text),
        );

        let request = env.request(vec![
            Message::system(prompts::SUB_PROMPTS),
            Message::user(user_content),
        ]);
        let result = env.retrier.call(request).await?;

        let value = promptsplit_extraction::extract(&result.content, "subprompts")
            .ok_or(PipelineError::Recovery {
                required_key: "subprompts",
            })?;

        let subprompts: Vec<SubPrompt> = serde_json::from_value(value["subprompts"].clone())
            .map_err(|e| PipelineError::Payload(format!("subprompts list: {e}")))?;
        if subprompts.is_empty() {
            return Err(PipelineError::Payload(
                "model returned an empty subprompts list".to_string(),
            ));
        }

        debug!(count = subprompts.len(), "sub-prompt generation complete");
        ctx.subprompts = subprompts;

        Ok(json!({
            "subprompt_count": ctx.subprompts.len(),
        }))
    }
}

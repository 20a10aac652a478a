//! Subsystem decomposition.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use promptsplit_llm::Message;

use crate::context::{StageContext, Subsystem};
use crate::error::PipelineError;
use crate::stage::{Stage, StageEnv, StageId};
use crate::stages::prompts;

pub struct SplitSubsystemsStage;

#[async_trait]
impl Stage for SplitSubsystemsStage {
    fn id(&self) -> StageId {
        StageId::SplitSubsystems
    }

    async fn run(
        &self,
        ctx: &mut StageContext,
        env: &StageEnv,
    ) -> Result<Value, PipelineError> {
        let request = env.request(vec![
            Message::system(prompts::SPLIT_SUBSYSTEMS),
            Message::user(prompts::frame_input(&ctx.annotated_text)),
        ]);
        let result = env.retrier.call(request).await?;

        let value = promptsplit_extraction::extract(&result.content, "subsystems")
            .ok_or(PipelineError::Recovery {
                required_key: "subsystems",
            })?;

        let subsystems: Vec<Subsystem> = serde_json::from_value(value["subsystems"].clone())
            .map_err(|e| PipelineError::Payload(format!("subsystems list: {e}")))?;
        if subsystems.is_empty() {
            return Err(PipelineError::Payload(
                "model returned an empty subsystems list".to_string(),
            ));
        }
        let collaboration = value["collaboration"].as_str().unwrap_or_default().to_string();

        debug!(count = subsystems.len(), "subsystem split complete");
        ctx.subsystems = subsystems;
        ctx.collaboration = collaboration;

        Ok(json!({
            "subsystem_count": ctx.subsystems.len(),
            "subsystems": ctx.subsystems.iter().map(|s| s.name.clone()).collect::<Vec<_>>(),
        }))
    }
}

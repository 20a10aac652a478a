//! Mermaid diagram generation.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use promptsplit_llm::Message;

use crate::context::StageContext;
use crate::error::PipelineError;
use crate::stage::{Stage, StageEnv, StageId};
use crate::stages::prompts;

pub struct GenerateDiagramStage;

#[async_trait]
impl Stage for GenerateDiagramStage {
    fn id(&self) -> StageId {
        StageId::GenerateDiagram
    }

    async fn run(
        &self,
        ctx: &mut StageContext,
        env: &StageEnv,
    ) -> Result<Value, PipelineError> {
        let request = env.request(vec![
            Message::system(prompts::DIAGRAM),
            Message::user(prompts::frame_input(&ctx.annotated_text)),
        ]);

        // A missing diagram never blocks the split that follows.
        let diagram = match env.retrier.call(request).await {
            Ok(result) => {
                let extracted =
                    promptsplit_extraction::extract_mermaid_block(&result.content);
                if extracted.is_none() {
                    warn!("no mermaid block in diagram response");
                }
                extracted.unwrap_or_default()
            }
            Err(err) => {
                warn!(error = %err, "diagram call failed, continuing without one");
                String::new()
            }
        };

        let found = !diagram.is_empty();
        debug!(found, "diagram stage complete");
        ctx.diagram = diagram;

        Ok(json!({
            "diagram_found": found,
            "diagram_chars": ctx.diagram.len(),
        }))
    }
}

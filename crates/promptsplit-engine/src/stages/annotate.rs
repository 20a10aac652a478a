//! Variable annotation and LLM cleanup of the annotated text.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::cmp::Reverse;
use tracing::{debug, warn};

use promptsplit_llm::Message;

use crate::context::StageContext;
use crate::error::PipelineError;
use crate::stage::{Stage, StageEnv, StageId};
use crate::stages::prompts;

pub struct AnnotateTextStage;

/// Wrap every occurrence of each variable in braces, longest names first so
/// a name containing another gets wrapped as a whole. Occurrences already
/// inside a brace span are left alone.
#[must_use]
pub fn annotate(text: &str, variables: &[String]) -> String {
    let mut names: Vec<&String> = variables.iter().filter(|v| !v.is_empty()).collect();
    names.sort_by_key(|v| Reverse(v.len()));

    let mut annotated = text.to_string();
    for name in names {
        annotated = wrap_occurrences(&annotated, name);
    }
    annotated
}

fn wrap_occurrences(text: &str, name: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut rest = text;
    let mut depth = 0i32;

    while let Some(pos) = rest.find(name) {
        let before = &rest[..pos];
        for c in before.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth = (depth - 1).max(0),
                _ => {}
            }
        }
        out.push_str(before);

        if depth > 0 {
            out.push_str(name);
        } else {
            out.push('{');
            out.push_str(name);
            out.push('}');
        }
        rest = &rest[pos + name.len()..];
    }
    out.push_str(rest);
    out
}

#[async_trait]
impl Stage for AnnotateTextStage {
    fn id(&self) -> StageId {
        StageId::AnnotateText
    }

    async fn run(
        &self,
        ctx: &mut StageContext,
        env: &StageEnv,
    ) -> Result<Value, PipelineError> {
        let annotated = annotate(&ctx.input_text, &ctx.variables);

        // Cleanup is best-effort: any failure keeps the mechanical
        // annotation unchanged.
        let request = env.request(vec![
            Message::system(prompts::POST_PROCESS),
            Message::user(prompts::frame_input(&annotated)),
        ]);
        let cleaned = match env.retrier.call(request).await {
            Ok(result) => promptsplit_extraction::extract(&result.content, "cleaned_text")
                .and_then(|v| v["cleaned_text"].as_str().map(ToString::to_string)),
            Err(err) => {
                warn!(error = %err, "annotation cleanup call failed, keeping raw annotation");
                None
            }
        };

        let post_processed = cleaned.is_some();
        ctx.annotated_text = cleaned.unwrap_or(annotated);

        debug!(
            post_processed,
            chars = ctx.annotated_text.len(),
            "annotation complete"
        );
        Ok(json!({
            "post_processed": post_processed,
            "annotated_chars": ctx.annotated_text.len(),
        }))
    }
}

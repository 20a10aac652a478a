//! Sequential pipeline orchestration.
//!
//! Stages run in order against one mutable [`StageContext`]. Every stage
//! reports 0% at start and 100% at completion through the progress sink; a
//! failure halts the run, reports through [`ProgressSink::on_error`], and the
//! partial context comes back with the report.

use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::artifacts;
use crate::context::StageContext;
use crate::progress::{ProgressSink, TracingSink};
use crate::stage::{Stage, StageEnv, StageId};
use crate::stages::default_stages;

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    /// Everything produced before the run ended, success or not
    pub context: StageContext,
    pub completed: Vec<StageId>,
    /// The stage that halted the run, with its error text
    pub failed: Option<(StageId, String)>,
    /// Sub-prompts the DSL stage bypassed because code already covered them
    pub dsl_skipped: usize,
    /// Path of the aggregate result file, when artifacts were written
    pub result_path: Option<Utf8PathBuf>,
}

impl PipelineReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

/// The stage orchestrator.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    env: StageEnv,
    sink: Arc<dyn ProgressSink>,
    artifact_dir: Option<Utf8PathBuf>,
}

impl Pipeline {
    /// Standard pipeline: all seven stages, log-backed progress, no artifact
    /// files.
    #[must_use]
    pub fn new(env: StageEnv) -> Self {
        Self {
            stages: default_stages(),
            env,
            sink: Arc::new(TracingSink),
            artifact_dir: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl AsRef<Utf8Path>) -> Self {
        self.artifact_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Replace the stage list; used by tests and partial reruns.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<Box<dyn Stage>>) -> Self {
        self.stages = stages;
        self
    }

    /// Run every stage in order against `input_text`.
    pub async fn run(&self, input_text: impl Into<String>) -> PipelineReport {
        let mut ctx = StageContext::new(input_text);
        let mut completed = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let id = stage.id();
            let name = id.as_str();
            self.sink.on_progress(name, 0, "started", None);

            let payload = match stage.run(&mut ctx, &self.env).await {
                Ok(payload) => payload,
                Err(err) => {
                    let err = err.in_stage(id);
                    let message = err.to_string();
                    warn!(stage = name, error = %message, "pipeline halted");
                    self.sink.on_error(name, &message);
                    return self.report(ctx, completed, Some((id, message)), None);
                }
            };

            if let Some(dir) = &self.artifact_dir
                && let Err(err) = artifacts::write_stage_artifact(dir, id, &ctx)
            {
                let err = err.in_stage(id);
                let message = err.to_string();
                self.sink.on_error(name, &message);
                return self.report(ctx, completed, Some((id, message)), None);
            }

            self.sink.on_progress(name, 100, "completed", Some(&payload));
            completed.push(id);
        }

        let result_path = if let Some(dir) = &self.artifact_dir {
            match artifacts::write_aggregate(dir, &ctx, &completed) {
                Ok(path) => Some(path),
                Err(err) => {
                    let message = err.to_string();
                    self.sink.on_error("aggregate", &message);
                    let last = completed.last().copied().unwrap_or(StageId::ConvertToDsl);
                    return self.report(ctx, completed, Some((last, message)), None);
                }
            }
        } else {
            None
        };

        info!(stages = completed.len(), "pipeline complete");
        self.report(ctx, completed, None, result_path)
    }

    fn report(
        &self,
        context: StageContext,
        completed: Vec<StageId>,
        failed: Option<(StageId, String)>,
        result_path: Option<Utf8PathBuf>,
    ) -> PipelineReport {
        let dsl_skipped = context.dsl.as_ref().map_or(0, |d| d.skipped_count);
        PipelineReport {
            context,
            completed,
            failed,
            dsl_skipped,
            result_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::progress::test_support::RecordingSink;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use promptsplit_config::Config;
    use promptsplit_llm::{
        ChatRequest, LlmBackend, LlmError, LlmResult, Retrier, RetryPolicy,
    };

    struct UnusedBackend;

    #[async_trait]
    impl LlmBackend for UnusedBackend {
        async fn invoke(&self, _request: ChatRequest) -> Result<LlmResult, LlmError> {
            Err(LlmError::Unknown("not expected to be called".to_string()))
        }
    }

    fn env() -> StageEnv {
        StageEnv::new(
            Retrier::new(Arc::new(UnusedBackend), RetryPolicy::default()),
            &Config::default(),
        )
    }

    /// Stage that records its name into the variables list.
    struct MarkStage(StageId);

    #[async_trait]
    impl Stage for MarkStage {
        fn id(&self) -> StageId {
            self.0
        }

        async fn run(
            &self,
            ctx: &mut StageContext,
            _env: &StageEnv,
        ) -> Result<Value, PipelineError> {
            ctx.variables.push(self.0.as_str().to_string());
            Ok(json!({"stage": self.0.as_str()}))
        }
    }

    /// Stage that always fails.
    struct FailStage(StageId);

    #[async_trait]
    impl Stage for FailStage {
        fn id(&self) -> StageId {
            self.0
        }

        async fn run(
            &self,
            _ctx: &mut StageContext,
            _env: &StageEnv,
        ) -> Result<Value, PipelineError> {
            Err(PipelineError::Payload("scripted failure".to_string()))
        }
    }

    #[tokio::test]
    async fn stages_run_in_order_with_progress_bookends() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Pipeline::new(env())
            .with_stages(vec![
                Box::new(MarkStage(StageId::ExtractVariables)),
                Box::new(MarkStage(StageId::AnnotateText)),
            ])
            .with_sink(Arc::clone(&sink) as Arc<dyn ProgressSink>);

        let report = pipeline.run("input").await;
        assert!(report.is_success());
        assert_eq!(
            report.completed,
            vec![StageId::ExtractVariables, StageId::AnnotateText]
        );
        assert_eq!(
            report.context.variables,
            vec!["extract_variables", "annotate_text"]
        );

        let events = sink.events.lock().unwrap();
        let expected = [
            ("extract_variables", 0),
            ("extract_variables", 100),
            ("annotate_text", 0),
            ("annotate_text", 100),
        ];
        assert_eq!(events.len(), expected.len());
        for ((stage, percent), (want_stage, want_percent)) in events
            .iter()
            .map(|(s, p, _)| (s.as_str(), *p))
            .zip(expected)
        {
            assert_eq!(stage, want_stage);
            assert_eq!(percent, want_percent);
        }
    }

    #[tokio::test]
    async fn failure_halts_and_preserves_partial_context() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Pipeline::new(env())
            .with_stages(vec![
                Box::new(MarkStage(StageId::ExtractVariables)),
                Box::new(FailStage(StageId::SplitSubsystems)),
                Box::new(MarkStage(StageId::ConvertToDsl)),
            ])
            .with_sink(Arc::clone(&sink) as Arc<dyn ProgressSink>);

        let report = pipeline.run("input").await;
        assert!(!report.is_success());
        let (stage, message) = report.failed.as_ref().unwrap();
        assert_eq!(*stage, StageId::SplitSubsystems);
        assert!(message.contains("scripted failure"));

        // Work from before the failure survives; nothing after ran.
        assert_eq!(report.completed, vec![StageId::ExtractVariables]);
        assert_eq!(report.context.variables, vec!["extract_variables"]);

        let errors = sink.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "split_subsystems");
    }

    #[tokio::test]
    async fn artifacts_are_written_per_stage_and_aggregated() {
        let dir = tempfile::tempdir().unwrap();
        let dir_path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        let pipeline = Pipeline::new(env())
            .with_stages(vec![Box::new(MarkStage(StageId::ExtractVariables))])
            .with_artifact_dir(&dir_path);

        let report = pipeline.run("input").await;
        assert!(report.is_success());
        assert!(dir_path.join("variables.json").exists());
        let result_path = report.result_path.unwrap();
        assert!(result_path.exists());
    }
}

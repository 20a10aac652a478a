//! Engine error types.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::stage::StageId;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("chunker: max_size must be greater than zero")]
    ZeroChunkSize,

    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: StageId,
        #[source]
        source: Box<PipelineError>,
    },

    #[error(transparent)]
    Llm(#[from] promptsplit_llm::LlmError),

    #[error("could not recover JSON with key {required_key:?} from model output")]
    Recovery { required_key: &'static str },

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("failed to write {path}: {source}")]
    ArtifactWrite {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Wrap a failure with the stage it occurred in.
    #[must_use]
    pub fn in_stage(self, stage: StageId) -> Self {
        PipelineError::Stage {
            stage,
            source: Box::new(self),
        }
    }
}

//! The seven pipeline stages.

pub mod annotate;
pub mod convert_dsl;
pub mod diagram;
pub mod extract_variables;
pub mod generate_code;
pub mod prompts;
pub mod split_subsystems;
pub mod sub_prompts;

pub use annotate::AnnotateTextStage;
pub use convert_dsl::ConvertToDslStage;
pub use diagram::GenerateDiagramStage;
pub use extract_variables::ExtractVariablesStage;
pub use generate_code::GenerateCodeStage;
pub use split_subsystems::SplitSubsystemsStage;
pub use sub_prompts::GenerateSubPromptsStage;

use crate::stage::Stage;

/// The standard stage sequence.
#[must_use]
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ExtractVariablesStage),
        Box::new(AnnotateTextStage),
        Box::new(GenerateDiagramStage),
        Box::new(SplitSubsystemsStage),
        Box::new(GenerateSubPromptsStage),
        Box::new(GenerateCodeStage),
        Box::new(ConvertToDslStage),
    ]
}

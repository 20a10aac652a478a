//! Mutable state threaded through the pipeline stages.

use serde::{Deserialize, Serialize};

/// One subsystem from the split stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subsystem {
    pub name: String,
    pub contained_modules: Vec<String>,
    pub responsibility: String,
    pub independence: String,
}

/// One generated sub-prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPrompt {
    pub name: String,
    pub prompt: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// One test case attached to a generated implementation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCase {
    pub input_code: String,
    pub expected_output: String,
}

/// Per-sub-prompt outcome of the code-generation stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenEntry {
    pub name: String,
    pub is_implementable: bool,
    /// Generated source; empty when not implementable or generation failed
    pub code: String,
    pub test_cases: Vec<TestCase>,
    pub annotation: String,
    pub reason: String,
    pub error: Option<String>,
}

impl CodegenEntry {
    /// The skip rule keys off this: a subsystem with generated code is not
    /// converted to DSL.
    #[must_use]
    pub fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

/// Code-generation stage result: entries in sub-prompt order plus summary
/// counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOutcome {
    pub enabled: bool,
    pub entries: Vec<CodegenEntry>,
    pub total: usize,
    pub implementable_count: usize,
    pub successful_count: usize,
    pub failed_count: usize,
}

impl CodegenOutcome {
    /// The disabled outcome: zero processed, no entries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Derive summary counts from the entries.
    #[must_use]
    pub fn from_entries(entries: Vec<CodegenEntry>) -> Self {
        let total = entries.len();
        let implementable_count = entries.iter().filter(|e| e.is_implementable).count();
        let successful_count = entries.iter().filter(|e| e.has_code()).count();
        let failed_count = entries
            .iter()
            .filter(|e| e.is_implementable && !e.has_code())
            .count();
        Self {
            enabled: true,
            entries,
            total,
            implementable_count,
            successful_count,
            failed_count,
        }
    }
}

/// One successful DSL conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DslEntry {
    /// Index into the sub-prompt list
    pub index: usize,
    pub name: String,
    pub dsl: String,
}

/// DSL conversion stage result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DslOutcome {
    pub entries: Vec<DslEntry>,
    pub success_count: usize,
    pub failed_count: usize,
    /// Sub-prompts bypassed because code generation already covered them
    pub skipped_count: usize,
}

/// Everything the stages have produced so far.
///
/// Stages read their predecessors' fields and write their own; the pipeline
/// returns the context even when a stage fails, so partial progress is never
/// lost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageContext {
    pub input_text: String,
    pub variables: Vec<String>,
    pub annotated_text: String,
    pub diagram: String,
    pub subsystems: Vec<Subsystem>,
    pub collaboration: String,
    pub subprompts: Vec<SubPrompt>,
    pub codegen: Option<CodegenOutcome>,
    pub dsl: Option<DslOutcome>,
}

impl StageContext {
    #[must_use]
    pub fn new(input_text: impl Into<String>) -> Self {
        Self {
            input_text: input_text.into(),
            ..Self::default()
        }
    }
}

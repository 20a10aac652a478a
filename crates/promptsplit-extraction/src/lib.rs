//! Recovery of structured data from malformed LLM output.
//!
//! Models rarely return clean JSON. This crate hosts the ordered recovery
//! ladder ([`recovery::extract`]) plus the smaller extractors the pipeline
//! needs: fenced code blocks, agent DSL blocks, and variable arrays.

pub mod dsl;
pub mod fences;
pub mod recovery;
pub mod variables;

pub use dsl::extract_agent_block;
pub use fences::{extract_fenced_block, extract_mermaid_block};
pub use recovery::{extract, repair_json_text};
pub use variables::extract_variable_names;

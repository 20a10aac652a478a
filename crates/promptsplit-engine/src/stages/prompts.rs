//! System prompt templates for the pipeline stages.
//!
//! Each template pins the exact output shape its stage's extractor expects;
//! loosening a template here usually means a recovery-ladder fallback there.

/// Chunk-level variable extraction. Output: JSON array of `{"text": ...}`.
pub const VARIABLE_EXTRACTION: &str = r#"You identify template variables in prompt text.

A variable is a concrete value the prompt author would want to substitute per
run: names, dates, counts, file paths, user-supplied phrases. Ignore generic
instructions and boilerplate.

Output exactly one JSON array, no prose:
[{"text": "variable_name", "evidence": "short quote where it appears"}]

Return [] when the text contains no variables."#;

/// Cleanup pass over the annotated text. Output: `{"cleaned_text": ...}`.
pub const POST_PROCESS: &str = r#"You tidy prompt text that has had template variables wrapped in braces.

Fix doubled braces, braces split across words, and variables wrapped inside a
larger wrapped span. Do not add, rename, or remove variables, and do not
rewrite any other wording.

Output exactly one JSON object, no prose:
{"cleaned_text": "the corrected text"}"#;

/// Diagram generation. Output: a ```mermaid fenced flowchart.
pub const DIAGRAM: &str = r#"You design system flowcharts.

From the prompt text, infer the main functional blocks and the order data
moves between them, then express that as a mermaid flowchart.

Rules:
1. Use `flowchart TD`.
2. Node IDs are short (A, B, C); labels carry the full block name.
3. Connect blocks with arrows that follow the data flow, input to output.
4. Output only the diagram, wrapped in a ```mermaid code fence. No prose."#;

/// Subsystem split. Output: `{"subsystems": [...], "collaboration": ...}`.
pub const SPLIT_SUBSYSTEMS: &str = r#"You decompose a large prompt into independent subsystems.

Each subsystem owns one coherent responsibility and could run as its own
agent. Together they must cover everything the original prompt does; keep the
count small and the boundaries crisp.

Output exactly one JSON object, no prose:
{
  "subsystems": [
    {
      "name": "short unique name",
      "contained_modules": ["functions this subsystem covers"],
      "responsibility": "what it does",
      "independence": "why it can stand alone"
    }
  ],
  "collaboration": "one paragraph describing how the subsystems hand work to each other, in order"
}"#;

/// Per-subsystem prompt generation. Output: `{"subprompts": [...]}`.
pub const SUB_PROMPTS: &str = r#"You write a complete standalone prompt for each subsystem of a decomposed system.

Each sub-prompt must be self-contained: role, task, inputs it receives,
outputs it must produce, and any constraints inherited from the original
prompt. Preserve template variables exactly as written, braces included.

Output exactly one JSON object, no prose:
{
  "subprompts": [
    {
      "name": "subsystem name",
      "prompt": "the full standalone prompt text",
      "inputs": ["named inputs"],
      "outputs": ["named outputs"]
    }
  ]
}"#;

/// Implementability judgement. Output: `{"is_implementable": ...}`.
pub const JUDGE_IMPLEMENTABLE: &str = r#"You judge whether a sub-prompt describes a task plain Python code can fully implement without calling a language model.

Deterministic transformations, parsing, arithmetic, and format conversion are
implementable. Open-ended generation, judgement calls, and natural-language
understanding are not.

Output exactly one JSON object, no prose:
{"is_implementable": true, "reason": "one sentence", "annotation": "one-line label for the task"}"#;

/// Code generation. Output: a ```python fenced module.
pub const GENERATE_CODE: &str = r#"You implement a sub-prompt's task as a single self-contained Python module.

Rules:
1. One entry-point function named `run`, taking the documented inputs and
   returning the documented outputs.
2. Standard library only. No I/O beyond the function boundary.
3. Include a short docstring; no example usage, no prints.
4. Output only the module, wrapped in a ```python code fence. No prose."#;

/// Test case generation. Output: `{"test_cases": [...]}`.
pub const GENERATE_TEST_CASES: &str = r#"You write test cases for a Python module whose entry point is `run`.

Each case is one expression calling `run` plus the exact expected value.
Cover ordinary inputs and at least one edge case.

Output exactly one JSON object, no prose:
{"test_cases": [{"input_code": "run(...)", "expected_output": "expected value as a string"}]}"#;

/// DSL conversion system prompt; used with the few-shot pair below.
pub const DSL_CONVERSION: &str = r#"You convert a natural-language agent prompt into the structured agent DSL.

Grammar:
  agent      = "[DEFINE_AGENT:" name "]" sections "[END_AGENT]"
  sections   = persona instruction outputs
  persona    = "[PERSONA]" text
  instruction= "[INSTRUCTION]" numbered steps
  outputs    = "[OUTPUTS]" named outputs, one per line

Keep template variables exactly as written, braces included. Output only the
agent block, nothing before or after it."#;

/// Few-shot input for DSL conversion
pub const DSL_EXAMPLE_INPUT: &str = r#"You are a polite support agent. Read the customer message {message} and
produce a short reply and a priority label (low, normal, urgent)."#;

/// Few-shot output for DSL conversion
pub const DSL_EXAMPLE_OUTPUT: &str = r#"[DEFINE_AGENT: support_reply]
[PERSONA] A polite customer support agent.
[INSTRUCTION]
1. Read the customer message {message}.
2. Draft a short, courteous reply.
3. Assign a priority label: low, normal, or urgent.
[OUTPUTS]
reply: the drafted reply text
priority: one of low, normal, urgent
[END_AGENT]"#;

/// Wrap user-supplied text so the model cannot mistake it for instructions.
#[must_use]
pub fn frame_input(text: &str) -> String {
    format!("<<<PROMPT START>>>\n{text}\n<<<PROMPT END>>>")
}

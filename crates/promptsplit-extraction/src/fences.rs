//! Fenced-code-block extraction.

/// Keywords that identify a diagram body when the fence carries no info string
const MERMAID_KEYWORDS: [&str; 4] = ["flowchart", "graph", "classdef", "-->"];

/// All closed fenced blocks in `text`, as (info string, trimmed body) pairs.
///
/// Splitting on the fence marker pairs every opening fence with the next
/// marker, so the closing fence of one block never doubles as the opening
/// fence of a phantom block. An unclosed trailing fence is ignored.
fn fenced_blocks(text: &str) -> Vec<(String, String)> {
    let segments: Vec<&str> = text.split("```").collect();
    let mut blocks = Vec::new();

    let mut index = 1;
    while index + 1 < segments.len() {
        let inside = segments[index];
        let (info, body) = match inside.split_once('\n') {
            Some((first, rest)) => (first.trim(), rest),
            None => ("", inside),
        };
        blocks.push((info.to_string(), body.trim().to_string()));
        index += 2;
    }
    blocks
}

/// Extract the body of a fenced block tagged with `language`, falling back to
/// the first fence with no info string.
///
/// A fence tagged with some other language never leaks into the fallback.
#[must_use]
pub fn extract_fenced_block(text: &str, language: &str) -> Option<String> {
    let blocks = fenced_blocks(text);
    if let Some((_, body)) = blocks.iter().find(|(info, _)| info == language) {
        return Some(body.clone());
    }
    blocks
        .into_iter()
        .find(|(info, _)| info.is_empty())
        .map(|(_, body)| body)
}

/// Extract a mermaid diagram body.
///
/// Prefers a ```mermaid fence; otherwise accepts an untagged fenced block
/// whose body mentions a diagram keyword.
#[must_use]
pub fn extract_mermaid_block(text: &str) -> Option<String> {
    let blocks = fenced_blocks(text);
    if let Some((_, body)) = blocks.iter().find(|(info, _)| info == "mermaid") {
        return Some(body.clone());
    }

    blocks
        .into_iter()
        .find(|(info, body)| {
            let lowered = body.to_lowercase();
            info.is_empty() && MERMAID_KEYWORDS.iter().any(|kw| lowered.contains(kw))
        })
        .map(|(_, body)| body)
}

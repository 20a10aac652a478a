//! Agent DSL block extraction.

use once_cell::sync::Lazy;
use regex::Regex;

static AGENT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(\[DEFINE_AGENT:.*?\[END_AGENT\])").unwrap());

/// Extract the first `[DEFINE_AGENT: ... [END_AGENT]` span from a response.
///
/// Models sometimes return the block bare, without surrounding prose; when no
/// span is found the trimmed full response is returned as-is.
#[must_use]
pub fn extract_agent_block(response: &str) -> String {
    AGENT_BLOCK
        .captures(response)
        .map_or_else(|| response.trim().to_string(), |c| c[1].to_string())
}

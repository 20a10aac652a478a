//! Ordered recovery ladder for JSON embedded in model output.
//!
//! [`extract`] tries five strategies in a fixed order and returns the first
//! parsed object that contains the caller's required key. Every strategy ends
//! in a real `serde_json` parse; nothing here accepts a candidate on shape
//! alone. Strategy 5 rewrites the text with [`repair_json_text`] and re-runs
//! the ladder once on the repaired form.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Longest `{...}` span with one level of nesting
static OBJECT_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{(?:[^{}]|\{[^{}]*\})*\}").unwrap());

/// Longest `[...]` span with one level of nesting
static ARRAY_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[(?:[^\[\]]|\[[^\[\]]*\])*\]").unwrap());

/// Fenced code blocks, with or without a `json` info string
static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());

/// Trailing comma before a closing brace or bracket
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Placeholder for quotes that were already escaped, so the interior-quote
/// pass never touches them. Private-use codepoint, absent from model output.
const ESCAPED_QUOTE_SENTINEL: char = '\u{E000}';

/// Recover a JSON object containing `required_key` from arbitrary text.
///
/// Strategies, in order:
/// 1. quote-aware balanced-brace scan
/// 2. fenced-code-block scan
/// 3. line accumulation with running brace depth
/// 4. longest regex object/array spans
/// 5. [`repair_json_text`] then strategies 1-4 on the repaired text
///
/// Returns `None` when no strategy yields a parse whose object carries
/// `required_key`.
#[must_use]
pub fn extract(raw_text: &str, required_key: &str) -> Option<Value> {
    if raw_text.trim().is_empty() {
        return None;
    }

    if let Some(value) = run_ladder(raw_text, required_key) {
        return Some(value);
    }

    let repaired = repair_json_text(raw_text);
    if repaired != raw_text {
        debug!(required_key, "direct strategies failed, retrying on repaired text");
        return run_ladder(&repaired, required_key);
    }

    None
}

fn run_ladder(text: &str, required_key: &str) -> Option<Value> {
    scan_balanced_objects(text, required_key)
        .or_else(|| scan_fenced_blocks(text, required_key))
        .or_else(|| accumulate_lines(text, required_key))
        .or_else(|| scan_regex_spans(text, required_key))
}

fn has_required(value: &Value, required_key: &str) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key(required_key))
}

fn parse_candidate(candidate: &str, required_key: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(|v| has_required(v, required_key))
}

/// Strategy 1: walk the text tracking brace depth, string- and escape-aware.
///
/// Each balanced candidate gets a real parse attempt; on failure the scan
/// restarts from the next opening brace, nested ones included.
fn scan_balanced_objects(text: &str, required_key: &str) -> Option<Value> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for start in 0..chars.len() {
        if chars[start].1 != '{' {
            continue;
        }
        if let Some(end_byte) = balanced_end(&chars, start) {
            let candidate = &text[chars[start].0..end_byte];
            if let Some(value) = parse_candidate(candidate, required_key) {
                return Some(value);
            }
        }
    }
    None
}

/// Byte offset one past the brace that balances `chars[start]`, if any.
fn balanced_end(chars: &[(usize, char)], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for &(byte, c) in &chars[start..] {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(byte + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Strategy 2: parse the body of each fenced code block.
fn scan_fenced_blocks(text: &str, required_key: &str) -> Option<Value> {
    for captures in FENCED_BLOCK.captures_iter(text) {
        let body = captures.get(1).map_or("", |m| m.as_str()).trim();
        if let Some(value) = parse_candidate(body, required_key) {
            return Some(value);
        }
    }
    None
}

/// Strategy 3: accumulate lines from the first `{`, parsing when the running
/// depth returns to zero. A failed parse resets the accumulator and the scan
/// continues on later lines.
fn accumulate_lines(text: &str, required_key: &str) -> Option<Value> {
    let mut buf = String::new();
    let mut collecting = false;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for line in text.lines() {
        let slice = if collecting {
            line
        } else {
            match line.find('{') {
                Some(pos) => {
                    collecting = true;
                    &line[pos..]
                }
                None => continue,
            }
        };

        buf.push_str(slice);
        buf.push('\n');

        for c in slice.chars() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }

        if depth <= 0 {
            if depth == 0
                && let Some(value) = parse_candidate(buf.trim(), required_key)
            {
                return Some(value);
            }
            buf.clear();
            collecting = false;
            depth = 0;
            in_string = false;
            escaped = false;
        }
    }
    None
}

/// Strategy 4: longest regex object and array spans, longest first.
fn scan_regex_spans(text: &str, required_key: &str) -> Option<Value> {
    let mut spans: Vec<&str> = OBJECT_SPAN
        .find_iter(text)
        .chain(ARRAY_SPAN.find_iter(text))
        .map(|m| m.as_str())
        .collect();
    spans.sort_by_key(|s| std::cmp::Reverse(s.len()));

    for span in spans {
        if let Some(value) = parse_candidate(span, required_key) {
            return Some(value);
        }
    }
    None
}

/// Rewrite near-JSON text into parseable form. Pure function; applying it to
/// its own output is a no-op for text it already handled.
///
/// Passes, in order:
/// 1. escape unescaped interior quotes inside string values (sentinel
///    two-pass so already-escaped quotes survive untouched)
/// 2. replace CJK fullwidth punctuation with ASCII equivalents
/// 3. strip control characters except `\n`, `\r`, `\t`
/// 4. remove trailing commas before `}` / `]`
#[must_use]
pub fn repair_json_text(text: &str) -> String {
    let protected = text.replace("\\\"", &ESCAPED_QUOTE_SENTINEL.to_string());

    let chars: Vec<char> = protected.chars().collect();
    let mut out = String::with_capacity(protected.len() + 8);
    let mut in_string = false;

    for (i, &c) in chars.iter().enumerate() {
        if c != '"' {
            out.push(c);
            continue;
        }
        if !in_string {
            in_string = true;
            out.push(c);
            continue;
        }
        // A closing quote is followed by a structural character; anything
        // else is an interior quote that needs escaping. Fullwidth comma,
        // colon, and semicolon count as structural because the punctuation
        // pass has not run yet.
        let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
        if matches!(next, None | Some(',' | '}' | ']' | ':' | '，' | '：' | '；')) {
            in_string = false;
            out.push(c);
        } else {
            out.push('\\');
            out.push('"');
        }
    }

    let unprotected = out.replace(ESCAPED_QUOTE_SENTINEL, "\\\"");

    let ascii_punct: String = unprotected
        .chars()
        .map(|c| match c {
            '，' => ',',
            '：' => ':',
            '；' => ';',
            '“' | '”' => '"',
            '‘' | '’' => '\'',
            '（' => '(',
            '）' => ')',
            other => other,
        })
        .collect();

    let stripped: String = ascii_punct
        .chars()
        .filter(|&c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();

    TRAILING_COMMA.replace_all(&stripped, "$1").to_string()
}

//! Line-aligned text chunking.
//!
//! Chunks are at least `max_size` characters (not bytes) and always end on a
//! line boundary: the window extends past `max_size` to the next paragraph
//! break, else the next newline, else end of input. Cutting never happens
//! inside a line.

use crate::error::PipelineError;

/// Split `text` into line-aligned chunks of at least `max_size` characters.
///
/// Whitespace-only chunks are dropped. Before that filter the chunks
/// partition the input exactly, so concatenating everything the scan
/// produced reconstructs `text`.
///
/// # Errors
///
/// Returns `PipelineError::ZeroChunkSize` when `max_size` is zero.
pub fn split(text: &str, max_size: usize) -> Result<Vec<String>, PipelineError> {
    Ok(split_all(text, max_size)?
        .into_iter()
        .filter(|chunk| !chunk.trim().is_empty())
        .collect())
}

/// The unfiltered scan: every chunk, whitespace-only ones included.
///
/// # Errors
///
/// Returns `PipelineError::ZeroChunkSize` when `max_size` is zero.
pub fn split_all(text: &str, max_size: usize) -> Result<Vec<String>, PipelineError> {
    if max_size == 0 {
        return Err(PipelineError::ZeroChunkSize);
    }

    // Byte offset of every char start, so windows count characters while
    // slicing stays on valid boundaries.
    let char_starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = char_starts.len();

    let mut chunks = Vec::new();
    let mut start_char = 0;

    while start_char < total_chars {
        let window_end_char = (start_char + max_size).min(total_chars);
        let mut end_byte = if window_end_char == total_chars {
            text.len()
        } else {
            char_starts[window_end_char]
        };

        if window_end_char < total_chars {
            if let Some(pos) = text[end_byte..].find("\n\n") {
                end_byte += pos + 2;
            } else if let Some(pos) = text[end_byte..].find('\n') {
                end_byte += pos + 1;
            } else {
                end_byte = text.len();
            }
        }

        chunks.push(text[char_starts[start_char]..end_byte].to_string());
        start_char = char_starts.partition_point(|&b| b < end_byte);
    }

    Ok(chunks)
}

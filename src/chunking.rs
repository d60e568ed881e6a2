use crate::config::ChunkerConfig;
use crate::error::Result;
use serde::Serialize;

/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// Position of this chunk among the chunks of its document
    pub index: usize,
    /// The actual text content of this chunk
    pub text: String,
    /// Character offset where this chunk starts in the original document
    pub start_position: usize,
    /// Character offset just past the end of this chunk
    pub end_position: usize,
}

/// Split text into overlapping character windows.
///
/// Each window is `chunk_size` characters long, stretched forward to the next
/// whitespace when it would otherwise end inside a word and that whitespace is
/// within `boundary_window` characters. Consecutive windows share `overlap`
/// characters. Offsets count `char`s, not bytes.
pub fn split_into_chunks(text: &str, config: &ChunkerConfig) -> Result<Vec<TextChunk>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let text_length = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text_length {
        let end = chunk_end(&chars, start, config);

        chunks.push(TextChunk {
            index: chunks.len(),
            text: chars[start..end].iter().collect(),
            start_position: start,
            end_position: end,
        });

        // A window reaching the end of the text covers everything after it
        if end >= text_length {
            break;
        }

        let next_start = end.saturating_sub(config.overlap);
        start = if next_start > start {
            next_start
        } else {
            start + 1
        };
    }

    Ok(chunks)
}

/// Find where the window starting at `start` ends
fn chunk_end(chars: &[char], start: usize, config: &ChunkerConfig) -> usize {
    let text_length = chars.len();
    let end = start.saturating_add(config.chunk_size).min(text_length);

    if end == text_length || chars[end].is_whitespace() {
        return end;
    }

    // Don't search too far; accept a mid-word cut instead
    chars[end..]
        .iter()
        .take(config.boundary_window)
        .position(|c| c.is_whitespace())
        .map(|offset| end + offset + 1)
        .unwrap_or(end)
}

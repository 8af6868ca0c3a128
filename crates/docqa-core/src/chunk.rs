//! Fixed-size overlapping text chunker.
//!
//! Splits document text into windows of `chunk_size` characters where the
//! last `overlap` characters of window *i* repeat at the start of window
//! *i + 1*. Sizes are counted in Unicode scalar values, so a window never
//! ends inside a multi-byte character.
//!
//! # Chunk count
//!
//! For a text of `L` characters, size `S` and overlap `O` (`O < S`):
//!
//! ```text
//! L == 0      → 0 chunks
//! L <= S      → 1 chunk
//! otherwise   → ceil((L - O) / (S - O)) chunks
//! ```
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefghij", 4, 1);
//! assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
//! ```

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// `overlap` is clamped to `chunk_size - 1` so the window always advances.
/// Returns an empty vector for empty text or a zero `chunk_size`; config
/// validation rejects both cases before they reach the pipeline.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(chunk_size - 1);
    let step = chunk_size - overlap;

    // Byte offset of every char boundary, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;

    let mut chunks = Vec::with_capacity(expected_chunk_count(len, chunk_size, overlap));
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(len);
        chunks.push(text[bounds[start]..bounds[end]].to_string());
        if end == len {
            break;
        }
        start += step;
    }
    chunks
}

/// Number of chunks [`chunk_text`] produces for a text of `len` characters.
pub fn expected_chunk_count(len: usize, chunk_size: usize, overlap: usize) -> usize {
    if len == 0 || chunk_size == 0 {
        return 0;
    }
    if len <= chunk_size {
        return 1;
    }
    let overlap = overlap.min(chunk_size - 1);
    let step = chunk_size - overlap;
    (len - overlap).div_ceil(step)
}

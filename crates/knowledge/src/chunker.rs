//! Recursive separator-based text chunking.
//!
//! Text is split on the highest-priority separator present (paragraph, line,
//! sentence, word, character). Pieces shorter than the window are merged
//! greedily into windows that carry up to `overlap` characters of the
//! previous window; longer pieces are split again with the remaining
//! separators. Lengths are counted in characters, not bytes.

use crate::error::{RagError, RagResult};
use crate::types::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::Range;

/// Separators in priority order; `""` cuts between characters.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ".", " ", ""];

/// A named window/overlap pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProfile {
    pub window_size: usize,
    pub overlap: usize,
}

impl ChunkProfile {
    pub const STRUCTURED: &'static str = "structured";
    pub const RAW_PAGE: &'static str = "raw-page";

    /// Profile for parsed task records.
    pub fn structured() -> Self {
        Self {
            window_size: 1100,
            overlap: 180,
        }
    }

    /// Profile for whole PDF pages.
    pub fn raw_page() -> Self {
        Self {
            window_size: 800,
            overlap: 150,
        }
    }

    /// Resolve a built-in profile by name.
    pub fn by_name(name: &str) -> RagResult<Self> {
        match name {
            Self::STRUCTURED => Ok(Self::structured()),
            Self::RAW_PAGE => Ok(Self::raw_page()),
            other => Err(RagError::InvalidConfiguration(format!(
                "Unknown chunk profile '{}'. Known profiles: {}, {}",
                other,
                Self::STRUCTURED,
                Self::RAW_PAGE
            ))),
        }
    }

    pub fn validate(&self) -> RagResult<()> {
        validate(self.window_size, self.overlap)
    }
}

fn validate(window_size: usize, overlap: usize) -> RagResult<()> {
    if window_size == 0 {
        return Err(RagError::InvalidConfiguration(
            "window_size must be greater than zero".to_string(),
        ));
    }
    if overlap >= window_size {
        return Err(RagError::InvalidConfiguration(format!(
            "overlap ({}) must be smaller than window_size ({})",
            overlap, window_size
        )));
    }
    Ok(())
}

/// Split text into trimmed, non-empty chunks of at most `window_size` characters.
pub fn chunk(text: &str, window_size: usize, overlap: usize) -> RagResult<Vec<String>> {
    Ok(chunk_spans(text, window_size, overlap)?
        .into_iter()
        .map(|span| text[span].to_string())
        .collect())
}

/// Chunk one record's text, tagging each chunk with its position.
pub fn chunk_record(source_id: &str, text: &str, profile: &ChunkProfile) -> RagResult<Vec<Chunk>> {
    Ok(chunk(text, profile.window_size, profile.overlap)?
        .into_iter()
        .enumerate()
        .map(|(sequence_index, text)| Chunk {
            text,
            source_id: source_id.to_string(),
            sequence_index,
        })
        .collect())
}

/// Byte ranges of the chunks within `text`, in increasing order.
pub(crate) fn chunk_spans(
    text: &str,
    window_size: usize,
    overlap: usize,
) -> RagResult<Vec<Range<usize>>> {
    validate(window_size, overlap)?;

    let splitter = Splitter {
        text,
        window_size,
        overlap,
    };
    let mut spans = Vec::new();
    splitter.split(0..text.len(), &SEPARATORS, &mut spans);
    Ok(spans)
}

struct Splitter<'a> {
    text: &'a str,
    window_size: usize,
    overlap: usize,
}

impl Splitter<'_> {
    fn split(&self, range: Range<usize>, separators: &[&str], out: &mut Vec<Range<usize>>) {
        let segment = &self.text[range.clone()];

        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || segment.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let mut fitting: Vec<(Range<usize>, usize)> = Vec::new();
        for piece in split_keep_end(segment, separator) {
            let piece = (range.start + piece.start)..(range.start + piece.end);
            let len = self.text[piece.clone()].chars().count();

            if len < self.window_size {
                fitting.push((piece, len));
                continue;
            }

            if !fitting.is_empty() {
                self.merge(&fitting, out);
                fitting.clear();
            }
            if remaining.is_empty() {
                self.push_trimmed(piece, out);
            } else {
                self.split(piece, remaining, out);
            }
        }

        if !fitting.is_empty() {
            self.merge(&fitting, out);
        }
    }

    /// Greedily pack adjacent pieces into windows, keeping a tail of at most
    /// `overlap` characters as the start of the next window.
    fn merge(&self, pieces: &[(Range<usize>, usize)], out: &mut Vec<Range<usize>>) {
        let mut current: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for (piece, len) in pieces {
            if total + len > self.window_size && !current.is_empty() {
                self.push_window(&current, out);

                while total > self.overlap || (total + len > self.window_size && total > 0) {
                    match current.pop_front() {
                        Some((_, popped)) => total -= popped,
                        None => break,
                    }
                }
            }

            current.push_back((piece.clone(), *len));
            total += len;
        }

        if !current.is_empty() {
            self.push_window(&current, out);
        }
    }

    fn push_window(&self, window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
        if let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) {
            self.push_trimmed(first.start..last.end, out);
        }
    }

    fn push_trimmed(&self, span: Range<usize>, out: &mut Vec<Range<usize>>) {
        let slice = &self.text[span.clone()];
        let leading = slice.len() - slice.trim_start().len();
        let trimmed_len = slice.trim().len();
        if trimmed_len == 0 {
            return;
        }
        let start = span.start + leading;
        out.push(start..start + trimmed_len);
    }
}

/// Split on `separator`, keeping it at the end of each piece.
fn split_keep_end(text: &str, separator: &str) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| i..i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, matched) in text.match_indices(separator) {
        let end = i + matched.len();
        pieces.push(start..end);
        start = end;
    }
    if start < text.len() {
        pieces.push(start..text.len());
    }
    pieces
}

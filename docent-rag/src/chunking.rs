//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] - splits by character count with a fixed overlap
//! - [`RecursiveChunker`] - splits hierarchically by paragraphs, lines, sentences, then words
//!
//! Both measure sizes in characters (Unicode scalar values), never bytes, and
//! both cover every character of the input: [`reconstruct`] rebuilds the
//! original text from the chunks by their `start` offsets.

use std::collections::VecDeque;
use std::ops::Range;

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Separators tried by [`RecursiveChunker`], coarsest first.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document is empty or whitespace-only.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Split a document with the default [`RecursiveChunker`] strategy.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] unless `0 <= chunk_overlap < chunk_size`.
pub fn split(document: &Document, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(RecursiveChunker::new(chunk_size, chunk_overlap)?.chunk(document))
}

/// Rebuild the text of a document from its chunks, dropping overlapping regions.
///
/// `chunks` must all come from the same document, in the order the chunker
/// produced them.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut text = String::new();
    let mut covered = 0usize;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start);
        text.extend(chunk.text.chars().skip(skip));
        covered = covered.max(chunk.end());
    }
    text
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Byte offset of every char boundary in `text`, including `text.len()`.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Turn char ranges over `document.text` into chunks.
fn build_chunks(document: &Document, ranges: Vec<Range<usize>>) -> Vec<Chunk> {
    let bounds = char_boundaries(&document.text);
    ranges
        .into_iter()
        .enumerate()
        .map(|(i, range)| {
            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), i.to_string());
            Chunk {
                id: format!("{}_{i}", document.id),
                document_id: document.id.clone(),
                text: document.text[bounds[range.start]..bounds[range.end]].to_string(),
                start: range.start,
                metadata,
            }
        })
        .collect()
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Consecutive chunks overlap by exactly `chunk_overlap` characters. The last
/// chunk ends at the end of the document and is never fully contained in the
/// one before it.
///
/// # Example
///
/// ```rust,ignore
/// use docent_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.is_blank() {
            return Vec::new();
        }

        let len = document.text.chars().count();
        let step = self.chunk_size - self.chunk_overlap;
        let mut ranges = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(len);
            ranges.push(start..end);
            if end == len {
                break;
            }
            start += step;
        }

        build_chunks(document, ranges)
    }
}

/// Splits text hierarchically: paragraphs → lines → sentences → words → characters.
///
/// Text is first cut at paragraph separators (`\n\n`). Any segment still
/// longer than `chunk_size` is cut at the next separator in line, and so on
/// down to a hard character split. Separators stay attached to the segment
/// before them, so no text is lost. Segments are then merged greedily into
/// chunks of at most `chunk_size` characters; each new chunk starts with the
/// trailing segments of the previous chunk that fit in `chunk_overlap`.
///
/// # Example
///
/// ```rust,ignore
/// use docent_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(4096, 100)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Cut `text` (starting at char offset `base`) into contiguous pieces of at
/// most `chunk_size` chars, preferring the coarsest separator that works.
fn split_pieces(
    text: &str,
    base: usize,
    chunk_size: usize,
    separators: &[&str],
    pieces: &mut Vec<Range<usize>>,
) {
    let len = text.chars().count();
    if len <= chunk_size {
        if len > 0 {
            pieces.push(base..base + len);
        }
        return;
    }

    let Some((separator, remaining)) = separators.split_first() else {
        let mut start = 0;
        while start < len {
            let end = (start + chunk_size).min(len);
            pieces.push(base + start..base + end);
            start = end;
        }
        return;
    };

    let mut offset = base;
    for segment in split_keeping_separator(text, separator) {
        let segment_len = segment.chars().count();
        if segment_len <= chunk_size {
            pieces.push(offset..offset + segment_len);
        } else {
            split_pieces(segment, offset, chunk_size, remaining, pieces);
        }
        offset += segment_len;
    }
}

/// Greedily merge contiguous pieces into chunk ranges, carrying up to
/// `chunk_overlap` chars of trailing pieces into the next chunk.
fn merge_pieces(
    pieces: &[Range<usize>],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<Range<usize>> = VecDeque::new();
    let mut total = 0;

    for piece in pieces {
        let piece_len = piece.len();
        if total + piece_len > chunk_size {
            if let (Some(first), Some(last)) = (window.front(), window.back()) {
                chunks.push(first.start..last.end);
            }
            while total > chunk_overlap || (total > 0 && total + piece_len > chunk_size) {
                match window.pop_front() {
                    Some(dropped) => total -= dropped.len(),
                    None => break,
                }
            }
        }
        window.push_back(piece.clone());
        total += piece_len;
    }

    if let (Some(first), Some(last)) = (window.front(), window.back()) {
        chunks.push(first.start..last.end);
    }

    chunks
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.is_blank() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        split_pieces(&document.text, 0, self.chunk_size, &SEPARATORS, &mut pieces);
        let ranges = merge_pieces(&pieces, self.chunk_size, self.chunk_overlap);

        build_chunks(document, ranges)
    }
}

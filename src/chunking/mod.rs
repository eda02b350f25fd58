//! Word-boundary chunking for transcripts that exceed a model's input budget.
//!
//! Packing is greedy: each word costs its length plus one separator, and a
//! chunk is closed as soon as the next word would push it past the budget.
//! This is not an optimal bin-packing and is not meant to be.

use serde::{Deserialize, Serialize};

/// A contiguous, word-bounded slice of a larger text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content of this chunk (words joined by single spaces).
    pub content: String,
    /// Position of this chunk in the source text.
    pub order: usize,
}

impl Chunk {
    /// Number of characters in the chunk.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Greedy word packer with a fixed character budget.
#[derive(Debug, Clone, Copy)]
pub struct WordChunker {
    max_chunk_chars: usize,
}

impl WordChunker {
    pub fn new(max_chunk_chars: usize) -> Self {
        Self {
            max_chunk_chars: max_chunk_chars.max(1),
        }
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    /// Split text into chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        chunk_text(text, self.max_chunk_chars)
            .into_iter()
            .enumerate()
            .map(|(order, content)| Chunk { content, order })
            .collect()
    }
}

/// Split text into word-bounded pieces of at most `max_chunk_chars` characters.
///
/// A single word longer than the budget gets a chunk of its own.
pub fn chunk_text(text: &str, max_chunk_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_length = 0;

    for word in text.split_whitespace() {
        let cost = word.chars().count() + 1;
        if current_length + cost > max_chunk_chars && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_length = 0;
        }
        current.push(word);
        current_length += cost;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

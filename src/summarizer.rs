//! Transcript summarization with graceful degradation.
//!
//! Short transcripts are summarized in one request over a retrieval index of
//! the whole text. Long transcripts are chunked and each chunk is summarized
//! on its own. When the backend rejects requests for size or rate, the
//! summarizer falls back to extractive summaries built from the transcript
//! itself.

use crate::chunking::{Chunk, WordChunker};
use crate::config::{Prompts, Settings};
use crate::embedding::Embedder;
use crate::error::{Result, TubesageError};
use crate::llm::LanguageModel;
use crate::rag::{IndexOptions, RetrievalIndex};
use crate::transcript::Transcript;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Which path produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    /// Single model summary of the whole transcript.
    Model,
    /// Per-chunk summaries joined in order.
    Chunked,
    /// Leading words of the transcript.
    Truncated,
    /// Beginning, middle and end excerpts of the transcript.
    Extractive,
}

impl std::fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryKind::Model => write!(f, "model"),
            SummaryKind::Chunked => write!(f, "chunked"),
            SummaryKind::Truncated => write!(f, "truncated"),
            SummaryKind::Extractive => write!(f, "extractive"),
        }
    }
}

/// A produced summary.
pub struct SummaryOutcome {
    pub text: String,
    pub kind: SummaryKind,
    /// Index over the whole transcript, when one was built along the way.
    pub index: Option<RetrievalIndex>,
}

impl std::fmt::Debug for SummaryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryOutcome")
            .field("text", &self.text)
            .field("kind", &self.kind)
            .field("index", &self.index.as_ref().map(|i| i.content_hash()))
            .finish()
    }
}

/// Summarization thresholds.
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// Longest transcript (chars) summarized in a single request.
    pub direct_limit_chars: usize,
    /// Chunk budget for long transcripts.
    pub max_chunk_chars: usize,
    /// Words kept by the truncated fallback.
    pub truncate_words: usize,
    /// Words per section of the extractive fallback.
    pub extract_words: usize,
    /// Sentences kept when a chunk summary fails.
    pub fallback_sentences: usize,
    /// Chunks summarized at once.
    pub max_concurrent: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            direct_limit_chars: 3000,
            max_chunk_chars: 2500,
            truncate_words: 300,
            extract_words: 200,
            fallback_sentences: 3,
            max_concurrent: 2,
        }
    }
}

impl SummaryOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            direct_limit_chars: settings.summary.direct_limit_chars,
            max_chunk_chars: settings.chunking.max_chunk_chars,
            truncate_words: settings.summary.truncate_words,
            extract_words: settings.summary.extract_words,
            fallback_sentences: settings.summary.fallback_sentences,
            max_concurrent: settings.summary.max_concurrent.max(1),
        }
    }
}

/// Per-chunk result of the chunked path.
enum ChunkSummary {
    Text(String),
    /// The chunk could not even be indexed; the chunked path is abandoned.
    IndexOverloaded(String),
}

/// Produces summaries of transcripts.
pub struct Summarizer {
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn LanguageModel>,
    prompts: Arc<Prompts>,
    index_options: IndexOptions,
    options: SummaryOptions,
}

impl Summarizer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
        prompts: Arc<Prompts>,
        index_options: IndexOptions,
        options: SummaryOptions,
    ) -> Self {
        Self {
            embedder,
            model,
            prompts,
            index_options,
            options,
        }
    }

    /// Summarize a transcript, picking the path by its length.
    #[instrument(skip_all, fields(video = %transcript.video, chars = transcript.len()))]
    pub async fn summarize(&self, transcript: &Transcript) -> Result<SummaryOutcome> {
        if transcript.len() <= self.options.direct_limit_chars {
            info!("Summarizing whole transcript");
            self.summarize_direct(&transcript.text).await
        } else {
            info!("Summarizing transcript in chunks");
            self.summarize_chunked(&transcript.text).await
        }
    }

    async fn build_index(&self, text: &str) -> Result<RetrievalIndex> {
        Ok(
            RetrievalIndex::build(text, self.embedder.clone(), self.index_options.clone())
                .await?
                .with_prompts(self.prompts.clone()),
        )
    }

    fn render(&self, template: &str) -> String {
        self.prompts.render_with_custom(template, &HashMap::new())
    }

    async fn summarize_direct(&self, text: &str) -> Result<SummaryOutcome> {
        let index = match self.build_index(text).await {
            Ok(index) => index,
            Err(TubesageError::BackendOverloaded(detail)) => {
                warn!("Backend overloaded while indexing, truncating: {}", detail);
                return Ok(self.truncated(text, None));
            }
            Err(e) => return Err(unexpected(e)),
        };

        let query = self.render(&self.prompts.summary.full);
        match index.query(&query, self.model.as_ref()).await {
            Ok(summary) => Ok(SummaryOutcome {
                text: summary,
                kind: SummaryKind::Model,
                index: Some(index),
            }),
            Err(TubesageError::BackendOverloaded(detail)) => {
                warn!("Backend overloaded while summarizing, truncating: {}", detail);
                Ok(self.truncated(text, Some(index)))
            }
            Err(e) => Err(unexpected(e)),
        }
    }

    async fn summarize_chunked(&self, text: &str) -> Result<SummaryOutcome> {
        let chunks = WordChunker::new(self.options.max_chunk_chars).chunk(text);
        let chunk_count = chunks.len();
        info!("Summarizing {} chunks", chunk_count);

        let mut results: Vec<(usize, String)> = Vec::with_capacity(chunk_count);

        let mut stream = stream::iter(chunks)
            .map(|chunk| async move {
                let order = chunk.order;
                (order, self.summarize_chunk(&chunk).await)
            })
            .buffer_unordered(self.options.max_concurrent);

        while let Some((order, result)) = stream.next().await {
            match result? {
                ChunkSummary::Text(summary) => results.push((order, summary)),
                ChunkSummary::IndexOverloaded(detail) => {
                    warn!(
                        "Backend overloaded while indexing chunk {}, using extractive summary: {}",
                        order, detail
                    );
                    return Ok(SummaryOutcome {
                        text: extractive_summary(text, self.options.extract_words),
                        kind: SummaryKind::Extractive,
                        index: None,
                    });
                }
            }
        }

        results.sort_by_key(|(order, _)| *order);
        let summaries: Vec<String> = results.into_iter().map(|(_, s)| s).collect();

        // Whole-transcript index for follow-up questions
        let index = match self.build_index(text).await {
            Ok(index) => Some(index),
            Err(TubesageError::BackendOverloaded(detail)) => {
                warn!("Backend overloaded while indexing transcript, deferring: {}", detail);
                None
            }
            Err(e) => return Err(unexpected(e)),
        };

        Ok(SummaryOutcome {
            text: format!("Video Summary:\n\n{}", summaries.join("\n\n")),
            kind: SummaryKind::Chunked,
            index,
        })
    }

    async fn summarize_chunk(&self, chunk: &Chunk) -> Result<ChunkSummary> {
        let index = match self.build_index(&chunk.content).await {
            Ok(index) => index,
            Err(TubesageError::BackendOverloaded(detail)) => {
                return Ok(ChunkSummary::IndexOverloaded(detail))
            }
            Err(e) => return Err(unexpected(e)),
        };

        let query = self.render(&self.prompts.summary.chunk);
        match index.query(&query, self.model.as_ref()).await {
            Ok(summary) => {
                debug!("Chunk {} summarized", chunk.order);
                Ok(ChunkSummary::Text(summary.trim().to_string()))
            }
            Err(TubesageError::BackendOverloaded(detail)) => {
                warn!(
                    "Backend overloaded on chunk {}, using leading sentences: {}",
                    chunk.order, detail
                );
                Ok(ChunkSummary::Text(first_sentences(
                    &chunk.content,
                    self.options.fallback_sentences,
                )))
            }
            Err(e) => Err(unexpected(e)),
        }
    }

    fn truncated(&self, text: &str, index: Option<RetrievalIndex>) -> SummaryOutcome {
        SummaryOutcome {
            text: truncated_summary(text, self.options.truncate_words),
            kind: SummaryKind::Truncated,
            index,
        }
    }
}

fn unexpected(e: TubesageError) -> TubesageError {
    match e {
        TubesageError::Unexpected(_) => e,
        other => TubesageError::Unexpected(other.to_string()),
    }
}

/// The first `words` words followed by an ellipsis.
pub fn truncated_summary(text: &str, words: usize) -> String {
    let head: Vec<&str> = text.split_whitespace().take(words).collect();
    format!("{}...", head.join(" "))
}

/// The first `count` sentences of `text`, split on `.`.
pub fn first_sentences(text: &str, count: usize) -> String {
    let sentences: Vec<&str> = text
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(count)
        .collect();

    if sentences.is_empty() {
        return text.trim().to_string();
    }
    format!("{}.", sentences.join(". "))
}

/// Beginning, middle and end excerpts of `words` words each.
pub fn extractive_summary(text: &str, words: usize) -> String {
    let all: Vec<&str> = text.split_whitespace().collect();
    let n = all.len();

    let beginning = &all[..words.min(n)];
    let mid_start = (n / 2).saturating_sub(words / 2);
    let middle = &all[mid_start..(mid_start + words).min(n)];
    let end = &all[n.saturating_sub(words)..];

    format!(
        "Video Summary:\n\nBeginning: {}\n\nMiddle: {}\n\nEnd: {}",
        beginning.join(" "),
        middle.join(" "),
        end.join(" ")
    )
}

//! In-memory vector store implementation.
//!
//! Holds the passages of one transcript; searched by brute-force cosine similarity.

use super::{cosine_similarity, Passage, SearchResult, VectorStore};
use crate::error::{Result, TubesageError};
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    passages: RwLock<Vec<Passage>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Passage>>> {
        self.passages
            .read()
            .map_err(|_| TubesageError::Unexpected("Vector store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Passage>>> {
        self.passages
            .write()
            .map_err(|_| TubesageError::Unexpected("Vector store lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, passages: Vec<Passage>) -> Result<usize> {
        let count = passages.len();
        let mut store = self.write()?;
        for passage in passages {
            match store.iter_mut().find(|p| p.id == passage.id) {
                Some(existing) => *existing = passage,
                None => store.push(passage),
            }
        }
        Ok(count)
    }

    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let passages = self.read()?;

        let mut results: Vec<SearchResult> = passages
            .iter()
            .map(|passage| SearchResult {
                score: cosine_similarity(query_embedding, &passage.embedding),
                passage: passage.clone(),
            })
            .filter(|r| r.score >= min_score)
            .collect();

        // Ties keep transcript order
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.passage.order.cmp(&b.passage.order))
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn passage_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

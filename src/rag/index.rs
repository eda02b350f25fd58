//! Similarity index over one transcript version.

use super::context::{format_context_for_display, format_context_for_prompt};
use crate::chunking::WordChunker;
use crate::config::{Prompts, Settings};
use crate::embedding::Embedder;
use crate::error::{Result, TubesageError};
use crate::llm::LanguageModel;
use crate::transcript::content_hash;
use crate::vector_store::{MemoryVectorStore, Passage, SearchResult, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Returned by [`RetrievalIndex::ask`] when the backend rejects the request for size or rate.
pub const OVERLOAD_ADVISORY: &str = "The language model is over its request size or rate limit \
right now. Please try a shorter question or try again in a minute.";

/// Index construction and retrieval options.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Character budget per passage.
    pub passage_chars: usize,
    /// Passages retrieved per question.
    pub top_k: usize,
    /// Minimum cosine similarity for a passage to be used.
    pub min_score: f32,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            passage_chars: 1000,
            top_k: 4,
            min_score: 0.0,
        }
    }
}

impl IndexOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            passage_chars: settings.chunking.passage_chars,
            top_k: settings.rag.top_k,
            min_score: settings.rag.min_score,
        }
    }
}

/// Retrieval index over a single document.
pub struct RetrievalIndex {
    content_hash: String,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    prompts: Arc<Prompts>,
    options: IndexOptions,
    passage_count: usize,
}

impl RetrievalIndex {
    /// Split `text` into passages and embed them.
    #[instrument(skip_all, fields(chars = text.len()))]
    pub async fn build(
        text: &str,
        embedder: Arc<dyn Embedder>,
        options: IndexOptions,
    ) -> Result<Self> {
        let passages: Vec<String> = WordChunker::new(options.passage_chars)
            .chunk(text)
            .into_iter()
            .map(|c| c.content)
            .collect();

        debug!("Embedding {} passages with {}", passages.len(), embedder.model());
        let embeddings = embedder.embed_batch(&passages).await?;
        if embeddings.len() != passages.len() {
            return Err(TubesageError::Unexpected(format!(
                "Embedder returned {} vectors for {} passages",
                embeddings.len(),
                passages.len()
            )));
        }

        let passage_count = passages.len();
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(
                passages
                    .into_iter()
                    .zip(embeddings)
                    .enumerate()
                    .map(|(order, (content, embedding))| Passage::new(content, order, embedding))
                    .collect(),
            )
            .await?;

        info!("Built index with {} passages", passage_count);

        Ok(Self {
            content_hash: content_hash(text),
            store: Arc::new(store),
            embedder,
            prompts: Arc::new(Prompts::default()),
            options,
            passage_count,
        })
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Arc<Prompts>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Hash of the document this index was built from.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Whether this index was built from a document with the given hash.
    pub fn is_for(&self, content_hash: &str) -> bool {
        self.content_hash == content_hash
    }

    pub fn passage_count(&self) -> usize {
        self.passage_count
    }

    /// Retrieve the passages most similar to `question`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embedder.embed(question).await?;
        self.store
            .search_with_threshold(&query_embedding, self.options.top_k, self.options.min_score)
            .await
    }

    /// Answer `question` from the retrieved passages, returning backend errors as-is.
    #[instrument(skip(self, model))]
    pub async fn query(&self, question: &str, model: &dyn LanguageModel) -> Result<String> {
        let results = self.retrieve(question).await?;
        debug!(
            "Retrieved {} passages:\n{}",
            results.len(),
            format_context_for_display(&results)
        );

        let mut vars = HashMap::new();
        vars.insert("context".to_string(), format_context_for_prompt(&results));
        vars.insert("question".to_string(), question.to_string());

        let system = self.prompts.render_with_custom(&self.prompts.rag.system, &HashMap::new());
        let user = self.prompts.render_with_custom(&self.prompts.rag.user, &vars);

        model.complete(&system, &user).await
    }

    /// Answer a user question.
    ///
    /// Overload becomes an advisory answer; any other failure is `QueryFailed`.
    pub async fn ask(&self, question: &str, model: &dyn LanguageModel) -> Result<String> {
        match self.query(question, model).await {
            Ok(answer) => Ok(answer),
            Err(TubesageError::BackendOverloaded(detail)) => {
                warn!("Backend overloaded while answering: {}", detail);
                Ok(OVERLOAD_ADVISORY.to_string())
            }
            Err(e) => Err(TubesageError::QueryFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEmbedder, ScriptedModel};

    // Three sentences that each fill one 50-char passage
    const TEXT: &str = "Rust ownership rules prevent data races. \
        Asynchronous tokio tasks run on threads. \
        Sourdough bread needs flour water salt.";

    fn small_passages() -> IndexOptions {
        IndexOptions {
            passage_chars: 50,
            top_k: 1,
            min_score: 0.0,
        }
    }

    #[tokio::test]
    async fn test_build_splits_into_passages() {
        let index = RetrievalIndex::build(TEXT, Arc::new(FakeEmbedder::new()), small_passages())
            .await
            .unwrap();
        assert_eq!(index.passage_count(), 3);
        assert!(index.is_for(&content_hash(TEXT)));
        assert!(!index.is_for(&content_hash("something else")));
    }

    #[tokio::test]
    async fn test_query_stuffs_retrieved_context() {
        let index = RetrievalIndex::build(TEXT, Arc::new(FakeEmbedder::new()), small_passages())
            .await
            .unwrap();
        let model = ScriptedModel::answering("Flour, water and salt.");

        let answer = index.query("what does bread need flour salt", &model).await.unwrap();
        assert_eq!(answer, "Flour, water and salt.");

        let prompt = model.last_prompt().unwrap();
        assert!(prompt.contains("Sourdough bread needs flour water salt."));
        assert!(!prompt.contains("tokio"));
        assert!(prompt.contains("Question: what does bread need flour salt"));
    }

    #[tokio::test]
    async fn test_ask_turns_overload_into_advisory() {
        let index = RetrievalIndex::build(TEXT, Arc::new(FakeEmbedder::new()), small_passages())
            .await
            .unwrap();

        let answer = index.ask("anything", &ScriptedModel::overloaded()).await.unwrap();
        assert_eq!(answer, OVERLOAD_ADVISORY);

        let err = index
            .query("anything", &ScriptedModel::overloaded())
            .await
            .unwrap_err();
        assert!(matches!(err, TubesageError::BackendOverloaded(_)));
    }

    #[tokio::test]
    async fn test_ask_wraps_other_failures() {
        let index = RetrievalIndex::build(TEXT, Arc::new(FakeEmbedder::new()), small_passages())
            .await
            .unwrap();
        let model = ScriptedModel::failing(|| TubesageError::Unexpected("boom".to_string()));

        let err = index.ask("anything", &model).await.unwrap_err();
        assert!(matches!(err, TubesageError::QueryFailed(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_build_surfaces_embedding_overload() {
        let result = RetrievalIndex::build(TEXT, Arc::new(FakeEmbedder::overloaded()), small_passages()).await;
        assert!(matches!(result, Err(TubesageError::BackendOverloaded(_))));
    }

    #[tokio::test]
    async fn test_custom_prompts_used() {
        let mut prompts = Prompts::default();
        prompts.rag.user = "CTX={{context}} Q={{question}} by {{author}}".to_string();
        prompts.variables.insert("author".to_string(), "tester".to_string());

        let index = RetrievalIndex::build("just one passage", Arc::new(FakeEmbedder::new()), IndexOptions::default())
            .await
            .unwrap()
            .with_prompts(Arc::new(prompts));
        let model = ScriptedModel::answering("ok");
        index.query("why", &model).await.unwrap();

        assert_eq!(model.last_prompt().unwrap(), "CTX=just one passage Q=why by tester");
    }
}

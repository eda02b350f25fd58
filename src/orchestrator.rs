//! Pipeline orchestrator for Tubesage.
//!
//! Coordinates caption retrieval, summarization and question answering on top
//! of the per-session state.

use crate::captions::{create_source, CaptionFetcher, CaptionSource};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, TubesageError};
use crate::llm::{LanguageModel, OpenAIChatModel};
use crate::rag::{IndexOptions, RetrievalIndex, OVERLOAD_ADVISORY};
use crate::retry::RetryPolicy;
use crate::session::SessionStore;
use crate::summarizer::{SummaryKind, SummaryOptions, Summarizer};
use crate::video_id::VideoReference;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Result of ingesting a video.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub video: VideoReference,
    pub summary: String,
    pub kind: SummaryKind,
    pub transcript_chars: usize,
}

/// The main orchestrator for the Tubesage pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Arc<Prompts>,
    fetcher: CaptionFetcher,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn LanguageModel>,
    summarizer: Summarizer,
    index_options: IndexOptions,
    sessions: SessionStore,
}

impl Orchestrator {
    /// Create a new orchestrator with the configured backends.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let source = create_source(&settings)?;
        let retry = RetryPolicy::from_settings(&settings.retry);

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::new(
            &settings.embedding,
            &settings.llm,
            retry.clone(),
        )?);
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAIChatModel::new(&settings.llm, retry)?);

        info!(
            "Using {:?} captions, {} for completions, {} for embeddings",
            settings.captions.provider,
            model.model(),
            embedder.model()
        );

        Ok(Self::with_components(settings, prompts, source, embedder, model))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        source: Arc<dyn CaptionSource>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let prompts = Arc::new(prompts);
        let index_options = IndexOptions::from_settings(&settings);
        let summarizer = Summarizer::new(
            embedder.clone(),
            model.clone(),
            prompts.clone(),
            index_options.clone(),
            SummaryOptions::from_settings(&settings),
        );
        let sessions = SessionStore::new(Duration::from_secs(settings.session.idle_ttl_secs));

        Self {
            settings,
            prompts,
            fetcher: CaptionFetcher::new(source),
            embedder,
            model,
            summarizer,
            index_options,
            sessions,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Fetch a video's captions into the session and summarize them.
    ///
    /// Extraction and caption failures leave the session untouched.
    #[instrument(skip(self))]
    pub async fn ingest(&self, session_id: &str, url: &str) -> Result<IngestResult> {
        let session = self.sessions.get_or_create(session_id).await;
        let mut session = session.lock().await;

        let transcript = self.fetcher.fetch_url(url).await?;
        let video = transcript.video.clone();
        let transcript_chars = transcript.len();
        info!("Fetched transcript for {} ({} chars)", video, transcript_chars);

        session.replace_transcript(transcript.clone());

        let outcome = self.summarizer.summarize(&transcript).await?;
        info!("Summary produced via {} path", outcome.kind);

        if let Some(index) = outcome.index {
            session.set_index(index);
        }

        Ok(IngestResult {
            video,
            summary: outcome.text,
            kind: outcome.kind,
            transcript_chars,
        })
    }

    /// Answer a question about the session's current transcript.
    #[instrument(skip(self))]
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<String> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or(TubesageError::NoTranscript)?;
        let mut session = session.lock().await;

        let Some(transcript) = session.transcript() else {
            return Err(TubesageError::NoTranscript);
        };

        if session.index().is_none() {
            info!("Building index for {}", transcript.video);
            let built = RetrievalIndex::build(
                &transcript.text,
                self.embedder.clone(),
                self.index_options.clone(),
            )
            .await;

            match built {
                Ok(index) => {
                    session.set_index(index.with_prompts(self.prompts.clone()));
                }
                Err(TubesageError::BackendOverloaded(detail)) => {
                    warn!("Backend overloaded while indexing: {}", detail);
                    return Ok(OVERLOAD_ADVISORY.to_string());
                }
                Err(e) => return Err(TubesageError::QueryFailed(e.to_string())),
            }
        }

        let index = session.index().ok_or(TubesageError::NoTranscript)?;
        index.ask(question, self.model.as_ref()).await
    }
}

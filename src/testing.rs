//! In-crate fakes for the backend traits.

use crate::captions::{CaptionSource, CaptionTrack, SubtitleFormat};
use crate::embedding::Embedder;
use crate::error::{Result, TubesageError};
use crate::llm::LanguageModel;
use crate::video_id::VideoReference;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type ErrorFn = Box<dyn Fn() -> TubesageError + Send + Sync>;

const FAKE_DIMENSIONS: usize = 256;

/// Deterministic bag-of-words embedder.
pub struct FakeEmbedder {
    failure: Option<ErrorFn>,
    batches: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            failure: None,
            batches: AtomicUsize::new(0),
        }
    }

    /// Every request fails with the error produced by `f`.
    pub fn failing(f: impl Fn() -> TubesageError + Send + Sync + 'static) -> Self {
        Self {
            failure: Some(Box::new(f)),
            batches: AtomicUsize::new(0),
        }
    }

    pub fn overloaded() -> Self {
        Self::failing(|| TubesageError::BackendOverloaded("413 Request too large".to_string()))
    }

    /// Number of batch requests seen, failed ones included.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; FAKE_DIMENSIONS];
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if word.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() as usize) % FAKE_DIMENSIONS] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        Ok(vectors.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure());
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model(&self) -> &str {
        "fake-embedding"
    }
}

type ReplyFn = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Completion model that answers from a script and records its prompts.
pub struct ScriptedModel {
    reply: ReplyFn,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// Reply to each user prompt with `f(prompt)`.
    pub fn new(f: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(f),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(answer: &str) -> Self {
        let answer = answer.to_string();
        Self::new(move |_| Ok(answer.clone()))
    }

    pub fn failing(f: impl Fn() -> TubesageError + Send + Sync + 'static) -> Self {
        Self::new(move |_| Err(f()))
    }

    pub fn overloaded() -> Self {
        Self::failing(|| TubesageError::BackendOverloaded("rate_limit_exceeded".to_string()))
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(user.to_string());
        (self.reply)(user)
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

enum Reply {
    Track(CaptionTrack),
    Fail(ErrorFn),
}

/// Caption source returning a fixed track or failure.
pub struct StaticCaptionSource {
    reply: Reply,
    calls: AtomicUsize,
}

impl StaticCaptionSource {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn markup(body: &str) -> Self {
        Self::with_reply(Reply::Track(CaptionTrack::Markup {
            format: SubtitleFormat::Vtt,
            body: body.to_string(),
        }))
    }

    pub fn fragments(fragments: &[&str]) -> Self {
        Self::with_reply(Reply::Track(CaptionTrack::Fragments(
            fragments.iter().map(|f| f.to_string()).collect(),
        )))
    }

    /// Captions consisting of `text` as a single fragment.
    pub fn text(text: &str) -> Self {
        Self::fragments(&[text])
    }

    pub fn failing(f: impl Fn() -> TubesageError + Send + Sync + 'static) -> Self {
        Self::with_reply(Reply::Fail(Box::new(f)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptionSource for StaticCaptionSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_track(&self, _video: &VideoReference) -> Result<CaptionTrack> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Track(track) => Ok(track.clone()),
            Reply::Fail(f) => Err(f()),
        }
    }
}

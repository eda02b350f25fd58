//! Caption retrieval for YouTube videos.
//!
//! Provides a trait-based interface over caption sources (YouTube's player
//! API, yt-dlp) and turns whatever they return into a clean [`Transcript`].

mod cleanup;
mod timedtext;
mod ytdlp;

pub use cleanup::{clean_markup, collapse_repeated_runs, join_fragments, MAX_REPEATED_RUN};
pub use timedtext::TimedTextSource;
pub use ytdlp::YtDlpSource;

use crate::config::{CaptionProvider, Settings};
use crate::error::{Result, TubesageError};
use crate::transcript::Transcript;
use crate::video_id::{extract_video_id, VideoReference};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Subtitle markup formats a source may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Vtt,
    Srt,
}

/// Raw caption data as returned by a source.
#[derive(Debug, Clone)]
pub enum CaptionTrack {
    /// Caption fragments in temporal order.
    Fragments(Vec<String>),
    /// A subtitle file body.
    Markup { format: SubtitleFormat, body: String },
}

impl CaptionTrack {
    /// Plain transcript text for this track.
    pub fn into_text(self) -> String {
        match self {
            CaptionTrack::Fragments(fragments) => join_fragments(&fragments),
            CaptionTrack::Markup { body, .. } => clean_markup(&body),
        }
    }
}

/// Trait for caption providers.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch the best caption track for a video.
    async fn fetch_track(&self, video: &VideoReference) -> Result<CaptionTrack>;
}

/// Tries a primary source and falls back to a secondary one when the primary
/// could not produce a track.
pub struct FallbackSource {
    primary: Arc<dyn CaptionSource>,
    secondary: Arc<dyn CaptionSource>,
}

impl FallbackSource {
    pub fn new(primary: Arc<dyn CaptionSource>, secondary: Arc<dyn CaptionSource>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl CaptionSource for FallbackSource {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn fetch_track(&self, video: &VideoReference) -> Result<CaptionTrack> {
        match self.primary.fetch_track(video).await {
            Err(e @ (TubesageError::NoCaptionsFound | TubesageError::UnexpectedFetch(_))) => {
                warn!(
                    "{} could not fetch captions ({}), trying {}",
                    self.primary.name(),
                    e,
                    self.secondary.name()
                );
                self.secondary.fetch_track(video).await
            }
            other => other,
        }
    }
}

/// Create the caption source selected in the settings.
pub fn create_source(settings: &Settings) -> Result<Arc<dyn CaptionSource>> {
    let captions = &settings.captions;
    let timeout = Duration::from_secs(captions.timeout_secs);

    let timedtext = || -> Result<Arc<dyn CaptionSource>> {
        Ok(Arc::new(TimedTextSource::new(captions.languages.clone(), timeout)?))
    };
    let ytdlp = || -> Arc<dyn CaptionSource> {
        Arc::new(YtDlpSource::new(
            &captions.ytdlp_path,
            captions.languages.clone(),
            timeout,
            &settings.temp_dir(),
        ))
    };

    Ok(match captions.provider {
        CaptionProvider::TimedText => timedtext()?,
        CaptionProvider::YtDlp => ytdlp(),
        CaptionProvider::Auto => Arc::new(FallbackSource::new(timedtext()?, ytdlp())),
    })
}

/// Fetches captions and produces transcripts.
pub struct CaptionFetcher {
    source: Arc<dyn CaptionSource>,
}

impl CaptionFetcher {
    pub fn new(source: Arc<dyn CaptionSource>) -> Self {
        Self { source }
    }

    /// Fetch and clean the captions of a video.
    #[instrument(skip(self), fields(video = %video))]
    pub async fn fetch(&self, video: &VideoReference) -> Result<Transcript> {
        info!("Fetching captions via {}", self.source.name());
        let track = self.source.fetch_track(video).await?;

        let text = track.into_text();
        if text.trim().is_empty() {
            return Err(TubesageError::NoCaptionsFound);
        }

        info!("Transcript ready ({} chars)", text.chars().count());
        Ok(Transcript::new(video.clone(), text))
    }

    /// Extract the video id from a URL, then fetch its captions.
    pub async fn fetch_url(&self, url: &str) -> Result<Transcript> {
        let video = extract_video_id(url)?;
        self.fetch(&video).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticCaptionSource;

    fn video() -> VideoReference {
        VideoReference::new("dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_cleans_markup() {
        let source = StaticCaptionSource::markup(
            "WEBVTT\n\n00:00.000 --> 00:01.000\n<c>so so</c> we begin\n\n00:01.000 --> 00:02.000\nwe begin\n",
        );
        let fetcher = CaptionFetcher::new(Arc::new(source));
        let transcript = fetcher.fetch(&video()).await.unwrap();
        assert_eq!(transcript.text, "so we begin");
        assert_eq!(transcript.video, video());
    }

    #[tokio::test]
    async fn test_fetch_url_rejects_bad_url_before_fetching() {
        let source = Arc::new(StaticCaptionSource::fragments(&["unused"]));
        let fetcher = CaptionFetcher::new(source.clone());
        let err = fetcher.fetch_url("https://example.com").await.unwrap_err();
        assert!(matches!(err, TubesageError::InvalidUrl(_)));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_track_is_no_captions() {
        let fetcher = CaptionFetcher::new(Arc::new(StaticCaptionSource::markup("WEBVTT\n\n")));
        let err = fetcher.fetch(&video()).await.unwrap_err();
        assert!(matches!(err, TubesageError::NoCaptionsFound));
    }

    #[tokio::test]
    async fn test_failures_pass_through() {
        let fetcher = CaptionFetcher::new(Arc::new(StaticCaptionSource::failing(|| {
            TubesageError::CaptionsDisabled
        })));
        let err = fetcher.fetch(&video()).await.unwrap_err();
        assert_eq!(err.to_string(), "Transcripts are disabled for this video.");
    }

    #[tokio::test]
    async fn test_fallback_only_on_recoverable_failures() {
        let secondary = Arc::new(StaticCaptionSource::fragments(&["from", "secondary"]));

        let fallback = FallbackSource::new(
            Arc::new(StaticCaptionSource::failing(|| TubesageError::NoCaptionsFound)),
            secondary.clone(),
        );
        let track = fallback.fetch_track(&video()).await.unwrap();
        assert_eq!(track.into_text(), "from secondary");
        assert_eq!(secondary.calls(), 1);

        let fallback = FallbackSource::new(
            Arc::new(StaticCaptionSource::failing(|| TubesageError::VideoUnavailable)),
            secondary.clone(),
        );
        let err = fallback.fetch_track(&video()).await.unwrap_err();
        assert!(matches!(err, TubesageError::VideoUnavailable));
        assert_eq!(secondary.calls(), 1);
    }
}

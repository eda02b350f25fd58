//! Caption retrieval through YouTube's player API.
//!
//! Reads the caption track list from the innertube player response and
//! downloads the chosen track as `json3` fragments.

use super::{CaptionSource, CaptionTrack};
use crate::error::{Result, TubesageError};
use crate::video_id::VideoReference;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, instrument};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";
const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

static API_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("Invalid regex")
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrackInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrackInfo {
    base_url: String,
    language_code: String,
    /// `asr` for auto-generated tracks.
    kind: Option<String>,
}

impl CaptionTrackInfo {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

#[derive(Debug, Deserialize)]
struct Json3Response {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    segs: Option<Vec<Json3Segment>>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

/// Caption source backed by YouTube's player API.
pub struct TimedTextSource {
    client: reqwest::Client,
    base_url: String,
    languages: Vec<String>,
}

impl TimedTextSource {
    pub fn new(languages: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: YOUTUBE_BASE_URL.to_string(),
            languages,
        })
    }

    /// Point the source at a different host.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn fetch_api_key(&self, video: &VideoReference) -> Result<String> {
        let url = format!("{}/watch?v={}", self.base_url, video);
        let html = self
            .client
            .get(&url)
            .header("Accept-Language", "en-US")
            .send()
            .await
            .map_err(fetch_error)?
            .text()
            .await
            .map_err(fetch_error)?;

        extract_api_key(&html)
    }

    async fn fetch_player(&self, video: &VideoReference, api_key: &str) -> Result<PlayerResponse> {
        let url = format!("{}/youtubei/v1/player?key={}", self.base_url, api_key);
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": video.as_str(),
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(fetch_error)?
            .error_for_status()
            .map_err(fetch_error)?;

        response.json::<PlayerResponse>().await.map_err(fetch_error)
    }

    async fn fetch_json3(&self, track: &CaptionTrackInfo) -> Result<Vec<String>> {
        let url = json3_url(&track.base_url);
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(fetch_error)?
            .error_for_status()
            .map_err(fetch_error)?
            .text()
            .await
            .map_err(fetch_error)?;

        parse_json3(&body)
    }
}

#[async_trait]
impl CaptionSource for TimedTextSource {
    fn name(&self) -> &'static str {
        "timedtext"
    }

    #[instrument(skip_all, fields(video = %video))]
    async fn fetch_track(&self, video: &VideoReference) -> Result<CaptionTrack> {
        let api_key = self.fetch_api_key(video).await?;
        let player = self.fetch_player(video, &api_key).await?;
        let tracks = caption_tracks(player)?;

        let track = select_track(&tracks, &self.languages).ok_or(TubesageError::NoCaptionsFound)?;
        debug!(
            language = %track.language_code,
            generated = track.is_generated(),
            "Selected caption track"
        );

        let fragments = self.fetch_json3(track).await?;
        Ok(CaptionTrack::Fragments(fragments))
    }
}

fn fetch_error(e: reqwest::Error) -> TubesageError {
    TubesageError::UnexpectedFetch(e.to_string())
}

fn extract_api_key(html: &str) -> Result<String> {
    if html.contains("class=\"g-recaptcha\"") {
        return Err(TubesageError::UnexpectedFetch(
            "YouTube is asking for a captcha; too many requests from this IP".to_string(),
        ));
    }

    API_KEY_PATTERN
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            TubesageError::UnexpectedFetch("Could not find the player API key on the watch page".to_string())
        })
}

/// Map the player response onto its caption tracks or a typed failure.
fn caption_tracks(player: PlayerResponse) -> Result<Vec<CaptionTrackInfo>> {
    if let Some(status) = &player.playability_status {
        if status.status != "OK" {
            debug!(status = %status.status, reason = ?status.reason, "Video not playable");
            return Err(TubesageError::VideoUnavailable);
        }
    }

    let tracks = player
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .map(|r| r.caption_tracks)
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(TubesageError::CaptionsDisabled);
    }

    Ok(tracks)
}

/// Pick the best track: languages in preference order, manual before generated.
fn select_track<'a>(tracks: &'a [CaptionTrackInfo], languages: &[String]) -> Option<&'a CaptionTrackInfo> {
    languages.iter().find_map(|language| {
        let matching: Vec<&CaptionTrackInfo> = tracks
            .iter()
            .filter(|t| t.language_code == *language)
            .collect();
        matching
            .iter()
            .find(|t| !t.is_generated())
            .or_else(|| matching.first())
            .copied()
    })
}

fn json3_url(base_url: &str) -> String {
    let mut url = base_url.replace("\\u0026", "&");
    if let Some(start) = url.find("&fmt=") {
        let end = url[start + 1..]
            .find('&')
            .map(|i| start + 1 + i)
            .unwrap_or(url.len());
        url.replace_range(start..end, "");
    }
    format!("{}&fmt=json3", url)
}

fn parse_json3(body: &str) -> Result<Vec<String>> {
    let response: Json3Response = serde_json::from_str(body)
        .map_err(|e| TubesageError::UnexpectedFetch(format!("Failed to parse captions: {}", e)))?;

    Ok(response
        .events
        .into_iter()
        .filter_map(|event| event.segs)
        .map(|segs| segs.iter().map(|s| s.utf8.as_str()).collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect())
}

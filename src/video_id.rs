//! YouTube video identifier extraction.
//!
//! Turns the many shapes of YouTube links into a validated 11-character id.

use crate::error::{Result, TubesageError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Length of every YouTube video id.
pub const VIDEO_ID_LEN: usize = 11;

/// A validated YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoReference(String);

impl VideoReference {
    /// Validate a bare id.
    pub fn new(id: &str) -> Result<Self> {
        if !is_id_alphabet(id) {
            return Err(TubesageError::InvalidUrl(id.to_string()));
        }
        let len = id.chars().count();
        if len != VIDEO_ID_LEN {
            return Err(TubesageError::InvalidIdLength(len));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this video.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VideoReference {
    type Error = TubesageError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<VideoReference> for String {
    fn from(value: VideoReference) -> Self {
        value.0
    }
}

/// Ordered set of URL matchers.
pub struct VideoIdExtractor {
    patterns: Vec<Regex>,
    bare_id: Regex,
}

impl VideoIdExtractor {
    pub fn new() -> Self {
        // Each id must be followed by a non-id character or the end of input,
        // so a 12-character token never yields its first 11 characters.
        let patterns = [
            r"watch\?v=([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            r"youtu\.be/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            r"/embed/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            r"/v/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            r"/shorts/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("Invalid regex"))
        .collect();

        let bare_id = Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("Invalid regex");

        Self { patterns, bare_id }
    }

    /// Extract the video id from a URL (or a bare id).
    pub fn extract(&self, url: &str) -> Result<VideoReference> {
        let input = url.trim();

        if let Some(id) = self.match_patterns(input) {
            return Ok(VideoReference(id));
        }

        if let Some(id) = watch_query_param(input) {
            return Ok(VideoReference(id));
        }

        if self.bare_id.is_match(input) {
            return Ok(VideoReference(input.to_string()));
        }

        fallback_after_last_equals(input)
    }

    fn match_patterns(&self, input: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|re| re.captures(input))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

impl Default for VideoIdExtractor {
    fn default() -> Self {
        Self::new()
    }
}

static EXTRACTOR: LazyLock<VideoIdExtractor> = LazyLock::new(VideoIdExtractor::new);

/// Extract a video id using the default matcher set.
pub fn extract_video_id(url: &str) -> Result<VideoReference> {
    EXTRACTOR.extract(url)
}

/// `watch?...&v=<id>` where `v` is not the first query parameter.
fn watch_query_param(input: &str) -> Option<String> {
    let parsed = url::Url::parse(input).ok()?;
    if !parsed.path().ends_with("/watch") {
        return None;
    }
    parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|value| value.len() == VIDEO_ID_LEN && is_id_alphabet(value))
}

/// Last resort: whatever follows the final `=`, up to `&` or `#`.
fn fallback_after_last_equals(input: &str) -> Result<VideoReference> {
    let invalid = || TubesageError::InvalidUrl(input.to_string());

    let (_, tail) = input.rsplit_once('=').ok_or_else(invalid)?;
    let candidate = tail.split(['&', '#']).next().unwrap_or_default();

    if candidate.is_empty() || !is_id_alphabet(candidate) {
        return Err(invalid());
    }

    let len = candidate.chars().count();
    if len != VIDEO_ID_LEN {
        return Err(TubesageError::InvalidIdLength(len));
    }

    Ok(VideoReference(candidate.to_string()))
}

fn is_id_alphabet(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

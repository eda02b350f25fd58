//! The transcript of a single video.

use crate::video_id::VideoReference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Spoken content of a video as one ordered block of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Video this transcript belongs to.
    pub video: VideoReference,
    /// Caption text in temporal order.
    pub text: String,
    /// Hex SHA-256 of `text`; identifies this transcript version.
    pub content_hash: String,
    /// When the captions were fetched.
    pub fetched_at: DateTime<Utc>,
}

impl Transcript {
    pub fn new(video: VideoReference, text: String) -> Self {
        let content_hash = content_hash(&text);
        Self {
            video,
            text,
            content_hash,
            fetched_at: Utc::now(),
        }
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Hex-encoded SHA-256 of a text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_metrics() {
        let video = VideoReference::new("dQw4w9WgXcQ").unwrap();
        let transcript = Transcript::new(video, "never gonna give you up".to_string());
        assert_eq!(transcript.len(), 23);
        assert_eq!(transcript.word_count(), 5);
        assert_eq!(transcript.content_hash.len(), 64);
    }

    #[test]
    fn test_content_hash_tracks_text() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

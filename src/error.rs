//! Error types for Tubesage.

use thiserror::Error;

/// Library-level error type for Tubesage operations.
#[derive(Error, Debug)]
pub enum TubesageError {
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid video ID length: expected 11 characters, got {0}")]
    InvalidIdLength(usize),

    #[error("Transcripts are disabled for this video.")]
    CaptionsDisabled,

    #[error("The video is unavailable.")]
    VideoUnavailable,

    #[error("No captions found for this video.")]
    NoCaptionsFound,

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ExtractionUnavailable(String),

    #[error("Error fetching transcript: {0}")]
    UnexpectedFetch(String),

    #[error("No transcript available")]
    NoTranscript,

    /// The model or embedding backend rejected the request for size or quota reasons.
    #[error("Backend overloaded: {0}")]
    BackendOverloaded(String),

    /// A transient backend failure (network, timeout, 5xx). Safe to retry.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TubesageError {
    /// Whether this error came from identifier parsing or caption retrieval.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            TubesageError::InvalidUrl(_)
                | TubesageError::InvalidIdLength(_)
                | TubesageError::CaptionsDisabled
                | TubesageError::VideoUnavailable
                | TubesageError::NoCaptionsFound
                | TubesageError::ExtractionUnavailable(_)
                | TubesageError::UnexpectedFetch(_)
        )
    }

    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, TubesageError::BackendUnavailable(_))
    }
}

/// Result type alias for Tubesage operations.
pub type Result<T> = std::result::Result<T, TubesageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            TubesageError::CaptionsDisabled.to_string(),
            "Transcripts are disabled for this video."
        );
        assert_eq!(
            TubesageError::VideoUnavailable.to_string(),
            "The video is unavailable."
        );
        assert_eq!(TubesageError::NoTranscript.to_string(), "No transcript available");
    }

    #[test]
    fn test_classification() {
        assert!(TubesageError::NoCaptionsFound.is_fetch_error());
        assert!(!TubesageError::NoTranscript.is_fetch_error());
        assert!(TubesageError::BackendUnavailable("timeout".into()).is_transient());
        assert!(!TubesageError::BackendOverloaded("413".into()).is_transient());
    }
}

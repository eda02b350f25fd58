//! OpenAI-compatible client construction and error classification.
//!
//! Every backend call goes through a client built here, and every backend
//! failure is mapped onto [`TubesageError`] by [`classify_error`]. Nothing
//! outside this module looks at vendor error wording.

use crate::config::{EmbeddingSettings, LlmSettings};
use crate::error::{Result, TubesageError};
use async_openai::{config::OpenAIConfig, error::OpenAIError, Client};
use std::time::Duration;

pub type OpenAIClient = Client<OpenAIConfig>;

/// Create the client used for chat completions.
pub fn create_chat_client(settings: &LlmSettings) -> Result<OpenAIClient> {
    create_client(
        settings.api_base.as_deref(),
        &settings.api_key_env,
        Duration::from_secs(settings.timeout_secs),
        Duration::from_secs(settings.max_rate_limit_wait_secs),
    )
}

/// Create the client used for embeddings.
///
/// Embedding requests share the chat timeout and rate-limit budget.
pub fn create_embedding_client(
    settings: &EmbeddingSettings,
    llm: &LlmSettings,
) -> Result<OpenAIClient> {
    create_client(
        settings.api_base.as_deref().or(llm.api_base.as_deref()),
        &settings.api_key_env,
        Duration::from_secs(llm.timeout_secs),
        Duration::from_secs(llm.max_rate_limit_wait_secs),
    )
}

/// Create a client against `api_base` with the key read from `api_key_env`.
///
/// `max_rate_limit_wait` caps how long the client keeps retrying 429s on its
/// own before handing the error back.
pub fn create_client(
    api_base: Option<&str>,
    api_key_env: &str,
    timeout: Duration,
    max_rate_limit_wait: Duration,
) -> Result<OpenAIClient> {
    let api_key = std::env::var(api_key_env).map_err(|_| {
        TubesageError::Config(format!("{} environment variable is not set", api_key_env))
    })?;

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base {
        config = config.with_api_base(base.trim_end_matches('/'));
    }

    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let backoff = backoff::ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(max_rate_limit_wait))
        .build();

    Ok(Client::with_config(config)
        .with_http_client(http_client)
        .with_backoff(backoff))
}

/// Map a backend error onto the crate taxonomy.
pub fn classify_error(err: OpenAIError, context: &str) -> TubesageError {
    let message = err.to_string();

    if is_overload_message(&message) {
        return TubesageError::BackendOverloaded(format!("{}: {}", context, message));
    }

    let transient = match &err {
        OpenAIError::Reqwest(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status().is_some_and(|s| s.is_server_error())
        }
        OpenAIError::ApiError(api) => api.r#type.as_deref() == Some("server_error"),
        _ => false,
    };

    if transient {
        TubesageError::BackendUnavailable(format!("{}: {}", context, message))
    } else {
        TubesageError::Unexpected(format!("{}: {}", context, message))
    }
}

/// Whether a backend message describes a size or rate rejection.
fn is_overload_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("413")
        || lower.contains("request too large")
        || lower.contains("rate_limit_exceeded")
        || lower.contains("429")
        || lower.contains("rate limit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overload_messages() {
        assert!(is_overload_message(
            "Request too large for gpt-4o-mini on tokens per min (TPM)"
        ));
        assert!(is_overload_message("Rate limit reached for model"));
        assert!(is_overload_message("code: rate_limit_exceeded"));
        assert!(is_overload_message("HTTP status client error (413 Payload Too Large)"));
        assert!(!is_overload_message("Incorrect API key provided"));
    }

    #[test]
    fn test_classify_error() {
        let err = classify_error(
            OpenAIError::InvalidArgument("Rate limit reached".to_string()),
            "embedding",
        );
        assert!(matches!(err, TubesageError::BackendOverloaded(_)));
        assert!(err.to_string().contains("embedding"));

        let err = classify_error(
            OpenAIError::InvalidArgument("model not found".to_string()),
            "completion",
        );
        assert!(matches!(err, TubesageError::Unexpected(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_missing_api_key() {
        let err = create_client(
            None,
            "TUBESAGE_TEST_KEY_THAT_IS_NOT_SET",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, TubesageError::Config(_)));
    }

    #[test]
    fn test_client_with_api_base() {
        std::env::set_var("TUBESAGE_TEST_OPENAI_KEY", "sk-test");
        let client = create_client(
            Some("https://api.groq.com/openai/v1/"),
            "TUBESAGE_TEST_OPENAI_KEY",
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(client.is_ok());
    }
}

//! Chat-completion capability used for summaries and answers.

mod openai;

pub use openai::OpenAIChatModel;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for chat-completion backends.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a single-turn conversation.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Model name, used in logs.
    fn model(&self) -> &str;
}

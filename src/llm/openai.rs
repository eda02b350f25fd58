//! OpenAI-compatible chat completions.

use super::LanguageModel;
use crate::config::LlmSettings;
use crate::error::{Result, TubesageError};
use crate::openai::{classify_error, create_chat_client, OpenAIClient};
use crate::retry::RetryPolicy;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Chat model backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIChatModel {
    client: OpenAIClient,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl OpenAIChatModel {
    pub fn new(settings: &LlmSettings, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: create_chat_client(settings)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            retry,
        })
    }

    async fn request(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(build_error)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(build_error)?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(build_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| classify_error(e, "Completion request failed"))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TubesageError::Unexpected("Empty response from model".to_string()))
    }
}

fn build_error(e: async_openai::error::OpenAIError) -> TubesageError {
    TubesageError::Unexpected(format!("Failed to build completion request: {}", e))
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        debug!("Prompt size: {} chars", system.len() + user.len());
        let answer = self
            .retry
            .run("completion request", || self.request(system, user))
            .await?;
        debug!("Completion size: {} chars", answer.len());
        Ok(answer)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

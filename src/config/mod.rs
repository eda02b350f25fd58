//! Configuration module for Tubesage.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts, SummaryPrompts};
pub use settings::{
    CaptionProvider, CaptionSettings, ChunkingSettings, EmbeddingSettings, GeneralSettings,
    LlmSettings, PromptSettings, RagSettings, RetrySettings, ServerSettings, SessionSettings,
    Settings, SummarySettings,
};

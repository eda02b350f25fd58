//! Tubesage - YouTube captions, summaries and RAG
//!
//! Fetches a video's captions, produces a summary that degrades gracefully
//! when the model backend is overloaded, and answers questions about the
//! transcript with retrieval-augmented generation.
//!
//! # Architecture
//!
//! - `video_id` - YouTube URL parsing
//! - `captions` - Caption retrieval and cleanup
//! - `chunking` - Word-boundary chunking
//! - `embedding` / `llm` - Model backend traits and OpenAI-compatible adapters
//! - `vector_store` - In-memory similarity search
//! - `rag` - Retrieval index and question answering
//! - `summarizer` - Summary policy with overload fallbacks
//! - `session` - Per-session transcript state
//! - `orchestrator` - Pipeline coordination
//! - `cli` - Command line and HTTP surface
//!
//! # Example
//!
//! ```rust,no_run
//! use tubesage::config::Settings;
//! use tubesage::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(Settings::load()?)?;
//!
//!     let result = orchestrator
//!         .ingest("default", "https://youtu.be/dQw4w9WgXcQ")
//!         .await?;
//!     println!("{}", result.summary);
//!
//!     let answer = orchestrator.ask("default", "What is the video about?").await?;
//!     println!("{}", answer);
//!
//!     Ok(())
//! }
//! ```

pub mod captions;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod retry;
pub mod session;
pub mod summarizer;
pub mod transcript;
pub mod vector_store;
pub mod video_id;

#[cfg(test)]
mod testing;

pub use error::{Result, TubesageError};

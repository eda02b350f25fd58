//! Retrieval-augmented question answering over a single transcript.

pub mod context;
mod index;

pub use context::{format_context_for_display, format_context_for_prompt};
pub use index::{IndexOptions, RetrievalIndex, OVERLOAD_ADVISORY};

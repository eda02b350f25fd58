//! Context formatting for retrieval prompts.

use crate::vector_store::SearchResult;

/// Join retrieved passages into the prompt context, best match first.
pub fn format_context_for_prompt(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.passage.content.trim())
        .filter(|content| !content.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One line per retrieved passage, for verbose terminal output.
pub fn format_context_for_display(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| {
            let preview: String = r.passage.content.chars().take(80).collect();
            format!("#{} (score: {:.2}) {}...", r.passage.order + 1, r.score, preview)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

//! Summarize command implementation.

use crate::cli::output::format_chars;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{IngestResult, Orchestrator};
use crate::session::DEFAULT_SESSION_ID;
use crate::summarizer::SummaryKind;
use anyhow::Result;

/// Run the summarize command.
pub async fn run_summarize(url: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubesage doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let result = ingest_with_spinner(&orchestrator, DEFAULT_SESSION_ID, url).await?;
    print_summary(&result);

    Ok(())
}

/// Ingest a video while showing a spinner.
pub(crate) async fn ingest_with_spinner(
    orchestrator: &Orchestrator,
    session_id: &str,
    url: &str,
) -> Result<IngestResult> {
    let spinner = Output::spinner("Fetching captions and summarizing...");
    let result = orchestrator.ingest(session_id, url).await;
    spinner.finish_and_clear();

    match result {
        Ok(result) => Ok(result),
        Err(e) => {
            Output::error(&e.to_string());
            Err(e.into())
        }
    }
}

pub(crate) fn print_summary(result: &IngestResult) {
    Output::header(&format!("Summary of {}", result.video.watch_url()));
    Output::kv("Transcript", &format_chars(result.transcript_chars));
    Output::kv("Method", &result.kind.to_string());
    println!();
    Output::block(&result.summary);
    println!();

    match result.kind {
        SummaryKind::Truncated | SummaryKind::Extractive => {
            Output::warning("The model backend was overloaded; this summary was built without it.");
        }
        SummaryKind::Model | SummaryKind::Chunked => {}
    }
}

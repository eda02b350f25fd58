//! Pre-flight checks before expensive operations.
//!
//! Validates that the model backend and caption tools are configured before
//! starting work that would otherwise fail midway.

use crate::config::{CaptionProvider, Settings};
use crate::error::{Result, TubesageError};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingesting a video needs captions and the model backend.
    Ingest,
    /// Serving needs the model backend; caption tools are checked per request.
    Serve,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_api_key(&settings.llm.api_key_env)?;
    if settings.embedding.api_key_env != settings.llm.api_key_env {
        check_api_key(&settings.embedding.api_key_env)?;
    }

    if let Operation::Ingest = operation {
        // Auto falls back to the player API when yt-dlp is missing
        if settings.captions.provider == CaptionProvider::YtDlp {
            check_tool(&settings.captions.ytdlp_path)?;
        }
    }
    Ok(())
}

/// Check that the API key variable is set.
pub fn check_api_key(var: &str) -> Result<()> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        Ok(_) => Err(TubesageError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            var, var
        ))),
        Err(_) => Err(TubesageError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            var, var
        ))),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(TubesageError::ExtractionUnavailable(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TubesageError::ExtractionUnavailable(name.to_string()))
        }
        Err(e) => Err(TubesageError::ExtractionUnavailable(format!("{}: {}", name, e))),
    }
}

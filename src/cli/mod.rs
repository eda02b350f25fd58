//! CLI module for Tubesage.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Tubesage - summarize YouTube videos and chat with them
///
/// Fetches a video's captions, summarizes them with an OpenAI-compatible model
/// and answers follow-up questions from the transcript.
#[derive(Parser, Debug)]
#[command(name = "tubesage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "TUBESAGE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host from the config)
        #[arg(long, env = "TUBESAGE_HOST")]
        host: Option<String>,

        /// Port to bind to (defaults to server.port from the config)
        #[arg(short, long, env = "TUBESAGE_PORT")]
        port: Option<u16>,
    },

    /// Fetch a video's captions and print a summary
    Summarize {
        /// YouTube URL or video ID
        url: String,
    },

    /// Summarize a video, then ask questions about it interactively
    Chat {
        /// YouTube URL or video ID
        url: String,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

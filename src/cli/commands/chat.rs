//! Interactive chat about a single video.

use super::summarize::{ingest_with_spinner, print_summary};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::session::DEFAULT_SESSION_ID;
use console::style;
use std::io::{self, BufRead, Write};

/// What the chat loop should do with a line of input.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Skip,
    Exit,
    Question(&'a str),
}

fn parse_input(line: &str) -> ChatInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        ChatInput::Skip
    } else if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        ChatInput::Exit
    } else {
        ChatInput::Question(line)
    }
}

/// Run the interactive chat command.
pub async fn run_chat(url: &str, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubesage doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let result = ingest_with_spinner(&orchestrator, DEFAULT_SESSION_ID, url).await?;
    print_summary(&result);

    println!("{}", style("Tubesage Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask questions about the video, or 'exit' to quit.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let question = match parse_input(&line) {
            ChatInput::Skip => continue,
            ChatInput::Exit => {
                Output::info("Goodbye!");
                break;
            }
            ChatInput::Question(q) => q,
        };

        let spinner = Output::spinner("Thinking...");
        let answer = orchestrator.ask(DEFAULT_SESSION_ID, question).await;
        spinner.finish_and_clear();

        match answer {
            Ok(answer) => {
                println!("\n{} {}\n", style("Tubesage:").cyan().bold(), answer);
            }
            Err(e) => {
                Output::error(&e.to_string());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("   \n"), ChatInput::Skip);
        assert_eq!(parse_input("QUIT\n"), ChatInput::Exit);
        assert_eq!(
            parse_input("  what is borrowing?\n"),
            ChatInput::Question("what is borrowing?")
        );
    }
}

//! Chat command handler.
//!
//! A line-based REPL. The conversation history lives here, not in the
//! engine: each answered exchange is appended and the engine keeps only the
//! most recent turns when building a prompt.

use super::output;
use clap::Args;
use edith_core::{config::AppConfig, AppResult};
use edith_knowledge::{RagEngine, SummaryStyle, Turn};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive conversation
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Hide the sources printed after each grounded answer
    #[arg(long)]
    pub no_sources: bool,
}

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Summary,
    Reset,
    Empty,
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "" => Input::Empty,
        "quit" | "exit" | "/quit" | "/exit" => Input::Quit,
        "summary" | "/summary" => Input::Summary,
        "reset" | "/reset" => Input::Reset,
        _ => Input::Message(trimmed),
    }
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let engine = RagEngine::from_config(config)?;
        let mut history: Vec<Turn> = Vec::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        eprintln!("EDITH chat. Type 'summary' for an overview of your notes, 'quit' to leave.");

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_input(&line) {
                Input::Empty => continue,
                Input::Quit => break,
                Input::Reset => {
                    history.clear();
                    println!("History cleared.");
                }
                Input::Summary => match engine.summarize(SummaryStyle::default()).await {
                    Ok(summary) => println!("{}\n", summary),
                    Err(err) => output::print_error(&err, false),
                },
                Input::Message(text) => match engine.query(text, &history).await {
                    Ok(payload) => {
                        println!("{}", payload.answer);
                        if !self.no_sources {
                            output::print_sources(&payload.sources);
                        }
                        println!();
                        history.push(Turn::user(text));
                        history.push(Turn::assistant(payload.answer));
                    }
                    // A failed turn is reported and left out of the history
                    Err(err) => output::print_error(&err, false),
                },
            }
        }

        tracing::debug!(turns = history.len(), "Chat finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  quit "), Input::Quit);
        assert_eq!(parse_input("EXIT"), Input::Quit);
        assert_eq!(parse_input("summary"), Input::Summary);
        assert_eq!(parse_input("/reset"), Input::Reset);
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(
            parse_input(" what is a summary? "),
            Input::Message("what is a summary?")
        );
    }
}

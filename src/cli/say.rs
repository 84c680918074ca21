//! One-shot "say" command: stream a single reply to stdout.

use std::error::Error;
use std::io;

use crate::cli::printer::StreamPrinter;
use crate::core::error::ChatError;
use crate::core::session::{ChatSession, StreamOutcome};
use crate::utils::logging::TranscriptLog;

pub async fn run_say(
    mut session: ChatSession,
    transcript: TranscriptLog,
    prompt: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    let mut printer = StreamPrinter::new(io::stdout());

    let result = session.send(&prompt, &mut printer).await;
    printer.finish_turn()?;

    if transcript.is_active() {
        for message in session.messages() {
            transcript.log_message(message)?;
        }
    }

    match result {
        Ok(StreamOutcome::Completed) | Ok(StreamOutcome::Cancelled) => Ok(()),
        Err(ChatError::EmptyInput) => {
            eprintln!("Usage: codex-chat say <prompt>");
            std::process::exit(1);
        }
        Err(ChatError::Transport(err)) => {
            eprintln!("❌ Error: {err}");
            std::process::exit(1);
        }
    }
}

//! Line-oriented interactive chat on stdin/stdout.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::cli::printer::StreamPrinter;
use crate::core::error::ChatError;
use crate::core::session::{ChatSession, StreamOutcome};
use crate::utils::logging::TranscriptLog;

const QUIT_COMMAND: &str = "/quit";

pub async fn run_chat(
    mut session: ChatSession,
    transcript: TranscriptLog,
) -> Result<(), Box<dyn Error>> {
    println!("Chatting with {}", session.chat_url());
    println!("Transcript logging: {}", transcript.get_status_string());
    println!("Type a message and press Enter. Ctrl+C stops a reply, {QUIT_COMMAND} exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printer = StreamPrinter::new(io::stdout());

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        if line.trim() == QUIT_COMMAND {
            break;
        }

        let cancel_token = CancellationToken::new();
        let interrupt = {
            let cancel_token = cancel_token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel_token.cancel();
                }
            })
        };

        let turn_start = session.messages().len();
        let result = session.send_with_cancel(&line, &mut printer, cancel_token).await;
        interrupt.abort();
        printer.finish_turn()?;

        match result {
            Ok(StreamOutcome::Completed) => {}
            Ok(StreamOutcome::Cancelled) => println!("(reply stopped)"),
            Err(ChatError::EmptyInput) => continue,
            // The failure notice is already in the log and on screen.
            Err(ChatError::Transport(_)) => {}
        }

        if !transcript.is_active() {
            continue;
        }
        for message in &session.messages()[turn_start..] {
            if let Err(err) = transcript.log_message(message) {
                eprintln!("Failed to log message: {err}");
            }
        }
    }

    Ok(())
}

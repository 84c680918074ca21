use std::io::{self, Write};

use crate::core::conversation::ConversationObserver;
use crate::core::message::ChatMessage;

/// Writes assistant text to `out` as it grows. User turns are not echoed.
pub struct StreamPrinter<W: Write> {
    out: W,
    /// First message not yet fully written.
    cursor: usize,
    /// Bytes of `messages[cursor]` already written.
    printed: usize,
    line_open: bool,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            cursor: 0,
            printed: 0,
            line_open: false,
        }
    }

    /// Terminate the current reply line, if any text was written.
    pub fn finish_turn(&mut self) -> io::Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.line_open = false;
        }
        self.out.flush()
    }

    fn write_update(&mut self, messages: &[ChatMessage]) -> io::Result<()> {
        while let Some(message) = messages.get(self.cursor) {
            let is_last = self.cursor + 1 == messages.len();

            if message.is_assistant() {
                let fresh = message.content.get(self.printed..).unwrap_or_default();
                if !fresh.is_empty() {
                    self.out.write_all(fresh.as_bytes())?;
                    self.line_open = true;
                }
                self.printed = message.content.len();
                if is_last {
                    break;
                }
                if self.line_open {
                    writeln!(self.out)?;
                    self.line_open = false;
                }
            }

            self.cursor += 1;
            self.printed = 0;
        }
        self.out.flush()
    }
}

impl<W: Write> ConversationObserver for StreamPrinter<W> {
    fn on_update(&mut self, messages: &[ChatMessage]) {
        if let Err(err) = self.write_update(messages) {
            tracing::warn!(error = %err, "failed to write reply to terminal");
        }
    }
}

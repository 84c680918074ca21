//! Incremental newline framing over raw response chunks.
//!
//! Chunks arrive with no regard for line or UTF-8 boundaries. Bytes are
//! buffered until a `\n` shows up; only then is the line decoded as text. A
//! `\n` byte never occurs inside a multi-byte UTF-8 sequence, so a character
//! split across two chunks simply waits in the buffer until the rest of its
//! line has arrived.

use memchr::memchr;
use tracing::debug;

#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the lines it completed.
    ///
    /// The iterator is lazy: lines not pulled from it stay buffered and are
    /// returned by the next call (or discarded by [`LineDecoder::finish`]).
    pub fn feed(&mut self, chunk: &[u8]) -> DecodedLines<'_> {
        self.buffer.extend_from_slice(chunk);
        DecodedLines { decoder: self }
    }

    /// Pop the next complete line, if the buffer holds one.
    pub fn next_line(&mut self) -> Option<String> {
        let newline_pos = memchr(b'\n', &self.buffer)?;
        let mut end = newline_pos;
        if end > 0 && self.buffer[end - 1] == b'\r' {
            end -= 1;
        }
        let line = String::from_utf8_lossy(&self.buffer[..end]).into_owned();
        self.buffer.drain(..=newline_pos);
        Some(line)
    }

    /// Bytes received but not yet part of an emitted line.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// End of stream. An unterminated trailing line is dropped, never emitted.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            debug!(
                bytes = self.buffer.len(),
                "discarding unterminated trailing line at end of stream"
            );
            self.buffer.clear();
        }
    }
}

pub struct DecodedLines<'a> {
    decoder: &'a mut LineDecoder,
}

impl Iterator for DecodedLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.decoder.next_line()
    }
}

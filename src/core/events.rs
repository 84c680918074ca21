use tracing::trace;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Token(String),
    End,
}

/// How a decoded line was understood.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineKind {
    Event(StreamEvent),
    /// `data: ` with nothing after it.
    KeepAlive,
    /// Anything without the data prefix, blank lines included.
    Unrecognized,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    // Prefix first, then trim: a bare "data:" must stay unrecognized.
    let payload = line.trim_start().strip_prefix(DATA_PREFIX)?;
    Some(payload.trim_end())
}

pub fn classify_line(line: &str) -> LineKind {
    match extract_data_payload(line) {
        Some(DONE_SENTINEL) => LineKind::Event(StreamEvent::End),
        Some("") => LineKind::KeepAlive,
        Some(payload) => LineKind::Event(StreamEvent::Token(payload.to_string())),
        None => LineKind::Unrecognized,
    }
}

/// Turns decoded lines into events for a single response, going quiet after
/// the completion sentinel.
#[derive(Debug, Default)]
pub struct EventParser {
    finished: bool,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn parse_line(&mut self, line: &str) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        match classify_line(line) {
            LineKind::Event(StreamEvent::End) => {
                self.finished = true;
                Some(StreamEvent::End)
            }
            LineKind::Event(event) => Some(event),
            LineKind::KeepAlive => None,
            LineKind::Unrecognized => {
                trace!(line, "ignoring line without data prefix");
                None
            }
        }
    }
}

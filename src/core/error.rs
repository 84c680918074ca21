use std::error::Error as StdError;
use std::fmt;

/// The response could not be obtained or was cut off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, TLS...).
    Request(String),
    /// The server answered with a non-success status.
    Status { status: u16, summary: String },
    /// The body failed part way through.
    Body(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Request(detail) => write!(f, "request failed: {detail}"),
            TransportError::Status { status, summary } if summary.is_empty() => {
                write!(f, "server returned HTTP {status}")
            }
            TransportError::Status { status, summary } => {
                write!(f, "server returned HTTP {status}: {summary}")
            }
            TransportError::Body(detail) => write!(f, "response stream failed: {detail}"),
        }
    }
}

impl StdError for TransportError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The prompt was empty or only whitespace; nothing was sent.
    EmptyInput,
    /// The turn failed. The failure notice is already in the log.
    Transport(TransportError),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::EmptyInput => write!(f, "prompt is empty"),
            ChatError::Transport(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for ChatError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ChatError::EmptyInput => None,
            ChatError::Transport(err) => Some(err),
        }
    }
}

impl From<TransportError> for ChatError {
    fn from(err: TransportError) -> Self {
        ChatError::Transport(err)
    }
}

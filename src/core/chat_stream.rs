use std::fmt::Display;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ChatRequest;
use crate::core::error::TransportError;
use crate::core::events::{EventParser, StreamEvent};
use crate::core::line_decoder::LineDecoder;

const ERROR_SUMMARY_LIMIT: usize = 200;
/// Bytes of a non-success response body read for its summary.
const ERROR_BODY_LIMIT: usize = 8 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Token(String),
    Error(TransportError),
    End,
}

pub type StreamSender = mpsc::UnboundedSender<(StreamMessage, u64)>;
pub type StreamReceiver = mpsc::UnboundedReceiver<(StreamMessage, u64)>;

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))
        .or_else(|| value.get("detail").and_then(|v| v.as_str()))
        .map(str::to_owned)
}

/// One-line description of an error response body.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    let text = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| extract_error_summary(&value))
        .unwrap_or_else(|| trimmed.to_string());

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > ERROR_SUMMARY_LIMIT {
        let cut: String = collapsed.chars().take(ERROR_SUMMARY_LIMIT).collect();
        format!("{cut}…")
    } else {
        collapsed
    }
}

/// Collect at most `limit` bytes from `byte_stream`, stopping early at its
/// end or first error.
async fn read_capped<S, B, E>(byte_stream: S, limit: usize) -> Vec<u8>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut byte_stream = std::pin::pin!(byte_stream);
    let mut body = Vec::new();
    while body.len() < limit {
        match byte_stream.next().await {
            Some(Ok(chunk)) => body.extend_from_slice(chunk.as_ref()),
            Some(Err(e)) => {
                debug!(error = %e, "error body cut short");
                break;
            }
            None => break,
        }
    }
    body.truncate(limit);
    body
}

/// Drive a response body through line decoding and event parsing, forwarding
/// each event tagged with `stream_id`.
///
/// Stops after the `[DONE]` sentinel, on the first transport error, when the
/// body ends, or when `cancel_token` fires. A cancelled stream sends nothing
/// further.
pub async fn forward_events<S, B, E>(
    byte_stream: S,
    cancel_token: &CancellationToken,
    tx: &StreamSender,
    stream_id: u64,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut byte_stream = std::pin::pin!(byte_stream);
    let mut decoder = LineDecoder::new();
    let mut parser = EventParser::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!(stream_id, "stream cancelled");
                return;
            }
            next = byte_stream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                for line in decoder.feed(chunk.as_ref()) {
                    match parser.parse_line(&line) {
                        Some(StreamEvent::Token(text)) => {
                            let _ = tx.send((StreamMessage::Token(text), stream_id));
                        }
                        Some(StreamEvent::End) => {
                            debug!(stream_id, "received completion sentinel");
                            let _ = tx.send((StreamMessage::End, stream_id));
                            return;
                        }
                        None => {}
                    }
                }
            }
            Some(Err(e)) => {
                debug!(stream_id, error = %e, "response body failed");
                let error = TransportError::Body(e.to_string());
                let _ = tx.send((StreamMessage::Error(error), stream_id));
                return;
            }
            None => {
                decoder.finish();
                debug!(stream_id, "response body ended without sentinel");
                let _ = tx.send((StreamMessage::End, stream_id));
                return;
            }
        }
    }
}

async fn open_response(
    client: &reqwest::Client,
    url: &str,
    prompt: String,
) -> Result<reqwest::Response, TransportError> {
    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(&ChatRequest { prompt })
        .send()
        .await
        .map_err(|e| TransportError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = read_capped(response.bytes_stream(), ERROR_BODY_LIMIT).await;
        return Err(TransportError::Status {
            status: status.as_u16(),
            summary: summarize_error_body(&String::from_utf8_lossy(&body)),
        });
    }

    Ok(response)
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub url: String,
    pub prompt: String,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: StreamSender,
}

impl ChatStreamService {
    pub fn new() -> (Self, StreamReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                url,
                prompt,
                cancel_token,
                stream_id,
            } = params;

            tokio::select! {
                _ = async {
                    debug!(stream_id, %url, "opening chat stream");
                    match open_response(&client, &url, prompt).await {
                        Ok(response) => {
                            forward_events(response.bytes_stream(), &cancel_token, &tx, stream_id)
                                .await;
                        }
                        Err(error) => {
                            let _ = tx.send((StreamMessage::Error(error), stream_id));
                        }
                    }
                } => {}
                _ = cancel_token.cancelled() => {}
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}

//! End-to-end streaming tests against a wiremock server and a raw TCP server
//! for body failures and stalled connections.

use std::time::Duration;

use codex_chat::core::config::ChatSettings;
use codex_chat::core::constants::FETCH_FAILED_MESSAGE;
use codex_chat::core::conversation::{AccumulatorState, ConversationObserver};
use codex_chat::core::error::{ChatError, TransportError};
use codex_chat::core::message::ChatMessage;
use codex_chat::core::session::{ChatSession, StreamOutcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

async fn mock_backend(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;
    server
}

fn session_for(base_url: String) -> ChatSession {
    let settings = ChatSettings {
        base_url,
        ..ChatSettings::default()
    };
    ChatSession::from_settings(&settings).expect("client should build")
}

fn ignore_updates(_: &[ChatMessage]) {}

struct BusyRecorder<'a>(&'a mut Vec<bool>);

impl ConversationObserver for BusyRecorder<'_> {
    fn on_update(&mut self, _: &[ChatMessage]) {}

    fn on_busy(&mut self, busy: bool) {
        self.0.push(busy);
    }
}

#[tokio::test]
async fn posts_prompt_and_accumulates_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({ "prompt": "hi" })))
        .respond_with(sse_response("data: Hello\ndata:  World\ndata: [DONE]\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(server.uri());
    let mut snapshots: Vec<Vec<ChatMessage>> = Vec::new();
    let mut observer = |messages: &[ChatMessage]| snapshots.push(messages.to_vec());

    let outcome = session.send("hi", &mut observer).await;

    assert_eq!(outcome, Ok(StreamOutcome::Completed));
    assert_eq!(
        session.messages(),
        &[ChatMessage::user("hi"), ChatMessage::assistant("Hello World")]
    );
    let replies: Vec<_> = snapshots
        .iter()
        .filter_map(|log| log.last())
        .filter(|m| m.is_assistant())
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(replies, vec!["Hello", "Hello World"]);
}

#[tokio::test]
async fn error_status_becomes_failure_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": { "message": "model overloaded" }
        })))
        .mount(&server)
        .await;

    let mut session = session_for(server.uri());
    let result = session.send("hi", &mut ignore_updates).await;

    assert_eq!(
        result,
        Err(ChatError::Transport(TransportError::Status {
            status: 500,
            summary: "model overloaded".into(),
        }))
    );
    assert_eq!(
        session.messages(),
        &[
            ChatMessage::user("hi"),
            ChatMessage::assistant(FETCH_FAILED_MESSAGE)
        ]
    );
    assert!(!session.is_busy());
}

#[tokio::test]
async fn tokens_after_sentinel_are_ignored() {
    let server = mock_backend("data: a\ndata: [DONE]\ndata: b\n").await;
    let mut session = session_for(server.uri());

    session.send("hi", &mut ignore_updates).await.unwrap();

    assert_eq!(session.messages().last(), Some(&ChatMessage::assistant("a")));
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn clean_end_without_sentinel_drops_unterminated_tail() {
    let server = mock_backend("data: kept\ndata: lost").await;
    let mut session = session_for(server.uri());

    let outcome = session.send("hi", &mut ignore_updates).await;

    assert_eq!(outcome, Ok(StreamOutcome::Completed));
    assert_eq!(
        session.messages().last(),
        Some(&ChatMessage::assistant("kept"))
    );
}

#[tokio::test]
async fn unrecognized_lines_never_touch_the_log() {
    let server =
        mock_backend("event: ping\n\n: comment\ndata: \ndata:[DONE]\ndata: [DONE]\n").await;
    let mut session = session_for(server.uri());

    let outcome = session.send("hi", &mut ignore_updates).await;

    assert_eq!(outcome, Ok(StreamOutcome::Completed));
    assert_eq!(session.messages(), &[ChatMessage::user("hi")]);
}

#[tokio::test]
async fn each_turn_gets_its_own_assistant_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(serde_json::json!({ "prompt": "first" })))
        .respond_with(sse_response("data: One\ndata: [DONE]\n"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(serde_json::json!({ "prompt": "second" })))
        .respond_with(sse_response("data: Two\ndata: [DONE]\n"))
        .mount(&server)
        .await;

    let mut session = session_for(server.uri());
    session.send("first", &mut ignore_updates).await.unwrap();
    session.send("second", &mut ignore_updates).await.unwrap();

    assert_eq!(
        session.messages(),
        &[
            ChatMessage::user("first"),
            ChatMessage::assistant("One"),
            ChatMessage::user("second"),
            ChatMessage::assistant("Two"),
        ]
    );
}

/// What the raw server does once its chunks are written.
enum Ending {
    /// Close the socket without the terminating zero-length chunk.
    Drop,
    /// Keep the connection open.
    Hang,
    /// Keep the connection open and signal once the client closes it.
    HangUntilClosed(oneshot::Sender<()>),
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.expect("read request");
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + content_length {
            return;
        }
    }
}

/// Serve one chunked response, written chunk by chunk exactly as given.
async fn raw_backend(chunks: Vec<&'static [u8]>, ending: Ending) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        read_request(&mut socket).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
            )
            .await
            .expect("write head");
        for chunk in chunks {
            let mut framed = format!("{:x}\r\n", chunk.len()).into_bytes();
            framed.extend_from_slice(chunk);
            framed.extend_from_slice(b"\r\n");
            socket.write_all(&framed).await.expect("write chunk");
            socket.flush().await.expect("flush");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        match ending {
            Ending::Drop => drop(socket),
            Ending::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(socket);
            }
            Ending::HangUntilClosed(closed) => {
                let mut buf = [0u8; 64];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
                let _ = closed.send(());
            }
        }
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn chunks_split_mid_line_and_sentinel_ends_turn_without_eof() {
    let base = raw_backend(
        vec![
            b"data: Hel".as_slice(),
            b"lo\ndata: ".as_slice(),
            b" World\ndata: [DONE]\n".as_slice(),
        ],
        Ending::Hang,
    )
    .await;
    let mut session = session_for(base);

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        session.send("hi", &mut ignore_updates),
    )
    .await
    .expect("sentinel should end the turn");

    assert_eq!(outcome, Ok(StreamOutcome::Completed));
    assert_eq!(
        session.messages(),
        &[ChatMessage::user("hi"), ChatMessage::assistant("Hello World")]
    );
}

#[tokio::test]
async fn multibyte_characters_split_across_chunks_survive() {
    // "é" is 0xC3 0xA9, split between the two chunks.
    let base = raw_backend(
        vec![
            b"data: caf\xC3".as_slice(),
            b"\xA9\ndata: [DONE]\n".as_slice(),
        ],
        Ending::Hang,
    )
    .await;
    let mut session = session_for(base);

    session.send("hi", &mut ignore_updates).await.unwrap();

    assert_eq!(
        session.messages().last(),
        Some(&ChatMessage::assistant("café"))
    );
}

#[tokio::test]
async fn dropped_connection_keeps_partial_reply_and_appends_failure() {
    let base = raw_backend(vec![b"data: Par\n".as_slice()], Ending::Drop).await;
    let mut session = session_for(base);
    let mut busy_changes = Vec::new();

    let result = session.send("hi", &mut BusyRecorder(&mut busy_changes)).await;

    assert!(
        matches!(result, Err(ChatError::Transport(TransportError::Body(_)))),
        "unexpected result: {result:?}"
    );
    assert_eq!(
        session.messages(),
        &[
            ChatMessage::user("hi"),
            ChatMessage::assistant("Par"),
            ChatMessage::assistant(FETCH_FAILED_MESSAGE),
        ]
    );
    assert_eq!(busy_changes, vec![true, false]);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn cancelling_a_stalled_stream_keeps_partial_text() {
    let base = raw_backend(vec![b"data: Par\n".as_slice()], Ending::Hang).await;
    let mut session = session_for(base);
    let token = CancellationToken::new();
    let cancel = token.clone();
    let mut observer = move |messages: &[ChatMessage]| {
        if messages.last().is_some_and(|m| m.is_assistant()) {
            cancel.cancel();
        }
    };

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        session.send_with_cancel("hi", &mut observer, token),
    )
    .await
    .expect("cancellation should not hang");

    assert_eq!(outcome, Ok(StreamOutcome::Cancelled));
    assert_eq!(
        session.messages(),
        &[ChatMessage::user("hi"), ChatMessage::assistant("Par")]
    );
}

#[tokio::test]
async fn abandoned_send_ends_the_turn_and_closes_the_connection() {
    let (closed_tx, closed_rx) = oneshot::channel();
    let base = raw_backend(
        vec![b"data: Par\n".as_slice()],
        Ending::HangUntilClosed(closed_tx),
    )
    .await;
    let mut session = session_for(base);
    let mut busy_changes = Vec::new();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(500),
        session.send("hi", &mut BusyRecorder(&mut busy_changes)),
    )
    .await
    .is_err();

    assert!(timed_out);
    assert!(!session.is_busy());
    assert_eq!(busy_changes, vec![true, false]);
    assert_eq!(session.conversation().state(), AccumulatorState::Idle);
    assert_eq!(
        session.messages(),
        &[ChatMessage::user("hi"), ChatMessage::assistant("Par")]
    );
    tokio::time::timeout(Duration::from_secs(3), closed_rx)
        .await
        .expect("request should be aborted")
        .expect("server task should report the close");
}

#[tokio::test]
async fn oversized_error_body_is_summarized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(502).set_body_string("x".repeat(100_000)))
        .mount(&server)
        .await;

    let mut session = session_for(server.uri());
    let result = session.send("hi", &mut ignore_updates).await;

    match result {
        Err(ChatError::Transport(TransportError::Status { status, summary })) => {
            assert_eq!(status, 502);
            assert_eq!(summary.chars().count(), 201);
            assert!(summary.ends_with('…'));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

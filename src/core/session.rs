use reqwest::Client;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams, StreamReceiver};
use crate::core::config::ChatSettings;
use crate::core::conversation::{Conversation, ConversationObserver};
use crate::core::error::ChatError;
use crate::core::events::StreamEvent;
use crate::core::message::ChatMessage;

/// How a turn that did not fail came to an end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The server sent the sentinel or closed the body cleanly.
    Completed,
    /// The caller's cancellation token fired; partial text was kept.
    Cancelled,
}

/// A chat conversation bound to one streaming endpoint.
///
/// `send` borrows the session mutably, so at most one response is ever
/// in flight per session.
pub struct ChatSession {
    client: Client,
    chat_url: String,
    conversation: Conversation,
    stream_service: ChatStreamService,
    rx: StreamReceiver,
    stream_cancel_token: Option<CancellationToken>,
    current_stream_id: u64,
    busy: bool,
}

impl ChatSession {
    pub fn new(client: Client, chat_url: impl Into<String>) -> Self {
        let (stream_service, rx) = ChatStreamService::new();
        Self {
            client,
            chat_url: chat_url.into(),
            conversation: Conversation::new(),
            stream_service,
            rx,
            stream_cancel_token: None,
            current_stream_id: 0,
            busy: false,
        }
    }

    pub fn from_settings(settings: &ChatSettings) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self::new(builder.build()?, settings.chat_url()))
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub async fn send<O>(
        &mut self,
        prompt: &str,
        observer: &mut O,
    ) -> Result<StreamOutcome, ChatError>
    where
        O: ConversationObserver + ?Sized,
    {
        self.send_with_cancel(prompt, observer, CancellationToken::new()).await
    }

    /// Send `prompt` and fold the streamed reply into the log, notifying
    /// `observer` after every change. Returns once the response has completed,
    /// failed, or `cancel_token` has fired.
    ///
    /// On a transport failure the fixed failure notice has already been
    /// appended to the log when the error is returned.
    ///
    /// Dropping the returned future mid-stream also ends the turn: the
    /// request is aborted, the reply is closed and the busy flag cleared.
    pub async fn send_with_cancel<O>(
        &mut self,
        prompt: &str,
        observer: &mut O,
        cancel_token: CancellationToken,
    ) -> Result<StreamOutcome, ChatError>
    where
        O: ConversationObserver + ?Sized,
    {
        if prompt.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }

        // Cancelled when the turn ends, without touching the caller's token.
        let stream_token = cancel_token.child_token();
        let stream_id = self.start_new_stream(stream_token.clone());
        self.busy = true;
        observer.on_busy(true);

        let turn = ActiveTurn {
            _abort_stream: stream_token.clone().drop_guard(),
            session: self,
            observer,
        };

        turn.session.conversation.add_user_message(prompt);
        turn.observer.on_update(turn.session.conversation.messages());

        turn.session.stream_service.spawn_stream(StreamParams {
            client: turn.session.client.clone(),
            url: turn.session.chat_url.clone(),
            prompt: prompt.to_string(),
            cancel_token: stream_token.clone(),
            stream_id,
        });

        let result = turn
            .session
            .consume_stream(stream_id, &stream_token, &mut *turn.observer)
            .await;
        drop(turn);
        result
    }

    fn start_new_stream(&mut self, cancel_token: CancellationToken) -> u64 {
        if let Some(previous) = self.stream_cancel_token.replace(cancel_token) {
            previous.cancel();
        }
        self.current_stream_id += 1;
        self.current_stream_id
    }

    async fn consume_stream<O>(
        &mut self,
        stream_id: u64,
        cancel_token: &CancellationToken,
        observer: &mut O,
    ) -> Result<StreamOutcome, ChatError>
    where
        O: ConversationObserver + ?Sized,
    {
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => None,
                received = self.rx.recv() => Some(received),
            };

            let Some(received) = received else {
                debug!(stream_id, "turn cancelled by caller");
                self.conversation.close();
                return Ok(StreamOutcome::Cancelled);
            };

            match received {
                Some((_, id)) if id != stream_id => {
                    debug!(stream_id = id, "dropping message from stale stream");
                }
                Some((StreamMessage::Token(text), _)) => {
                    if self.conversation.apply(&StreamEvent::Token(text)) {
                        observer.on_update(self.conversation.messages());
                    }
                }
                Some((StreamMessage::End, _)) => {
                    self.conversation.apply(&StreamEvent::End);
                    return Ok(StreamOutcome::Completed);
                }
                Some((StreamMessage::Error(error), _)) => {
                    warn!(stream_id, %error, "chat stream failed");
                    self.conversation.add_fetch_failure();
                    observer.on_update(self.conversation.messages());
                    return Err(ChatError::Transport(error));
                }
                None => {
                    self.conversation.close();
                    return Ok(StreamOutcome::Completed);
                }
            }
        }
    }
}

/// Tears down the turn in progress when dropped, whether `send` returned or
/// its future was dropped.
struct ActiveTurn<'a, O: ConversationObserver + ?Sized> {
    _abort_stream: DropGuard,
    session: &'a mut ChatSession,
    observer: &'a mut O,
}

impl<O: ConversationObserver + ?Sized> Drop for ActiveTurn<'_, O> {
    fn drop(&mut self) {
        self.session.conversation.close();
        self.session.stream_cancel_token = None;
        self.session.busy = false;
        self.observer.on_busy(false);
    }
}

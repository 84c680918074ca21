use crate::core::constants::FETCH_FAILED_MESSAGE;
use crate::core::events::StreamEvent;
use crate::core::message::ChatMessage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AccumulatorState {
    /// No assistant message is open.
    #[default]
    Idle,
    /// Tokens are appended to the message at `index`.
    Accumulating { index: usize },
}

/// Subscriber notified whenever the conversation log changes.
pub trait ConversationObserver {
    fn on_update(&mut self, messages: &[ChatMessage]);

    /// Called when a request starts (`true`) and once it has settled (`false`).
    fn on_busy(&mut self, _busy: bool) {}
}

impl<F> ConversationObserver for F
where
    F: FnMut(&[ChatMessage]),
{
    fn on_update(&mut self, messages: &[ChatMessage]) {
        self(messages)
    }
}

/// Conversation log plus the accumulation state for the current turn.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    state: AccumulatorState,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Content of the open assistant message, if one is accumulating.
    pub fn current_response(&self) -> Option<&str> {
        match self.state {
            AccumulatorState::Accumulating { index } => {
                self.messages.get(index).map(|msg| msg.content.as_str())
            }
            AccumulatorState::Idle => None,
        }
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.close();
        self.messages.push(ChatMessage::user(content));
    }

    /// Fold one event into the log. Returns whether the log changed.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::Token(text) => {
                self.append_to_response(text);
                true
            }
            StreamEvent::End => {
                self.close();
                false
            }
        }
    }

    pub fn append_to_response(&mut self, content: &str) {
        match self.state {
            AccumulatorState::Accumulating { index } => {
                if let Some(msg) = self.messages.get_mut(index) {
                    msg.content.push_str(content);
                }
            }
            AccumulatorState::Idle => {
                self.messages.push(ChatMessage::assistant(content));
                self.state = AccumulatorState::Accumulating {
                    index: self.messages.len() - 1,
                };
            }
        }
    }

    /// Freeze whatever has accumulated so far.
    pub fn close(&mut self) {
        self.state = AccumulatorState::Idle;
    }

    /// Record a failed fetch as its own assistant entry.
    pub fn add_fetch_failure(&mut self) {
        self.close();
        self.messages.push(ChatMessage::assistant(FETCH_FAILED_MESSAGE));
    }
}

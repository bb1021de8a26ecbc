use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::api_client::TrialService;
use crate::connection_monitor::ConnectionMonitor;
use crate::models::Message;

/// Shown in place of an assistant reply when a chat turn fails.
pub const SEND_FAILURE_REPLY: &str =
    "I'm sorry, something went wrong while answering that. Please try again.";

pub const INVALID_CONVERSATION_DATA: &str = "Invalid conversation data received";

#[derive(Debug, Default)]
struct SessionState {
    messages: Vec<Message>,
    conversation_id: Option<String>,
    is_loading: bool,
    error: Option<String>,
}

/// Turn-taking conversation state against the assistant.
///
/// User messages are appended optimistically before the network call
/// resolves; the assistant reply (or a synthetic error reply) is appended
/// when it does. Message history is append-only within a session.
pub struct ChatSession {
    service: Arc<dyn TrialService>,
    monitor: Arc<ConnectionMonitor>,
    state: Mutex<SessionState>,
}

impl ChatSession {
    pub fn new(service: Arc<dyn TrialService>, monitor: Arc<ConnectionMonitor>) -> Self {
        Self {
            service,
            monitor,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.state.lock().unwrap().conversation_id.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    /// Send one chat turn. Returns the appended assistant message, or `None`
    /// when the send was skipped (blank text, disconnected) or failed.
    ///
    /// Remote failures never escape: they are converted into an `error`
    /// string plus a visible synthetic reply with `is_error` set, and the
    /// optimistic user message stays in history.
    pub async fn send_message(&self, text: &str) -> Option<Message> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if !self.monitor.is_connected() {
            debug!(target: "chat", "not connected, refusing to send");
            return None;
        }

        let conversation_id = {
            let mut state = self.state.lock().unwrap();
            state.messages.push(Message::user(text));
            state.is_loading = true;
            state.error = None;
            state.conversation_id.clone()
        };

        let outcome = self
            .service
            .send_chat(text, conversation_id.as_deref())
            .await;

        let mut state = self.state.lock().unwrap();
        state.is_loading = false;
        match outcome {
            Ok(reply) => {
                // First response to name a conversation wins; later turns
                // cannot rebind the session to a different id.
                if state.conversation_id.is_none() {
                    state.conversation_id = reply.conversation_id;
                }
                let message = Message::assistant(reply.response, reply.evidence);
                state.messages.push(message.clone());
                Some(message)
            }
            Err(failure) => {
                warn!(target: "chat", "send failed: {}", failure);
                state.error = Some(failure.to_string());
                state.messages.push(Message::failure_reply(SEND_FAILURE_REPLY));
                None
            }
        }
    }

    /// Replace the session with a previously stored conversation.
    ///
    /// A success payload without a `messages` field counts as a failure and
    /// leaves the current session untouched.
    pub async fn load_conversation(&self, id: &str) {
        let id = id.trim();
        if id.is_empty() {
            return;
        }
        if !self.monitor.is_connected() {
            debug!(target: "chat", "not connected, refusing to load conversation");
            return;
        }

        {
            let mut state = self.state.lock().unwrap();
            state.is_loading = true;
            state.error = None;
        }

        let outcome = self.service.get_conversation(id).await;

        let mut state = self.state.lock().unwrap();
        state.is_loading = false;
        match outcome {
            Ok(payload) => match payload.messages {
                Some(messages) => {
                    state.messages = messages;
                    state.conversation_id =
                        payload.conversation_id.or_else(|| Some(id.to_string()));
                }
                None => {
                    warn!(target: "chat", "conversation {} arrived without messages", id);
                    state.error = Some(INVALID_CONVERSATION_DATA.to_string());
                }
            },
            Err(failure) => {
                warn!(target: "chat", "loading conversation failed: {}", failure);
                state.error = Some(failure.to_string());
            }
        }
    }

    /// Reset to an empty session. Does not cancel an in-flight send; a late
    /// response still appends to the fresh message list.
    pub fn start_new_conversation(&self) {
        let mut state = self.state.lock().unwrap();
        state.messages = Vec::new();
        state.conversation_id = None;
        state.error = None;
    }
}

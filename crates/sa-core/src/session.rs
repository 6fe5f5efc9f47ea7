//! Chat session: the message list and the one stream allowed in flight.

use chrono::Utc;
use sa_backend::{ChatClient, ClientError};
use sa_protocol::{
    ChatRequest, ConversationMessage, SessionInfo, StatusMessage, StreamOutcome, StreamSink,
};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a response is still streaming")]
    Busy,
    #[error("message is empty")]
    EmptyMessage,
    #[error("no turn has been started")]
    NoActiveTurn,
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// `session_` followed by the current Unix time in milliseconds.
pub fn new_session_id() -> String {
    format!("session_{}", Utc::now().timestamp_millis())
}

/// The turn currently holding the session's stream slot.
#[derive(Debug)]
struct ActiveTurn {
    request: ChatRequest,
    cancel: CancellationToken,
}

/// Holds the stream slot and the reply for one turn.
///
/// Dropping it releases the slot. A reply that was never finished, because the
/// turn future was dropped mid-stream, is finished as cancelled.
struct ActiveStream<'a> {
    slot: &'a mut Option<ActiveTurn>,
    messages: &'a mut Vec<ConversationMessage>,
    reply: usize,
    finished: bool,
}

impl ActiveStream<'_> {
    fn reply_mut(&mut self) -> &mut ConversationMessage {
        &mut self.messages[self.reply]
    }

    fn finish(&mut self, outcome: &StreamOutcome) -> &ConversationMessage {
        self.finished = true;
        let reply = &mut self.messages[self.reply];
        reply.finish(outcome);
        reply
    }
}

impl Drop for ActiveStream<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Some(reply) = self.messages.get_mut(self.reply) {
                reply.finish(&StreamOutcome::Cancelled);
            }
            debug!("turn dropped before its stream ended");
        }
        if self.slot.take().is_some() {
            debug!("stream slot released");
        }
    }
}

/// Forwards every event to the message and to a view.
struct Mirror<'a, V: ?Sized> {
    message: &'a mut ConversationMessage,
    view: &'a mut V,
}

impl<V: StreamSink + ?Sized> StreamSink for Mirror<'_, V> {
    fn clear_pending(&mut self) {
        self.message.clear_pending();
        self.view.clear_pending();
    }

    fn on_content(&mut self, text: &str) {
        self.message.on_content(text);
        self.view.on_content(text);
    }

    fn on_trace(&mut self, trace: Value) {
        self.view.on_trace(trace.clone());
        self.message.on_trace(trace);
    }

    fn on_step(&mut self, step: Value) {
        self.view.on_step(step.clone());
        self.message.on_step(step);
    }

    fn on_error(&mut self, message: &str) {
        self.message.on_error(message);
        self.view.on_error(message);
    }

    fn on_done(&mut self) {
        self.message.on_done();
        self.view.on_done();
    }
}

/// A view that ignores everything.
struct NoView;

impl StreamSink for NoView {
    fn clear_pending(&mut self) {}
    fn on_content(&mut self, _text: &str) {}
    fn on_trace(&mut self, _trace: Value) {}
    fn on_step(&mut self, _step: Value) {}
    fn on_error(&mut self, _message: &str) {}
    fn on_done(&mut self) {}
}

/// One conversation with the backend.
#[derive(Debug)]
pub struct ChatSession {
    user_id: String,
    session_id: String,
    messages: Vec<ConversationMessage>,
    active: Option<ActiveTurn>,
}

impl ChatSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_session_id(user_id, new_session_id())
    }

    pub fn with_session_id(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            messages: Vec::new(),
            active: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Start over with a fresh session id. Stops any stream in flight.
    pub fn new_chat(&mut self) {
        self.stop();
        self.active = None;
        self.messages.clear();
        self.session_id = new_session_id();
        debug!(session_id = %self.session_id, "new chat");
    }

    /// Drop the visible messages, keeping the session id.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Cancel the stream in flight, if any.
    pub fn stop(&self) {
        if let Some(turn) = &self.active {
            turn.cancel.cancel();
        }
    }

    fn acquire(&mut self, text: &str) -> Result<ChatRequest, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.active.is_some() {
            return Err(SessionError::Busy);
        }
        Ok(ChatRequest::new(text, &self.user_id, &self.session_id))
    }

    /// Push the user message and a pending assistant message, and take the stream slot.
    ///
    /// Returns the token that cancels this turn.
    pub fn begin_turn(&mut self, text: &str) -> Result<CancellationToken, SessionError> {
        let request = self.acquire(text)?;
        let cancel = CancellationToken::new();

        self.messages
            .push(ConversationMessage::user(request.message.clone()));
        self.messages.push(ConversationMessage::pending_assistant());
        self.active = Some(ActiveTurn {
            request,
            cancel: cancel.clone(),
        });
        Ok(cancel)
    }

    /// Stream the answer for the turn started by [`begin_turn`](Self::begin_turn).
    pub async fn stream_turn(
        &mut self,
        client: &ChatClient,
    ) -> Result<StreamOutcome, SessionError> {
        self.stream_turn_with(client, &mut NoView).await
    }

    /// Like [`stream_turn`](Self::stream_turn), also mirroring each event to `view`.
    pub async fn stream_turn_with<V: StreamSink + ?Sized>(
        &mut self,
        client: &ChatClient,
        view: &mut V,
    ) -> Result<StreamOutcome, SessionError> {
        let Self {
            active, messages, ..
        } = self;
        let Some(turn) = active.as_ref() else {
            return Err(SessionError::NoActiveTurn);
        };
        let request = turn.request.clone();
        let cancel = turn.cancel.clone();

        let Some(reply) = messages
            .len()
            .checked_sub(1)
            .filter(|&i| !messages[i].is_user())
        else {
            *active = None;
            return Err(SessionError::NoActiveTurn);
        };
        let mut guard = ActiveStream {
            slot: active,
            messages,
            reply,
            finished: false,
        };

        let mut sink = Mirror {
            message: guard.reply_mut(),
            view,
        };
        let outcome = client.stream_chat(&request, &mut sink, &cancel).await;
        let reply = guard.finish(&outcome);
        info!(outcome = ?outcome, chars = reply.text.len(), "turn finished");
        Ok(outcome)
    }

    /// Send a message to the non-streaming endpoint and append the whole answer.
    ///
    /// A backend failure becomes the answer text and is reported as
    /// [`StreamOutcome::Failed`]; only a busy session or empty input are errors.
    pub async fn send_whole(
        &mut self,
        client: &ChatClient,
        text: &str,
    ) -> Result<(&ConversationMessage, StreamOutcome), SessionError> {
        let request = self.acquire(text)?;
        self.messages
            .push(ConversationMessage::user(request.message.clone()));

        let (mut reply, outcome) = match client.chat(&request).await {
            Ok(response) => (
                ConversationMessage::assistant(response),
                StreamOutcome::Completed,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                (
                    ConversationMessage::pending_assistant(),
                    StreamOutcome::Failed(e.to_string()),
                )
            }
        };
        reply.finish(&outcome);
        self.messages.push(reply);
        let reply = &self.messages[self.messages.len() - 1];
        Ok((reply, outcome))
    }

    pub async fn list_sessions(
        &self,
        client: &ChatClient,
    ) -> Result<Vec<SessionInfo>, SessionError> {
        Ok(client.list_sessions(&self.user_id).await?)
    }

    /// Switch to a stored session and show its messages.
    ///
    /// On failure the view is left empty and the error returned.
    pub async fn load_session(
        &mut self,
        client: &ChatClient,
        session_id: &str,
    ) -> Result<(), SessionError> {
        if self.active.is_some() {
            return Err(SessionError::Busy);
        }
        self.session_id = session_id.to_string();
        match client.session_messages(&self.user_id, session_id).await {
            Ok(history) => {
                self.messages = history
                    .into_iter()
                    .map(ConversationMessage::from_history)
                    .collect();
                Ok(())
            }
            Err(e) => {
                self.messages.clear();
                Err(e.into())
            }
        }
    }

    /// Delete a stored session. Deleting the current one starts a new chat.
    pub async fn delete_session(
        &mut self,
        client: &ChatClient,
        session_id: &str,
    ) -> Result<StatusMessage, SessionError> {
        let status = client.delete_session(&self.user_id, session_id).await?;
        if self.session_id == session_id {
            self.new_chat();
        }
        Ok(status)
    }
}

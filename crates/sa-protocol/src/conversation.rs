//! Conversation messages as held by the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::MessageInfo;
use crate::message::{StreamOutcome, StreamSink};

/// Text of an assistant message cancelled before any text arrived.
pub const ABORTED_MARKER: &str = "(response aborted)";

/// Appended to an assistant message cancelled after text arrived.
pub const INTERRUPTED_SUFFIX: &str = "\n\n_(response interrupted)_";

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in the chat view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
    /// The assistant is still composing and no text has arrived yet.
    #[serde(default)]
    pub pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_trace: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rag_steps: Vec<Value>,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            pending: false,
            rag_trace: None,
            rag_steps: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            pending: false,
            rag_trace: None,
            rag_steps: Vec::new(),
        }
    }

    /// An empty assistant message waiting for its first stream event.
    pub fn pending_assistant() -> Self {
        Self {
            pending: true,
            ..Self::assistant("")
        }
    }

    /// Build a message from a stored session entry.
    pub fn from_history(info: MessageInfo) -> Self {
        let role = if info.message_type == "human" {
            Role::User
        } else {
            Role::Assistant
        };
        Self {
            role,
            text: info.content,
            pending: false,
            rag_trace: info.rag_trace,
            rag_steps: Vec::new(),
        }
    }

    /// Text shown for a turn that failed before or while streaming.
    pub fn failure_text(description: &str) -> String {
        format!("Something went wrong: {description}")
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Apply the terminal state of a stream. The message is not written to afterwards.
    pub fn finish(&mut self, outcome: &StreamOutcome) {
        self.pending = false;
        match outcome {
            StreamOutcome::Completed => {}
            StreamOutcome::Cancelled => {
                if self.text.is_empty() {
                    self.text = ABORTED_MARKER.to_string();
                } else {
                    self.text.push_str(INTERRUPTED_SUFFIX);
                }
            }
            StreamOutcome::Failed(description) => {
                self.text = Self::failure_text(description);
            }
        }
    }
}

impl StreamSink for ConversationMessage {
    fn clear_pending(&mut self) {
        self.pending = false;
    }

    fn on_content(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn on_trace(&mut self, trace: Value) {
        self.rag_trace = Some(trace);
    }

    fn on_step(&mut self, step: Value) {
        self.rag_steps.push(step);
    }

    fn on_error(&mut self, message: &str) {
        self.text.push_str(&format!("\n[Error: {message}]"));
    }

    fn on_done(&mut self) {
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn helpers_set_role() {
        let user = ConversationMessage::user("hello");
        assert_eq!(user.role, Role::User);
        assert!(user.is_user());
        assert!(!user.pending);

        let pending = ConversationMessage::pending_assistant();
        assert_eq!(pending.role, Role::Assistant);
        assert!(pending.pending);
        assert!(pending.text.is_empty());
        assert!(pending.rag_steps.is_empty());
    }

    #[test]
    fn sink_mutates_fields() {
        let mut msg = ConversationMessage::pending_assistant();
        msg.clear_pending();
        msg.on_content("Hi");
        msg.on_step(json!("retrieve"));
        msg.on_content(" there");
        msg.on_trace(json!({"a": 1}));
        msg.on_trace(json!({"a": 2}));
        msg.on_step(json!("rerank"));

        assert!(!msg.pending);
        assert_eq!(msg.text, "Hi there");
        assert_eq!(msg.rag_trace, Some(json!({"a": 2})));
        assert_eq!(msg.rag_steps, vec![json!("retrieve"), json!("rerank")]);
    }

    #[test]
    fn error_appends_suffix() {
        let mut msg = ConversationMessage::assistant("partial");
        msg.on_error("boom");
        assert_eq!(msg.text, "partial\n[Error: boom]");
    }

    #[test]
    fn finish_completed_forces_pending_off() {
        let mut msg = ConversationMessage::pending_assistant();
        msg.finish(&StreamOutcome::Completed);
        assert!(!msg.pending);
        assert!(msg.text.is_empty());
    }

    #[test]
    fn finish_cancelled_without_text_uses_marker() {
        let mut msg = ConversationMessage::pending_assistant();
        msg.finish(&StreamOutcome::Cancelled);
        assert!(!msg.pending);
        assert_eq!(msg.text, ABORTED_MARKER);
    }

    #[test]
    fn finish_cancelled_with_text_appends_suffix() {
        let mut msg = ConversationMessage::assistant("Hello");
        msg.finish(&StreamOutcome::Cancelled);
        assert_eq!(msg.text, format!("Hello{INTERRUPTED_SUFFIX}"));
    }

    #[test]
    fn finish_failed_replaces_text() {
        let mut msg = ConversationMessage::assistant("Hello");
        msg.pending = true;
        msg.finish(&StreamOutcome::Failed("HTTP 502".to_string()));
        assert!(!msg.pending);
        assert_eq!(msg.text, "Something went wrong: HTTP 502");
    }

    #[test]
    fn from_history_maps_roles() {
        let human = MessageInfo {
            message_type: "human".to_string(),
            content: "q".to_string(),
            timestamp: "2025-01-01T00:00:00".to_string(),
            rag_trace: None,
        };
        let ai = MessageInfo {
            message_type: "ai".to_string(),
            content: "a".to_string(),
            timestamp: "2025-01-01T00:00:01".to_string(),
            rag_trace: Some(json!({"k": "v"})),
        };

        let human = ConversationMessage::from_history(human);
        assert_eq!(human.role, Role::User);
        assert_eq!(human.text, "q");

        let ai = ConversationMessage::from_history(ai);
        assert_eq!(ai.role, Role::Assistant);
        assert_eq!(ai.rag_trace, Some(json!({"k": "v"})));
    }

    #[test]
    fn role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn message_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&ConversationMessage::user("hello")).unwrap();
        assert!(!json.contains("rag_trace"));
        assert!(!json.contains("rag_steps"));
    }
}

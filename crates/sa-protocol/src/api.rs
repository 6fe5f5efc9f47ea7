//! Request and response bodies of the chat backend's REST surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    pub session_id: String,
}

impl ChatRequest {
    pub fn new(
        message: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// Whole (non-streamed) answer from `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

/// One stored message of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageInfo {
    /// `human`, `ai` or `system`.
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_trace: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMessagesResponse {
    pub messages: Vec<MessageInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub message_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

/// A document indexed in the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentInfo {
    pub filename: String,
    /// `PDF`, `Word`, or whatever the backend reports.
    #[serde(default)]
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentInfo>,
}

/// Human-readable result of an upload or delete.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusMessage {
    #[serde(default)]
    pub message: String,
}

/// JSON error body returned with non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

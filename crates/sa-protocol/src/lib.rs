//! sa-protocol: Shared types for the SuperAgent chat client.
//!
//! This crate defines the streaming events, the sink they are dispatched to,
//! conversation messages, and the REST bodies exchanged with the chat backend.

pub mod api;
pub mod conversation;
pub mod message;

pub use api::{
    ChatRequest, ChatResponse, DocumentInfo, DocumentListResponse, ErrorBody, MessageInfo,
    SessionInfo, SessionListResponse, SessionMessagesResponse, StatusMessage,
};
pub use conversation::{ConversationMessage, Role, ABORTED_MARKER, INTERRUPTED_SUFFIX};
pub use message::{StreamEvent, StreamOutcome, StreamSink, DONE_SENTINEL};

//! Streaming events and the sink they are dispatched to.

use serde::Deserialize;
use serde_json::Value;

/// Payload that closes the logical response without signaling failure.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Events decoded from a `data:` payload of the chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of assistant text to append.
    Content(String),

    /// Retrieval trace for the turn. Replaces any earlier trace.
    Trace(Value),

    /// One retrieval pipeline step, delivered as it happens.
    RagStep(Value),

    /// An error reported by the backend mid-stream.
    Error(String),

    /// The `[DONE]` sentinel.
    Done,
}

/// JSON shape of a stream payload, discriminated by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePayload {
    Content {
        content: String,
    },
    Trace {
        #[serde(default)]
        rag_trace: Value,
    },
    RagStep {
        step: Value,
    },
    Error {
        #[serde(default)]
        content: String,
    },
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Parse one event payload.
    ///
    /// Returns `Ok(None)` for well-formed payloads whose `type` is not one we
    /// act on. Anything that is not a JSON object with a string `type` is an error.
    pub fn from_payload(data: &str) -> Result<Option<Self>, serde_json::Error> {
        if data == DONE_SENTINEL {
            return Ok(Some(StreamEvent::Done));
        }

        let event = match serde_json::from_str::<WirePayload>(data)? {
            WirePayload::Content { content } => StreamEvent::Content(content),
            WirePayload::Trace { rag_trace } => StreamEvent::Trace(rag_trace),
            WirePayload::RagStep { step } => StreamEvent::RagStep(step),
            WirePayload::Error { content } => StreamEvent::Error(content),
            WirePayload::Unknown => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Receives decoded stream events in the order they were fully received.
pub trait StreamSink {
    /// Called once per stream, right before the first content or error dispatch.
    fn clear_pending(&mut self);

    fn on_content(&mut self, text: &str);

    fn on_trace(&mut self, trace: Value);

    fn on_step(&mut self, step: Value);

    fn on_error(&mut self, message: &str);

    /// The source reached end of stream without cancellation or transport failure.
    fn on_done(&mut self);
}

/// How a stream ended. Exactly one is produced per consumed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

//! Mock chat stream bodies for testing.
//!
//! Produces the same SSE bytes the chat backend sends on `/chat/stream`, so
//! consumer and session tests can run without a server.

use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use serde_json::{json, Value};
use tokio::time::sleep;

use sa_protocol::DONE_SENTINEL;

/// One event as the backend would frame it.
#[derive(Debug, Clone)]
pub enum MockEvent {
    Content(String),
    Trace(Value),
    RagStep(Value),
    Error(String),
    /// The `[DONE]` sentinel.
    Done,
    /// A payload sent verbatim, e.g. something malformed.
    Raw(String),
}

impl MockEvent {
    fn payload(&self) -> String {
        match self {
            MockEvent::Content(content) => {
                json!({"type": "content", "content": content}).to_string()
            }
            MockEvent::Trace(trace) => json!({"type": "trace", "rag_trace": trace}).to_string(),
            MockEvent::RagStep(step) => json!({"type": "rag_step", "step": step}).to_string(),
            MockEvent::Error(content) => json!({"type": "error", "content": content}).to_string(),
            MockEvent::Done => DONE_SENTINEL.to_string(),
            MockEvent::Raw(raw) => raw.clone(),
        }
    }

    /// The event as a `data:` line followed by a blank line.
    pub fn to_frame(&self) -> Vec<u8> {
        format!("data: {}\n\n", self.payload()).into_bytes()
    }
}

/// Serialize events into one SSE body.
pub fn to_sse_bytes(events: &[MockEvent]) -> Vec<u8> {
    events.iter().flat_map(MockEvent::to_frame).collect()
}

/// Configuration for a mock body.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Body pieces; each is yielded as one chunk unless `chunk_size` is set.
    pub frames: Vec<Vec<u8>>,
    /// Re-split the whole body into chunks of this many bytes.
    pub chunk_size: Option<usize>,
    /// Optional delay before each chunk (ms).
    pub chunk_delay_ms: Option<u64>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// One frame per event.
    pub fn with_events(mut self, events: Vec<MockEvent>) -> Self {
        self.frames = events.iter().map(MockEvent::to_frame).collect();
        self
    }

    /// A pre-built body sent as a single frame.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.frames = vec![body];
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    pub fn with_chunk_delay(mut self, ms: u64) -> Self {
        self.chunk_delay_ms = Some(ms);
        self
    }

    /// The chunks the body will be delivered in.
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        match self.chunk_size {
            Some(size) => self
                .frames
                .concat()
                .chunks(size)
                .map(<[u8]>::to_vec)
                .collect(),
            None => self.frames.clone(),
        }
    }
}

/// Create a byte stream from mock config.
pub fn mock_body(config: MockConfig) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    stream! {
        for chunk in config.chunks() {
            if let Some(delay_ms) = config.chunk_delay_ms {
                sleep(Duration::from_millis(delay_ms)).await;
            }
            yield Ok(Bytes::from(chunk));
        }
    }
}

/// Built-in test fixtures for common scenarios.
pub mod fixtures {
    use super::*;

    /// Plain streamed answer, one content event per fragment.
    pub fn streaming_text(fragments: &[&str]) -> MockConfig {
        let events = fragments
            .iter()
            .map(|f| MockEvent::Content((*f).to_string()))
            .collect();
        MockConfig::new().with_events(events)
    }

    /// Retrieval steps, then the answer, then the trace and the sentinel.
    pub fn rag_answer(steps: &[&str], fragments: &[&str], trace: Value) -> MockConfig {
        let mut events: Vec<MockEvent> = steps
            .iter()
            .map(|s| MockEvent::RagStep(json!(s)))
            .collect();
        events.extend(fragments.iter().map(|f| MockEvent::Content((*f).to_string())));
        events.push(MockEvent::Trace(trace));
        events.push(MockEvent::Done);
        MockConfig::new().with_events(events)
    }

    /// Some text, then a backend error event.
    pub fn error_mid_stream(text_before: &str, error: &str) -> MockConfig {
        MockConfig::new().with_events(vec![
            MockEvent::Content(text_before.to_string()),
            MockEvent::Error(error.to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(config: MockConfig) -> Vec<Vec<u8>> {
        mock_body(config)
            .map(|chunk| chunk.unwrap().to_vec())
            .collect()
            .await
    }

    #[test]
    fn frames_are_sse_data_lines() {
        let frame = String::from_utf8(MockEvent::Content("Hi".to_string()).to_frame()).unwrap();
        let payload = frame
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        let value: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(value, json!({"type": "content", "content": "Hi"}));
        assert_eq!(MockEvent::Done.to_frame(), b"data: [DONE]\n\n".to_vec());
    }

    #[tokio::test]
    async fn one_chunk_per_event_by_default() {
        let chunks = collect(fixtures::streaming_text(&["a", "b", "c"])).await;
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn chunk_size_resplits_body() {
        let config = fixtures::streaming_text(&["hello"]).with_chunk_size(4);
        let whole = config.frames.concat();
        let chunks = collect(config).await;
        assert!(chunks.iter().all(|c| c.len() <= 4));
        assert_eq!(chunks.concat(), whole);
    }

    #[tokio::test]
    async fn rag_answer_fixture_order() {
        let config = fixtures::rag_answer(&["retrieve"], &["ok"], json!({}));
        let body = String::from_utf8(config.frames.concat()).unwrap();
        let step = body.find("rag_step").unwrap();
        let content = body.find("\"content\"").unwrap();
        let trace = body.find("rag_trace").unwrap();
        let done = body.find("[DONE]").unwrap();
        assert!(step < content && content < trace && trace < done);
    }

    #[tokio::test]
    async fn chunk_delay_still_yields_everything() {
        let config =
            fixtures::error_mid_stream("Processing...", "Rate limited").with_chunk_delay(1);
        let chunks = collect(config).await;
        assert_eq!(chunks.len(), 2);
    }
}

//! Server-sent event framing over a chunked byte stream.
//!
//! Bytes are held until a full line is available, so chunk boundaries may
//! fall anywhere: inside a multi-byte UTF-8 character, or between the `\r`
//! and `\n` of a line ending, or between the two newlines that end an event.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the last `event:` field, if any.
    pub event_type: Option<String>,
    /// All `data:` values of the event joined with `\n`.
    pub data: String,
}

/// Accumulates lines into events.
#[derive(Debug, Default)]
struct EventBuilder {
    partial_line: Vec<u8>,
    event_type: Option<String>,
    data_lines: Vec<String>,
}

impl EventBuilder {
    /// Consume `chunk`, queueing every event it completes.
    fn push_chunk(&mut self, chunk: &[u8], ready: &mut VecDeque<SseEvent>) {
        let mut lines = chunk.split(|&b| b == b'\n');
        // The last piece has no newline yet; it stays buffered.
        let tail = lines.next_back().unwrap_or_default();
        for piece in lines {
            self.partial_line.extend_from_slice(piece);
            let line = std::mem::take(&mut self.partial_line);
            ready.extend(self.apply_line(&decode_line(&line)));
        }
        self.partial_line.extend_from_slice(tail);
    }

    /// End of input: an unterminated line and an undelimited event still count.
    fn flush(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.partial_line);
        if !line.is_empty() {
            if let Some(event) = self.apply_line(&decode_line(&line)) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = self.event_type.take();
        if self.data_lines.is_empty() {
            return None;
        }
        Some(SseEvent {
            event_type,
            data: std::mem::take(&mut self.data_lines).join("\n"),
        })
    }

    fn apply_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Lines without a colon and `:` comments carry nothing we use.
        let (field, value) = line.split_once(':')?;
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "data" => self.data_lines.push(value.to_owned()),
            "event" => self.event_type = Some(value.to_owned()),
            _ => {}
        }
        None
    }
}

/// Lossy decode with any trailing `\r` removed.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Stream of [`SseEvent`]s read from a byte stream.
///
/// Transport errors are passed through; the stream may be polled again after one.
pub struct SseStream<S> {
    body: S,
    builder: EventBuilder,
    ready: VecDeque<SseEvent>,
    eof: bool,
}

impl<S> SseStream<S> {
    pub fn new(body: S) -> Self {
        Self {
            body,
            builder: EventBuilder::default(),
            ready: VecDeque::new(),
            eof: false,
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseEvent, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.eof {
                return Poll::Ready(None);
            }
            match Pin::new(&mut this.body).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(Some(Ok(chunk))) => this.builder.push_chunk(&chunk, &mut this.ready),
                Poll::Ready(None) => {
                    this.eof = true;
                    this.ready.extend(this.builder.flush());
                }
            }
        }
    }
}

/// Frame `body` into server-sent events.
pub fn parse_sse_stream<S, E>(body: S) -> SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    SseStream::new(body)
}

//! Chat stream consumer.
//!
//! Reads an SSE body to completion, decoding each `data:` payload into a
//! [`StreamEvent`] and dispatching it to a [`StreamSink`] in arrival order.
//! Malformed payloads are dropped with a warning and never end the stream.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use sa_protocol::{StreamEvent, StreamOutcome, StreamSink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sse::{parse_sse_stream, SseEvent};

/// Consume `body` until end of stream, cancellation, or a transport error.
///
/// The token is checked before every read and raced against the read itself.
/// Once cancellation is observed the body is dropped and no further sink
/// calls are made; applying the cancelled state to the message is up to the caller.
pub async fn consume_stream<S, E, K>(
    body: S,
    sink: &mut K,
    cancel: &CancellationToken,
) -> StreamOutcome
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
    K: StreamSink + ?Sized,
{
    let body = std::pin::pin!(body);
    let mut events = parse_sse_stream(body);
    let mut dispatcher = Dispatcher::new(sink);

    loop {
        if cancel.is_cancelled() {
            debug!("stream cancelled");
            return StreamOutcome::Cancelled;
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("stream cancelled while waiting for data");
                return StreamOutcome::Cancelled;
            }
            next = events.next() => next,
        };

        match next {
            Some(Ok(event)) => dispatcher.dispatch(&event),
            Some(Err(e)) => {
                warn!(error = %e, "chat stream read failed");
                return StreamOutcome::Failed(e.to_string());
            }
            None => {
                dispatcher.sink.on_done();
                return StreamOutcome::Completed;
            }
        }
    }
}

/// Routes decoded events to the sink, clearing the pending indicator once.
struct Dispatcher<'a, K: ?Sized> {
    sink: &'a mut K,
    pending_cleared: bool,
}

impl<'a, K: StreamSink + ?Sized> Dispatcher<'a, K> {
    fn new(sink: &'a mut K) -> Self {
        Self {
            sink,
            pending_cleared: false,
        }
    }

    fn clear_pending_once(&mut self) {
        if !self.pending_cleared {
            self.pending_cleared = true;
            self.sink.clear_pending();
        }
    }

    fn dispatch(&mut self, event: &SseEvent) {
        match StreamEvent::from_payload(&event.data) {
            Ok(Some(StreamEvent::Content(text))) => {
                self.clear_pending_once();
                self.sink.on_content(&text);
            }
            Ok(Some(StreamEvent::Trace(trace))) => self.sink.on_trace(trace),
            Ok(Some(StreamEvent::RagStep(step))) => self.sink.on_step(step),
            Ok(Some(StreamEvent::Error(message))) => {
                self.clear_pending_once();
                self.sink.on_error(&message);
            }
            Ok(Some(StreamEvent::Done)) => debug!("received done sentinel"),
            Ok(None) => debug!(payload = %event.data, "ignoring stream event of unknown type"),
            Err(e) => {
                warn!(error = %e, payload = %event.data, "dropping malformed stream payload");
            }
        }
    }
}

//! sa-backend: Transport for the SuperAgent chat client.
//!
//! This crate frames server-sent events, consumes the chat stream into a
//! sink, and wraps the backend's REST endpoints.

pub mod client;
pub mod consumer;
pub mod mock;
pub mod sse;

pub use client::{ChatClient, ClientError, DEFAULT_BASE_URL};
pub use consumer::consume_stream;
pub use mock::{MockConfig, MockEvent};

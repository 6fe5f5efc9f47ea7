//! sa-core: chat session, configuration and terminal front end for SuperAgent.
//!
//! Exposed as a library for integration testing.

pub mod commands;
pub mod config;
pub mod logging;
pub mod renderer;
pub mod repl;
pub mod session;
pub mod style;

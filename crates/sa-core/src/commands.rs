//! One-shot subcommands: `ask`, `sessions` and `docs`.
//!
//! Each handler prints to the given renderer and returns the process exit code.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Subcommand;
use sa_backend::{ChatClient, ClientError};
use sa_protocol::{ConversationMessage, StatusMessage, StreamOutcome};

use crate::renderer::ChatRenderer;
use crate::repl::run_turn;
use crate::session::ChatSession;

/// Exit code for an answer stopped with Ctrl-C or by the stream deadline.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Subcommand)]
pub enum SessionsAction {
    /// List this user's sessions
    List,
    /// Print the messages of one session
    Show { session_id: String },
    /// Delete one session
    Delete { session_id: String },
}

#[derive(Debug, Subcommand)]
pub enum DocsAction {
    /// List indexed documents
    List,
    /// Upload a file to the knowledge base
    Upload { path: PathBuf },
    /// Delete a document by file name
    Delete { filename: String },
}

fn outcome_code(outcome: Option<&StreamOutcome>) -> i32 {
    match outcome {
        Some(StreamOutcome::Completed) => 0,
        Some(StreamOutcome::Cancelled) => EXIT_INTERRUPTED,
        Some(StreamOutcome::Failed(_)) | None => 1,
    }
}

fn report<W: Write>(
    renderer: &mut ChatRenderer<W>,
    result: Result<StatusMessage, ClientError>,
    fallback: &str,
) -> i32 {
    match result {
        Ok(status) if status.message.is_empty() => {
            renderer.emit_notice(fallback);
            0
        }
        Ok(status) => {
            renderer.emit_notice(&status.message);
            0
        }
        Err(e) => {
            renderer.emit_error(&e.to_string());
            1
        }
    }
}

/// Ask one question in a fresh session.
///
/// Streams the answer unless `whole` is set, in which case the non-streaming
/// endpoint is used and the answer printed at once.
pub async fn ask<W: Write>(
    client: &ChatClient,
    user_id: &str,
    message: &str,
    whole: bool,
    deadline: Option<Duration>,
    renderer: &mut ChatRenderer<W>,
) -> i32 {
    let mut session = ChatSession::new(user_id);
    if !whole {
        let outcome = run_turn(&mut session, client, renderer, message, deadline).await;
        return outcome_code(outcome.as_ref());
    }

    match session.send_whole(client, message).await {
        Ok((reply, outcome)) => {
            renderer.emit_message(reply);
            outcome_code(Some(&outcome))
        }
        Err(e) => {
            renderer.emit_error(&e.to_string());
            1
        }
    }
}

pub async fn sessions<W: Write>(
    client: &ChatClient,
    user_id: &str,
    action: SessionsAction,
    renderer: &mut ChatRenderer<W>,
) -> i32 {
    match action {
        SessionsAction::List => match client.list_sessions(user_id).await {
            Ok(list) => {
                renderer.emit_sessions(&list, "");
                0
            }
            Err(e) => {
                renderer.emit_error(&e.to_string());
                1
            }
        },
        SessionsAction::Show { session_id } => {
            match client.session_messages(user_id, &session_id).await {
                Ok(history) => {
                    if history.is_empty() {
                        renderer.emit_notice("no messages");
                    }
                    for info in history {
                        renderer.emit_message(&ConversationMessage::from_history(info));
                    }
                    0
                }
                Err(e) => {
                    renderer.emit_error(&e.to_string());
                    1
                }
            }
        }
        SessionsAction::Delete { session_id } => {
            let result = client.delete_session(user_id, &session_id).await;
            report(renderer, result, &format!("deleted {session_id}"))
        }
    }
}

pub async fn docs<W: Write>(
    client: &ChatClient,
    action: DocsAction,
    renderer: &mut ChatRenderer<W>,
) -> i32 {
    match action {
        DocsAction::List => match client.list_documents().await {
            Ok(list) => {
                renderer.emit_documents(&list);
                0
            }
            Err(e) => {
                renderer.emit_error(&e.to_string());
                1
            }
        },
        DocsAction::Upload { path } => {
            let result = client.upload_document(&path).await;
            report(renderer, result, &format!("uploaded {}", path.display()))
        }
        DocsAction::Delete { filename } => {
            let result = client.delete_document(&filename).await;
            report(renderer, result, &format!("deleted {filename}"))
        }
    }
}

//! Interactive chat loop.
//!
//! Reads one line at a time from stdin. Plain lines are sent as chat turns and
//! streamed to the terminal; lines starting with `/` are local commands.
//! Ctrl-C stops an answer in flight and quits when idle.

use std::io::{self, Write};
use std::time::Duration;

use sa_backend::ChatClient;
use sa_protocol::StreamOutcome;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::renderer::ChatRenderer;
use crate::session::ChatSession;
use crate::style::Style;

const HELP: &str = "\
/new            start a new chat
/clear          clear the screen history, keep the session
/history        show this session's messages
/sessions       list stored sessions
/load <id>      switch to a stored session
/delete <id>    delete a stored session
/docs           list knowledge-base documents
/quit           exit";

#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Message(String),
    New,
    Clear,
    History,
    Sessions,
    Load(String),
    Delete(String),
    Docs,
    Help,
    Quit,
    /// A slash command that is unknown or missing its argument.
    Invalid(String),
}

/// Classify one input line. Returns `None` for a blank line.
pub fn parse_command(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(ReplCommand::Message(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let command = match (name, arg) {
        ("new", _) => ReplCommand::New,
        ("clear", _) => ReplCommand::Clear,
        ("history", _) => ReplCommand::History,
        ("sessions", _) => ReplCommand::Sessions,
        ("docs", _) => ReplCommand::Docs,
        ("help" | "?", _) => ReplCommand::Help,
        ("quit" | "exit" | "q", _) => ReplCommand::Quit,
        ("load", id) if !id.is_empty() => ReplCommand::Load(id.to_string()),
        ("delete", id) if !id.is_empty() => ReplCommand::Delete(id.to_string()),
        _ => ReplCommand::Invalid(line.to_string()),
    };
    Some(command)
}

/// Cancel `cancel` on Ctrl-C or when `deadline` passes.
fn spawn_interrupt_watcher(
    cancel: CancellationToken,
    deadline: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let timeout = async {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "ctrl-c handler unavailable");
                    return;
                }
                debug!("interrupted by user");
            }
            _ = timeout => debug!("stream deadline reached"),
        }
        cancel.cancel();
    })
}

/// Stream one turn to the renderer. Returns `None` when the turn could not start.
pub async fn run_turn<W: Write>(
    session: &mut ChatSession,
    client: &ChatClient,
    renderer: &mut ChatRenderer<W>,
    text: &str,
    deadline: Option<Duration>,
) -> Option<StreamOutcome> {
    let cancel = match session.begin_turn(text) {
        Ok(cancel) => cancel,
        Err(e) => {
            renderer.emit_error(&e.to_string());
            return None;
        }
    };
    let watcher = spawn_interrupt_watcher(cancel.clone(), deadline);

    renderer.emit_pending();
    let result = session.stream_turn_with(client, renderer).await;
    watcher.abort();

    match result {
        Ok(outcome) => {
            if let Some(reply) = session.messages().last() {
                renderer.emit_outcome(reply, &outcome);
            }
            Some(outcome)
        }
        Err(e) => {
            renderer.emit_error(&e.to_string());
            None
        }
    }
}

async fn handle_command<W: Write>(
    command: ReplCommand,
    session: &mut ChatSession,
    client: &ChatClient,
    renderer: &mut ChatRenderer<W>,
    deadline: Option<Duration>,
) -> bool {
    match command {
        ReplCommand::Message(text) => {
            run_turn(session, client, renderer, &text, deadline).await;
        }
        ReplCommand::New => {
            session.new_chat();
            renderer.emit_notice(&format!("new chat {}", session.session_id()));
        }
        ReplCommand::Clear => {
            session.clear();
            renderer.emit_notice("cleared");
        }
        ReplCommand::History => {
            if session.messages().is_empty() {
                renderer.emit_notice("no messages yet");
            }
            for message in session.messages() {
                renderer.emit_message(message);
            }
        }
        ReplCommand::Sessions => match session.list_sessions(client).await {
            Ok(sessions) => renderer.emit_sessions(&sessions, session.session_id()),
            Err(e) => renderer.emit_error(&e.to_string()),
        },
        ReplCommand::Load(id) => match session.load_session(client, &id).await {
            Ok(()) => {
                renderer.emit_notice(&format!(
                    "loaded {id} ({} messages)",
                    session.messages().len()
                ));
                for message in session.messages() {
                    renderer.emit_message(message);
                }
            }
            Err(e) => renderer.emit_error(&format!("failed to load {id}: {e}")),
        },
        ReplCommand::Delete(id) => match session.delete_session(client, &id).await {
            Ok(status) if status.message.is_empty() => {
                renderer.emit_notice(&format!("deleted {id}"))
            }
            Ok(status) => renderer.emit_notice(&status.message),
            Err(e) => renderer.emit_error(&e.to_string()),
        },
        ReplCommand::Docs => match client.list_documents().await {
            Ok(docs) => renderer.emit_documents(&docs),
            Err(e) => renderer.emit_error(&e.to_string()),
        },
        ReplCommand::Help => renderer.emit_notice(HELP),
        ReplCommand::Quit => return false,
        ReplCommand::Invalid(line) => {
            renderer.emit_error(&format!("unknown command: {line} (try /help)"))
        }
    }
    true
}

/// Run the interactive loop until `/quit`, end of input, or Ctrl-C while idle.
pub async fn run_repl(
    client: &ChatClient,
    user_id: &str,
    deadline: Option<Duration>,
) -> io::Result<()> {
    let style = Style::new();
    let mut renderer = ChatRenderer::new(io::stdout(), style);
    let mut session = ChatSession::new(user_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    renderer.emit_notice(&format!(
        "superagent {} · {} · {} (type /help)",
        env!("CARGO_PKG_VERSION"),
        client.base_url(),
        session.session_id()
    ));

    loop {
        {
            let w = &mut renderer.writer;
            write!(
                w,
                "{}{}you>{} ",
                style.bold_start(),
                style.green_start(),
                style.reset()
            )?;
            w.flush()?;
        }

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                writeln!(renderer.writer)?;
                break;
            }
        };
        let Some(line) = line else {
            writeln!(renderer.writer)?;
            break;
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };
        if !handle_command(command, &mut session, client, &mut renderer, deadline).await {
            break;
        }
    }
    Ok(())
}

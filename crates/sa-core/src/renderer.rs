//! Terminal output for chat turns, history and document lists.
//!
//! `ChatRenderer<W: Write>` is the view side of a streamed turn: it receives
//! the same events as the message and prints them as they arrive. Every emit
//! method clears the "thinking" spinner line first.

use std::io::Write;

use sa_protocol::{
    ConversationMessage, DocumentInfo, SessionInfo, StreamOutcome, StreamSink, ABORTED_MARKER,
    INTERRUPTED_SUFFIX,
};
use serde_json::Value;

use crate::style::{pad_to, visible_width, Style};

/// Prints chat output to a writer.
pub struct ChatRenderer<W: Write> {
    pub writer: W,
    style: Style,
    spinner_active: bool,
    /// Whether anything has been printed on the current line of the answer.
    mid_line: bool,
}

/// One-line description of a retrieval step.
///
/// Steps are `{icon, label, detail}` objects from the backend; anything else
/// is shown as compact JSON.
pub fn describe_step(step: &Value) -> String {
    match step {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let field = |key: &str| map.get(key).and_then(Value::as_str).unwrap_or("");
            let mut line = [field("icon"), field("label")]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            let detail = field("detail");
            if !detail.is_empty() {
                line.push_str(&format!(" ({detail})"));
            }
            if line.is_empty() {
                step.to_string()
            } else {
                line
            }
        }
        other => other.to_string(),
    }
}

impl<W: Write> ChatRenderer<W> {
    pub fn new(writer: W, style: Style) -> Self {
        Self {
            writer,
            style,
            spinner_active: false,
            mid_line: false,
        }
    }

    pub fn spinner_active(&self) -> bool {
        self.spinner_active
    }

    /// Clear the spinner line if one is active.
    fn clear_spinner(&mut self) {
        if self.spinner_active {
            let _ = write!(self.writer, "\r\x1b[K");
            self.spinner_active = false;
        }
    }

    fn end_line(&mut self) {
        if self.mid_line {
            let _ = writeln!(self.writer);
            self.mid_line = false;
        }
    }

    /// Show the pending indicator while waiting for the first content.
    pub fn emit_pending(&mut self) {
        let _ = write!(
            self.writer,
            "{}… thinking{}",
            self.style.cyan_start(),
            self.style.reset()
        );
        let _ = self.writer.flush();
        self.spinner_active = true;
    }

    /// Print what the terminal state added to the message.
    pub fn emit_outcome(&mut self, message: &ConversationMessage, outcome: &StreamOutcome) {
        self.clear_spinner();
        match outcome {
            StreamOutcome::Completed => {}
            StreamOutcome::Cancelled => {
                let note = if message.text == ABORTED_MARKER {
                    ABORTED_MARKER
                } else {
                    INTERRUPTED_SUFFIX.trim_start()
                };
                self.end_line();
                let _ = write!(
                    self.writer,
                    "{}{note}{}",
                    self.style.dim_start(),
                    self.style.reset()
                );
                self.mid_line = true;
            }
            StreamOutcome::Failed(_) => {
                self.end_line();
                let _ = write!(
                    self.writer,
                    "{}{}{}",
                    self.style.red_start(),
                    message.text,
                    self.style.reset()
                );
                self.mid_line = true;
            }
        }
        self.end_line();
        let _ = self.writer.flush();
    }

    /// Print a whole message, e.g. from history or a non-streamed answer.
    pub fn emit_message(&mut self, message: &ConversationMessage) {
        self.clear_spinner();
        self.end_line();
        let (label, color) = if message.is_user() {
            ("you", self.style.green_start())
        } else {
            ("assistant", self.style.cyan_start())
        };
        let _ = writeln!(
            self.writer,
            "{}{color}{label}>{} {}",
            self.style.bold_start(),
            self.style.reset(),
            message.text
        );
        for step in &message.rag_steps {
            let _ = writeln!(
                self.writer,
                "  {}· {}{}",
                self.style.dim_start(),
                describe_step(step),
                self.style.reset()
            );
        }
        let _ = self.writer.flush();
    }

    pub fn emit_sessions(&mut self, sessions: &[SessionInfo], current: &str) {
        if sessions.is_empty() {
            let _ = writeln!(self.writer, "no sessions");
            return;
        }
        let width = sessions
            .iter()
            .map(|s| visible_width(&s.session_id))
            .max()
            .unwrap_or(0);
        for session in sessions {
            let marker = if session.session_id == current { "*" } else { " " };
            let _ = writeln!(
                self.writer,
                "{marker} {} {}{}  {} messages{}",
                pad_to(&session.session_id, width),
                self.style.dim_start(),
                session.updated_at,
                session.message_count,
                self.style.reset()
            );
        }
        let _ = self.writer.flush();
    }

    pub fn emit_documents(&mut self, documents: &[DocumentInfo]) {
        if documents.is_empty() {
            let _ = writeln!(self.writer, "no documents");
            return;
        }
        let width = documents
            .iter()
            .map(|d| visible_width(&d.filename))
            .max()
            .unwrap_or(0);
        for doc in documents {
            let chunks = doc
                .chunk_count
                .map(|n| format!("  {n} chunks"))
                .unwrap_or_default();
            let _ = writeln!(
                self.writer,
                "{} {}{:<5}{chunks}{}",
                pad_to(&doc.filename, width),
                self.style.dim_start(),
                doc.file_type,
                self.style.reset()
            );
        }
        let _ = self.writer.flush();
    }

    pub fn emit_notice(&mut self, msg: &str) {
        self.clear_spinner();
        self.end_line();
        let _ = writeln!(
            self.writer,
            "{}{msg}{}",
            self.style.dim_start(),
            self.style.reset()
        );
        let _ = self.writer.flush();
    }

    pub fn emit_error(&mut self, msg: &str) {
        self.clear_spinner();
        self.end_line();
        let _ = writeln!(
            self.writer,
            "{}error: {msg}{}",
            self.style.red_start(),
            self.style.reset()
        );
        let _ = self.writer.flush();
    }
}

impl<W: Write> StreamSink for ChatRenderer<W> {
    fn clear_pending(&mut self) {
        self.clear_spinner();
        let _ = self.writer.flush();
    }

    fn on_content(&mut self, text: &str) {
        self.clear_spinner();
        if text.is_empty() {
            return;
        }
        let _ = write!(self.writer, "{text}");
        let _ = self.writer.flush();
        self.mid_line = !text.ends_with('\n');
    }

    fn on_trace(&mut self, _trace: Value) {}

    fn on_step(&mut self, step: Value) {
        let restore_spinner = self.spinner_active;
        self.clear_spinner();
        self.end_line();
        let _ = writeln!(
            self.writer,
            "  {}· {}{}",
            self.style.dim_start(),
            describe_step(&step),
            self.style.reset()
        );
        if restore_spinner {
            self.emit_pending();
        }
        let _ = self.writer.flush();
    }

    fn on_error(&mut self, message: &str) {
        self.clear_spinner();
        let _ = write!(
            self.writer,
            "\n{}[Error: {message}]{}",
            self.style.red_start(),
            self.style.reset()
        );
        let _ = self.writer.flush();
        self.mid_line = true;
    }

    fn on_done(&mut self) {
        self.clear_spinner();
        self.end_line();
        let _ = self.writer.flush();
    }
}

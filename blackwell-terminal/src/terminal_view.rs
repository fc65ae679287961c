//! Both pages rendered onto a line-oriented terminal.
//!
//! The backend answers every turn with the full conversation, so the view
//! keeps the transcript it already printed and only writes what is new.
//! Rendered report HTML goes to files in the output directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use blackwell_client::{AnamnesisView, ChatMessage, EvaluationView, MessageRole};
use chrono::Local;
use tracing::{error, info};

pub const REPORT_FILE: &str = "anamnesis-report.html";
pub const EVALUATION_FILE: &str = "evaluation.html";

pub struct TerminalView<W: Write + Send> {
    out: W,
    out_dir: PathBuf,
    transcript: Vec<ChatMessage>,
    cursor: usize,
    form_enabled: bool,
    evaluation_enabled: bool,
    placeholder: Option<String>,
    report_placeholder: Option<String>,
    navigate_requested: bool,
    written: Vec<PathBuf>,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out,
            out_dir: out_dir.into(),
            transcript: Vec::new(),
            cursor: 0,
            form_enabled: false,
            evaluation_enabled: false,
            placeholder: None,
            report_placeholder: None,
            navigate_requested: false,
            written: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Drop the printed transcript so the next messages are shown even if
    /// they repeat earlier ones.
    pub fn forget_transcript(&mut self) {
        self.transcript.clear();
        self.cursor = 0;
    }

    pub fn take_navigation(&mut self) -> bool {
        std::mem::take(&mut self.navigate_requested)
    }

    pub fn prompt(&mut self) {
        let prompt = if self.form_enabled { "> " } else { "(locked) > " };
        if let Err(e) = write!(self.out, "{}", prompt).and_then(|_| self.out.flush()) {
            error!("Failed to write prompt: {}", e);
        }
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            error!("Failed to write to terminal: {}", e);
        }
    }

    fn write_page(&mut self, file_name: &str, title: &str, body: &str) {
        let path = self.out_dir.join(file_name);
        match write_document(&path, title, body) {
            Ok(()) => {
                info!("Wrote {}", path.display());
                self.line(&format!("{} written to {}", title, path.display()));
                self.written.push(path);
            }
            Err(e) => {
                error!("Failed to write {}: {}", path.display(), e);
                self.line(&format!("[error] Could not write {}: {}", path.display(), e));
            }
        }
    }
}

fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "You",
        MessageRole::Assistant => "Assistant",
        MessageRole::System => "System",
    }
}

/// Wrap a rendered fragment in a standalone HTML page.
pub fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n\
         <p class=\"generated-at\">Generated {generated}</p>\n{body}\n</body>\n</html>\n",
        title = title,
        generated = Local::now().format("%Y-%m-%d %H:%M:%S"),
        body = body,
    )
}

fn write_document(path: &Path, title: &str, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html_document(title, body))
}

impl<W: Write + Send> AnamnesisView for TerminalView<W> {
    fn clear_log(&mut self) {
        self.cursor = 0;
    }

    fn append_message(&mut self, message: &ChatMessage) {
        if self.transcript.get(self.cursor) == Some(message) {
            self.cursor += 1;
            return;
        }

        self.transcript.truncate(self.cursor);
        self.transcript.push(message.clone());
        self.cursor += 1;

        let stamp = Local::now().format("%H:%M:%S");
        self.line(&format!(
            "[{}] {}: {}",
            stamp,
            role_label(message.role),
            message.content.trim()
        ));
    }

    fn show_error(&mut self, message: &str) {
        self.line(&format!("[error] {}", message));
    }

    fn set_form_enabled(&mut self, enabled: bool) {
        self.form_enabled = enabled;
    }

    fn set_input_placeholder(&mut self, text: &str) {
        if self.placeholder.as_deref() != Some(text) {
            self.placeholder = Some(text.to_string());
            self.line(&format!("({})", text));
        }
    }

    fn show_report(&mut self, html: &str) {
        self.report_placeholder = None;
        self.write_page(REPORT_FILE, "Anamnesis report", html);
    }

    fn show_report_placeholder(&mut self, text: &str) {
        if self.report_placeholder.as_deref() != Some(text) {
            self.report_placeholder = Some(text.to_string());
            self.line(text);
        }
    }

    fn set_evaluation_enabled(&mut self, enabled: bool) {
        if enabled && !self.evaluation_enabled {
            self.line("Evaluation available: type /evaluate to generate it.");
        }
        self.evaluation_enabled = enabled;
    }

    fn show_notice(&mut self, text: &str) {
        self.line(&format!("[notice] {}", text));
    }

    fn navigate_to_evaluation(&mut self) {
        self.navigate_requested = true;
        self.line("Opening evaluation...");
    }

    fn show_pending_files(&mut self, names: &[String]) {
        if !names.is_empty() {
            self.line(&format!("Attached (sent with next message): {}", names.join(", ")));
        }
    }
}

impl<W: Write + Send> EvaluationView for TerminalView<W> {
    fn show_placeholder(&mut self, text: &str) {
        self.line(text);
    }

    fn show_evaluation(&mut self, html: &str) {
        self.write_page(EVALUATION_FILE, "Clinical evaluation", html);
    }
}

//! Anamnesis page controller.
//!
//! Owns the chat form lifecycle: sending turns (uploads first, then text),
//! mirroring the thread and report into session storage, and switching the
//! page into the locked report mode once the interview is over.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, Result};
use crate::format::render_anamnesis_report;
use crate::models::{Attachment, ChatMessage, strip_report_preamble};
use crate::state::SessionState;
use crate::storage::SessionStore;
use crate::transport::Transport;
use crate::view::{AnamnesisView, COMPLETED_PLACEHOLDER, INPUT_PLACEHOLDER, REPORT_PLACEHOLDER};

/// Outcome of a submitted turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Conversation locked; nothing was sent.
    Ignored,
    /// Nothing to send.
    Empty,
    Continued,
    Finalized,
    Failed(String),
}

pub struct AnamnesisController<V: AnamnesisView> {
    transport: Arc<dyn Transport>,
    state: SessionState,
    view: V,
    pending_files: Vec<Attachment>,
    locked: bool,
}

impl<V: AnamnesisView> AnamnesisController<V> {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn SessionStore>, view: V) -> Self {
        let state = SessionState::new(store);
        let locked = state.report().is_some();
        Self {
            transport,
            state,
            view,
            pending_files: Vec::new(),
            locked,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn pending_files(&self) -> &[Attachment] {
        &self.pending_files
    }

    pub fn queue_files(&mut self, files: impl IntoIterator<Item = Attachment>) {
        self.pending_files.extend(files);
        self.refresh_pending_files();
    }

    pub fn clear_queue(&mut self) {
        self.pending_files.clear();
        self.refresh_pending_files();
    }

    /// Restore the page from session storage.
    pub async fn initialize(&mut self) {
        self.view.show_report_placeholder(REPORT_PLACEHOLDER);

        let thread_id = self.state.thread_id();
        match (thread_id, self.state.report()) {
            (Some(thread_id), None) => {
                let history = self.load_history(&thread_id).await;
                self.render_messages(&history, None);

                match history.last() {
                    Some(last) if last.is_terminal_report() => {
                        let report = last.content.clone();
                        self.finalize(&report);
                    }
                    _ => self.view.set_form_enabled(true),
                }
            }
            (thread_id, Some(report)) => {
                if let Some(thread_id) = thread_id {
                    let history = self.load_history(&thread_id).await;
                    if !history.is_empty() {
                        self.render_messages(&history, None);
                    }
                }
                self.finalize(&report);
            }
            (None, None) => {
                self.view.set_evaluation_enabled(false);
                self.view.set_form_enabled(true);
            }
        }
    }

    /// Submit the chat form: queued plus given files are uploaded first, then
    /// the trimmed message (if any) is sent.
    pub async fn send_turn(&mut self, message: &str, files: Vec<Attachment>) -> TurnOutcome {
        if self.locked {
            debug!("Conversation locked, ignoring submitted turn");
            return TurnOutcome::Ignored;
        }

        self.pending_files.extend(files);
        let message = message.trim();
        if message.is_empty() && self.pending_files.is_empty() {
            return TurnOutcome::Empty;
        }

        self.view.set_form_enabled(false);

        let outcome = match self.run_turn(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Chat turn failed: {}", e);
                let text = e.user_message();
                self.view.show_error(&text);
                TurnOutcome::Failed(text)
            }
        };

        if !self.locked {
            self.view.set_form_enabled(true);
        }

        outcome
    }

    async fn run_turn(&mut self, message: &str) -> Result<TurnOutcome> {
        let files = std::mem::take(&mut self.pending_files);
        let uploaded = self.upload_files(&files).await;
        if uploaded.is_err() {
            self.pending_files = files;
        }
        uploaded?;
        self.refresh_pending_files();

        if message.is_empty() {
            return Ok(TurnOutcome::Continued);
        }

        self.view.append_message(&ChatMessage::user(message));

        let thread_id = self.state.thread_id();
        let response = self
            .transport
            .post_chat_message(thread_id.as_deref(), message)
            .await?;

        SessionState::log_failure(self.state.set_thread_id(&response.thread_id), "store thread id");

        if let Some(report) = response.terminal_report().map(str::to_string) {
            let suppress = response
                .final_report
                .is_none()
                .then(|| response.messages.len().saturating_sub(1));
            self.render_messages(&response.messages, suppress);
            self.finalize(&report);
            return Ok(TurnOutcome::Finalized);
        }

        self.render_messages(&response.messages, None);
        self.reopen();
        Ok(TurnOutcome::Continued)
    }

    /// Upload attachments ahead of the next message. An empty set resolves
    /// without touching the network.
    pub async fn upload_files(&mut self, files: &[Attachment]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let thread_id = self.state.thread_id();
        let response = self
            .transport
            .post_upload(thread_id.as_deref(), files)
            .await?;

        info!(
            "Uploaded {} file(s) on thread {}",
            files.len(),
            response.thread_id
        );
        SessionState::log_failure(self.state.set_thread_id(&response.thread_id), "store thread id");

        for message in response.messages.iter().filter(|m| !m.is_terminal_report()) {
            self.view.append_message(message);
        }
        Ok(())
    }

    /// Lock the conversation on the given report.
    pub fn finalize(&mut self, report: &str) {
        let report = strip_report_preamble(report);

        self.locked = true;
        SessionState::log_failure(self.state.set_report(report), "store report");

        self.view.set_form_enabled(false);
        self.view.show_report(&render_anamnesis_report(report));
        self.view.set_evaluation_enabled(true);
        self.view.set_input_placeholder(COMPLETED_PLACEHOLDER);
        info!("Anamnesis finalized ({} characters)", report.len());
    }

    /// Start over: local state, the visible page, and (best-effort) the
    /// backend's copy of the session.
    pub async fn reset(&mut self) {
        self.locked = false;
        self.pending_files.clear();
        SessionState::log_failure(self.state.clear_all(), "clear session");

        self.view.clear_log();
        self.view.show_report_placeholder(REPORT_PLACEHOLDER);
        self.view.set_evaluation_enabled(false);
        self.view.show_pending_files(&[]);
        self.view.set_input_placeholder(INPUT_PLACEHOLDER);

        if let Err(e) = self.transport.post_reset().await {
            warn!("Backend session reset failed: {}", e);
        }

        self.view.set_form_enabled(true);
    }

    /// Hand off to the evaluation page. Needs a finished report and a thread.
    pub fn request_evaluation(&mut self) -> Result<()> {
        if self.state.report().is_none() || self.state.thread_id().is_none() {
            self.view
                .show_notice("Cannot start evaluation. Please complete the anamnesis first.");
            return Err(ClientError::MissingState(
                "report and thread are required for evaluation".to_string(),
            ));
        }

        self.state.request_evaluation()?;
        self.view.navigate_to_evaluation();
        Ok(())
    }

    fn reopen(&mut self) {
        self.locked = false;
        self.view.set_evaluation_enabled(false);
        SessionState::log_failure(self.state.clear_derived(), "clear stale report");
        self.view.show_report_placeholder(REPORT_PLACEHOLDER);
    }

    async fn load_history(&self, thread_id: &str) -> Vec<ChatMessage> {
        match self.transport.fetch_history(thread_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Failed to load conversation history: {}", e);
                Vec::new()
            }
        }
    }

    /// Replace the log with `messages`, skipping terminal reports and the
    /// entry at `suppress`.
    fn render_messages(&mut self, messages: &[ChatMessage], suppress: Option<usize>) {
        self.view.clear_log();
        for (index, message) in messages.iter().enumerate() {
            if Some(index) == suppress || message.is_terminal_report() {
                continue;
            }
            self.view.append_message(message);
        }
    }

    fn refresh_pending_files(&mut self) {
        let names: Vec<String> = self
            .pending_files
            .iter()
            .map(|file| file.file_name.clone())
            .collect();
        self.view.show_pending_files(&names);
    }
}

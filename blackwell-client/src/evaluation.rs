//! Evaluation page controller.

use std::sync::Arc;
use tracing::{error, info};

use crate::error::{ClientError, Result};
use crate::format::render_evaluation_report;
use crate::state::SessionState;
use crate::storage::SessionStore;
use crate::transport::Transport;
use crate::view::EvaluationView;

pub const MISSING_REPORT: &str =
    "No anamnesis report found. Return to anamnesis to complete the interview.";
pub const MISSING_THREAD: &str =
    "Session reference missing. Return to the anamnesis page and restart the session.";
pub const NOT_GENERATED: &str = "No evaluation generated yet. Return to anamnesis and click 'Generate Evaluation' to start.";
pub const GENERATING: &str = "Generating evaluation...";

/// What the page ended up showing after [`EvaluationController::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    MissingReport,
    MissingThread,
    Generated,
    Restored,
    NotGenerated,
    Failed(String),
}

pub struct EvaluationController<V: EvaluationView> {
    transport: Arc<dyn Transport>,
    state: SessionState,
    view: V,
}

impl<V: EvaluationView> EvaluationController<V> {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn SessionStore>, view: V) -> Self {
        Self {
            transport,
            state: SessionState::new(store),
            view,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub async fn load(&mut self) -> LoadOutcome {
        if self.state.report().is_none() {
            self.view.show_placeholder(MISSING_REPORT);
            return LoadOutcome::MissingReport;
        }
        if self.state.thread_id().is_none() {
            self.view.show_placeholder(MISSING_THREAD);
            return LoadOutcome::MissingThread;
        }

        let triggered = match self.state.take_evaluation_request() {
            Ok(triggered) => triggered,
            Err(e) => {
                error!("Failed to read evaluation trigger: {}", e);
                self.state.evaluation_requested()
            }
        };
        if triggered {
            return match self.request_evaluation().await {
                Ok(_) => LoadOutcome::Generated,
                Err(e) => LoadOutcome::Failed(e.user_message()),
            };
        }

        match self.state.evaluation() {
            Some(evaluation) => {
                self.view.show_evaluation(&render_evaluation_report(&evaluation));
                LoadOutcome::Restored
            }
            None => {
                self.view.show_placeholder(NOT_GENERATED);
                LoadOutcome::NotGenerated
            }
        }
    }

    /// Ask the backend to evaluate the stored report and render the result.
    pub async fn request_evaluation(&mut self) -> Result<String> {
        let (Some(report), Some(thread_id)) = (self.state.report(), self.state.thread_id()) else {
            return Err(ClientError::MissingState(
                "report and thread are required for evaluation".to_string(),
            ));
        };

        self.view.show_placeholder(GENERATING);

        match self.transport.post_evaluate(&thread_id, &report).await {
            Ok(evaluation) => {
                info!(
                    "Received evaluation for thread {} ({} characters)",
                    thread_id,
                    evaluation.len()
                );
                self.view.show_evaluation(&render_evaluation_report(&evaluation));
                SessionState::log_failure(self.state.set_evaluation(&evaluation), "store evaluation");
                Ok(evaluation)
            }
            Err(e) => {
                error!("Evaluation request failed: {}", e);
                self.view.show_placeholder(&e.user_message());
                Err(e)
            }
        }
    }
}

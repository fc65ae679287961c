use crate::models::ChatMessage;

pub const INPUT_PLACEHOLDER: &str = "Describe the patient's condition...";
pub const COMPLETED_PLACEHOLDER: &str = "Anamnesis completed. Start a new session to continue.";
pub const REPORT_PLACEHOLDER: &str =
    "Complete the anamnesis conversation to unlock the structured report.";

/// Rendering surface of the anamnesis page.
pub trait AnamnesisView: Send {
    fn clear_log(&mut self);
    fn append_message(&mut self, message: &ChatMessage);
    /// Inline failure shown in the log as a system entry.
    fn show_error(&mut self, message: &str);
    fn set_form_enabled(&mut self, enabled: bool);
    fn set_input_placeholder(&mut self, text: &str);
    fn show_report(&mut self, html: &str);
    fn show_report_placeholder(&mut self, text: &str);
    fn set_evaluation_enabled(&mut self, enabled: bool);
    fn show_notice(&mut self, text: &str);
    fn navigate_to_evaluation(&mut self);
    fn show_pending_files(&mut self, _names: &[String]) {}
}

/// Rendering surface of the evaluation page.
pub trait EvaluationView: Send {
    fn show_placeholder(&mut self, text: &str);
    fn show_evaluation(&mut self, html: &str);
}

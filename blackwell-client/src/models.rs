use serde::{Deserialize, Serialize};

/// Literal tag that opens the structured anamnesis report.
pub const TERMINAL_MARKER: &str = "[ANAMNESIS REPORT]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// An assistant message whose content opens with the terminal marker,
    /// ignoring leading whitespace. Matching is a prefix rule only.
    pub fn is_terminal_report(&self) -> bool {
        self.role == MessageRole::Assistant
            && self.content.trim_start().starts_with(TERMINAL_MARKER)
    }
}

/// Drop any text before the first terminal marker. Content without the
/// marker, or with the marker at position 0, is returned unchanged.
pub fn strip_report_preamble(report: &str) -> &str {
    match report.find(TERMINAL_MARKER) {
        Some(index) if index > 0 => &report[index..],
        _ => report,
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub thread_id: Option<&'a str>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    pub thread_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub final_report: Option<String>,
}

impl ChatResponse {
    /// The report text this turn ends with, if the turn is terminal.
    pub fn terminal_report(&self) -> Option<&str> {
        if let Some(report) = self.final_report.as_deref() {
            if !report.trim().is_empty() {
                return Some(report);
            }
        }

        if self.finished {
            return self
                .messages
                .last()
                .map(|message| message.content.as_str())
                .filter(|content| !content.trim().is_empty());
        }

        None
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryRequest<'a> {
    pub thread_id: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    pub thread_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct EvaluationRequest<'a> {
    pub report: &'a str,
    pub thread_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationResponse {
    pub evaluation: String,
}

/// A file queued for upload with the next turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                crate::ClientError::Attachment(format!("Invalid file name: {}", path.display()))
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let content_type = content_type_for(&file_name).to_string();

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

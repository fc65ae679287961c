use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Missing session state: {0}")]
    MissingState(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Text shown inline on the page when a call fails.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) => "Failed to reach the anamnesis agent.".to_string(),
            ClientError::Status { status, body } if body.trim().is_empty() => {
                format!("Request failed with status {}.", status)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

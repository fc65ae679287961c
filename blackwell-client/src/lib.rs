pub mod anamnesis;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod format;
pub mod models;
pub mod state;
pub mod storage;
pub mod transport;
pub mod view;

// Re-export commonly used types
pub use anamnesis::{AnamnesisController, TurnOutcome};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use evaluation::{EvaluationController, LoadOutcome};
pub use format::{render_anamnesis_report, render_evaluation_report};
pub use models::{Attachment, ChatMessage, ChatResponse, MessageRole, TERMINAL_MARKER};
pub use state::SessionState;
pub use storage::{FileSessionStore, InMemorySessionStore, SessionStore};
pub use transport::{HttpTransport, Transport};
pub use view::{AnamnesisView, EvaluationView};

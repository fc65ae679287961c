//! HTTP plumbing for the five backend endpoints.
//!
//! Every call is a single request/response: no retry, no backoff, and the
//! client's default timeout. A non-success status or a network failure turns
//! into one [`ClientError`]; the status and body are kept for display only.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{
    Attachment, ChatMessage, ChatRequest, ChatResponse, EvaluationRequest, EvaluationResponse,
    HistoryRequest, HistoryResponse, UploadResponse,
};

pub const CHAT_PATH: &str = "/api/chat";
pub const HISTORY_PATH: &str = "/api/chat/history";
pub const UPLOAD_PATH: &str = "/api/upload";
pub const EVALUATE_PATH: &str = "/api/evaluate";
pub const RESET_PATH: &str = "/api/reset";

/// Backend operations the page controllers depend on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_chat_message(&self, thread_id: Option<&str>, message: &str)
    -> Result<ChatResponse>;

    async fn post_upload(
        &self,
        thread_id: Option<&str>,
        files: &[Attachment],
    ) -> Result<UploadResponse>;

    async fn fetch_history(&self, thread_id: &str) -> Result<Vec<ChatMessage>>;

    async fn post_evaluate(&self, thread_id: &str, report: &str) -> Result<String>;

    async fn post_reset(&self) -> Result<()>;
}

/// reqwest-backed Transport
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;
        decode(path, response).await
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!("{} returned {}: {}", path, status, body);
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::Decode(format!("{} response: {}", path, e)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_chat_message(
        &self,
        thread_id: Option<&str>,
        message: &str,
    ) -> Result<ChatResponse> {
        let request = ChatRequest { message, thread_id };
        let response: ChatResponse = self.post_json(CHAT_PATH, &request).await?;
        info!(
            "Chat turn on thread {} returned {} messages (finished: {})",
            response.thread_id,
            response.messages.len(),
            response.finished
        );
        Ok(response)
    }

    async fn post_upload(
        &self,
        thread_id: Option<&str>,
        files: &[Attachment],
    ) -> Result<UploadResponse> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }
        if let Some(thread_id) = thread_id {
            form = form.text("thread_id", thread_id.to_string());
        }

        let url = self.config.endpoint(UPLOAD_PATH);
        info!("Uploading {} file(s) to {}", files.len(), url);

        let response = self.client.post(&url).multipart(form).send().await?;
        decode(UPLOAD_PATH, response).await
    }

    async fn fetch_history(&self, thread_id: &str) -> Result<Vec<ChatMessage>> {
        let request = HistoryRequest { thread_id };
        let response: HistoryResponse = self.post_json(HISTORY_PATH, &request).await?;
        Ok(response.messages)
    }

    async fn post_evaluate(&self, thread_id: &str, report: &str) -> Result<String> {
        info!(
            "Requesting evaluation for thread {} (report length: {})",
            thread_id,
            report.len()
        );
        let request = EvaluationRequest { report, thread_id };
        let response: EvaluationResponse = self.post_json(EVALUATE_PATH, &request).await?;
        Ok(response.evaluation)
    }

    async fn post_reset(&self) -> Result<()> {
        let url = self.config.endpoint(RESET_PATH);
        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

//! Async client for the Code Chatter code-analysis and chat API.
//!
//! The crate is built around three pieces:
//!
//! - [`ApiClient`] — the request executor. One call to
//!   [`execute`](ApiClient::execute) gives bounded retries with integer
//!   exponential backoff, a per-attempt deadline, and content-negotiated
//!   decoding. 4xx responses are terminal and never retried; timeouts,
//!   network failures, 5xx, and decode failures are retried up to the
//!   configured budget. See [`api`] for the transport layer.
//! - [`ApiClient::stream`] — the chunked-stream consumer for the `ask` and
//!   `chatbot` endpoints. Decoded text fragments reach a caller-supplied
//!   sink in arrival order, multi-byte characters intact even when split
//!   across chunks. Streaming calls are never retried.
//! - [`chat::ChatStore`] — the state container behind an incrementally
//!   rendered conversation: a reducer over append/patch/clear actions that
//!   merges streamed deltas against the authoritative stored content.
//!
//! # Getting started
//!
//! ```ignore
//! use chatter_client::{ApiClient, ClientConfig, chat::ChatStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chatter_client::ApiError> {
//!     let client = ApiClient::new(ClientConfig::new("http://localhost:8000"))?;
//!     let store = ChatStore::new();
//!
//!     store.push_user("What does this codebase do?");
//!     let id = store.begin_assistant();
//!     client
//!         .ask("What does this codebase do?", |fragment| {
//!             store.push_delta(&id, fragment);
//!         })
//!         .await?;
//!     store.finalize(&id);
//!     Ok(())
//! }
//! ```
//!
//! Lower-level calls go through [`RequestSpec`] directly:
//!
//! ```ignore
//! let payload = client
//!     .execute(RequestSpec::get("/api/v1/health").retries(0))
//!     .await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

pub mod api;
pub mod chat;

pub use api::{ApiError, Body, FormFile, Payload, RequestSpec, RetryConfig};

/// Version prefix shared by every endpoint.
const API_PREFIX: &str = "/api/v1";

// ── Configuration ──────────────────────────────────────────────────

/// Process-wide client configuration.
///
/// Read once at client construction and immutable afterwards; per-call
/// overrides live on [`RequestSpec`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Code Chatter backend, without the `/api/v1` prefix.
    pub base_url: String,
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles on each subsequent one.
    pub retry_base_delay: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }

    /// Base URL from the `CODE_CHATTER_URL` environment variable, falling
    /// back to a local development backend.
    pub fn from_env() -> Self {
        let base_url = std::env::var("CODE_CHATTER_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        Self::new(base_url)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Code Chatter API.
///
/// Construct one per process with an explicit [`ClientConfig`] and pass it
/// to callers; there is no process-wide singleton. Cloning the inner
/// transport is cheap, so sharing a `&ApiClient` is all most callers need.
pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: ClientConfig,
}

impl ApiClient {
    /// Build a client from an immutable configuration value.
    ///
    /// No transport-level timeout is set here: the executor applies one
    /// deadline per attempt, and streamed bodies are open-ended.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("chatter-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Network)?;
        info!(base_url = %config.base_url, "client configured");
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

// ── Wire types ─────────────────────────────────────────────────────

/// `GET /api/v1/health` response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database_status: String,
    pub uptime_seconds: f64,
}

/// One retrieved source document attached to a sync answer.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// `POST /api/v1/ask-sync` response.
#[derive(Debug, Clone, Deserialize)]
pub struct Answer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceDocument>,
}

/// `GET /api/v1/chatbot-health` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatbotHealth {
    pub chatbot_status: String,
    pub ready: bool,
    pub error: Option<String>,
}

/// 202 response from the data-processing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskAccepted {
    pub message: String,
    pub task_id: String,
    pub status_url: String,
}

/// Lifecycle of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// `GET /api/v1/tasks/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundTask {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: f64,
    pub error_message: Option<String>,
}

/// `POST /api/v1/analyze-repo-structure` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoStructure {
    /// Branch, head commit, and remotes, as reported by the backend.
    #[serde(default)]
    pub repository_info: serde_json::Value,
    pub total_files: u64,
    /// File counts keyed by extension.
    #[serde(default)]
    pub file_types: HashMap<String, u64>,
    /// The most common extensions, most frequent first.
    #[serde(default)]
    pub largest_file_types: Vec<(String, u64)>,
}

/// `GET /api/v1/database-status` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseStatus {
    pub status: String,
    pub message: String,
    /// A number, or the string `"unknown"` when the collection exists but
    /// its size cannot be read.
    #[serde(default)]
    pub document_count: serde_json::Value,
    pub collection_name: Option<String>,
}

// ── Endpoint wrappers ──────────────────────────────────────────────

impl ApiClient {
    /// Backend health summary.
    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.execute_json(RequestSpec::get(format!("{API_PREFIX}/health")))
            .await
    }

    /// Ask a question about the processed codebase, streaming answer
    /// fragments to `sink` as they arrive.
    pub async fn ask(&self, question: &str, sink: impl FnMut(&str)) -> Result<(), ApiError> {
        let spec = RequestSpec::post(format!("{API_PREFIX}/ask")).json(json!({ "text": question }));
        self.stream(spec, sink).await
    }

    /// Ask a question and wait for the complete answer with sources.
    pub async fn ask_sync(&self, question: &str) -> Result<Answer, ApiError> {
        let spec =
            RequestSpec::post(format!("{API_PREFIX}/ask-sync")).json(json!({ "text": question }));
        self.execute_json(spec).await
    }

    /// Suggested questions for the current knowledge base.
    pub async fn suggested_questions(&self) -> Result<Vec<String>, ApiError> {
        self.execute_json(RequestSpec::get(format!("{API_PREFIX}/suggested-questions")))
            .await
    }

    /// General-assistant chat, streamed.
    pub async fn chatbot(&self, question: &str, sink: impl FnMut(&str)) -> Result<(), ApiError> {
        let spec =
            RequestSpec::post(format!("{API_PREFIX}/chatbot")).json(json!({ "text": question }));
        self.stream(spec, sink).await
    }

    /// General-assistant chat, complete response.
    pub async fn chatbot_sync(&self, question: &str) -> Result<String, ApiError> {
        let spec = RequestSpec::post(format!("{API_PREFIX}/chatbot-sync"))
            .json(json!({ "text": question }));
        Ok(self.execute(spec).await?.into_text())
    }

    /// Chatbot service health.
    pub async fn chatbot_health(&self) -> Result<ChatbotHealth, ApiError> {
        self.execute_json(RequestSpec::get(format!("{API_PREFIX}/chatbot-health")))
            .await
    }

    /// Queue a Git repository for ingestion. Returns immediately with a
    /// task handle; poll [`task`](Self::task) for progress.
    pub async fn process_repo(&self, repo_url: &str) -> Result<TaskAccepted, ApiError> {
        let spec = RequestSpec::post(format!("{API_PREFIX}/process-repo"))
            .json(json!({ "url": repo_url }));
        self.execute_json(spec).await
    }

    /// Inspect a repository's layout without ingesting it: file counts
    /// by extension plus basic commit metadata.
    pub async fn analyze_repo_structure(&self, repo_url: &str) -> Result<RepoStructure, ApiError> {
        let spec = RequestSpec::post(format!("{API_PREFIX}/analyze-repo-structure"))
            .json(json!({ "url": repo_url }));
        self.execute_json(spec).await
    }

    /// Upload files for ingestion as a multipart form.
    pub async fn process_files(&self, files: Vec<FormFile>) -> Result<TaskAccepted, ApiError> {
        let spec = RequestSpec::post(format!("{API_PREFIX}/process-files")).form(files);
        self.execute_json(spec).await
    }

    /// Status of one background task.
    pub async fn task(&self, task_id: &str) -> Result<BackgroundTask, ApiError> {
        self.execute_json(RequestSpec::get(format!("{API_PREFIX}/tasks/{task_id}")))
            .await
    }

    /// All known background tasks, keyed by id.
    pub async fn tasks(&self) -> Result<HashMap<String, BackgroundTask>, ApiError> {
        self.execute_json(RequestSpec::get(format!("{API_PREFIX}/tasks")))
            .await
    }

    /// Vector database status.
    pub async fn database_status(&self) -> Result<DatabaseStatus, ApiError> {
        self.execute_json(RequestSpec::get(format!("{API_PREFIX}/database-status")))
            .await
    }

    /// Drop the knowledge base. Returns the confirmation message.
    pub async fn reset_database(&self) -> Result<String, ApiError> {
        let payload = self
            .execute(RequestSpec::post(format!("{API_PREFIX}/reset-database")))
            .await?;
        if let Payload::Json(value) = &payload
            && let Some(message) = value.get("message").and_then(|m| m.as_str())
        {
            return Ok(message.to_string());
        }
        Ok(payload.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_the_process_wide_policy() {
        let config = ClientConfig::new("http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
    }

    #[test]
    fn config_builders_override_defaults() {
        let config = ClientConfig::new("http://example")
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(1)
            .with_retry_base_delay(Duration::from_millis(50));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_base_delay, Duration::from_millis(50));
    }

    #[test]
    fn task_status_parses_wire_values() {
        let status: TaskStatus = serde_json::from_str(r#""running""#).unwrap();
        assert_eq!(status, TaskStatus::Running);
        let status: TaskStatus = serde_json::from_str(r#""cancelled""#).unwrap();
        assert_eq!(status, TaskStatus::Cancelled);
    }

    #[test]
    fn database_status_tolerates_unknown_count() {
        let parsed: DatabaseStatus = serde_json::from_value(json!({
            "status": "available",
            "message": "Vector store exists but collection info unavailable",
            "document_count": "unknown"
        }))
        .unwrap();
        assert_eq!(parsed.document_count, json!("unknown"));
        assert!(parsed.collection_name.is_none());
    }

    #[test]
    fn answer_defaults_to_empty_sources() {
        let parsed: Answer = serde_json::from_value(json!({"answer": "hi"})).unwrap();
        assert!(parsed.sources.is_empty());
    }
}

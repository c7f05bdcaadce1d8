pub mod assistant;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A file handed over by the user together with a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    /// Lowercased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// Lifecycle status of an assistant run, as reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Polling continues only while the run sits in one of these states.
    pub fn is_pending(self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelling | RunStatus::Cancelled | RunStatus::Expired
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    pub created_at: i64,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextValue {
    pub value: String,
}

impl ThreadMessage {
    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }

    /// Text of the first content block, if it carries any.
    pub fn text(&self) -> Option<&str> {
        self.content
            .first()
            .and_then(|c| c.text.as_ref())
            .map(|t| t.value.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// Capability interface over the hosted assistant service.
///
/// `openai::OpenAiAssistants` talks to the real REST API; tests substitute
/// scripted doubles to simulate latency and failures.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self) -> Result<String, AssistError>;

    /// Uploads a file to the service's file store and returns its handle.
    async fn upload_file(&self, attachment: &Attachment) -> Result<String, AssistError>;

    async fn create_message(
        &self,
        thread_id: &str,
        text: &str,
        file_id: Option<&str>,
    ) -> Result<(), AssistError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, AssistError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistError>;

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistError>;
}

/// Coarse error classes. Callers that only need to decide how to surface an
/// error match on this instead of the full `AssistError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Upstream,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Run {run_id} ended with status {status:?}")]
    RunFailed { run_id: String, status: RunStatus },
    #[error("Run {run_id} still pending after {polls} polls")]
    Timeout { run_id: String, polls: u32 },
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AssistError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssistError::Configuration(_) => ErrorKind::Configuration,
            AssistError::NotFound(_) => ErrorKind::NotFound,
            AssistError::Http(_)
            | AssistError::Api { .. }
            | AssistError::RunFailed { .. }
            | AssistError::Timeout { .. } => ErrorKind::Upstream,
        }
    }
}

//! The relay endpoint: browser-facing side of an assistant turn.

use crate::llm::assistant::Assistant;
use crate::llm::{AssistError, AssistantApi, Attachment, ErrorKind};
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const NOT_CONFIGURED_MESSAGE: &str = "OpenAI API key or Assistant ID not configured";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
pub const INVALID_REQUEST_MESSAGE: &str = "Invalid request";

/// `None` when credentials are missing: every request then fails fast.
pub struct RelayState<A> {
    pub assistant: Option<Assistant<A>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistResponse {
    pub thread_id: String,
    pub message_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Default)]
pub struct AssistForm {
    pub message: String,
    pub thread_id: Option<String>,
    pub file: Option<Attachment>,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Not a multipart request: {0}")]
    NotMultipart(#[from] MultipartRejection),
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Missing message field")]
    MissingMessage,
    #[error(transparent)]
    Assist(#[from] AssistError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        // Upstream detail stays in the server log.
        let (status, message) = match &self {
            RelayError::NotMultipart(_)
            | RelayError::Multipart(_)
            | RelayError::MissingMessage => {
                warn!("Rejected assist request: {self}");
                (StatusCode::INTERNAL_SERVER_ERROR, INVALID_REQUEST_MESSAGE)
            }
            RelayError::Assist(err) if err.kind() == ErrorKind::Configuration => {
                error!("Assist request refused: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, NOT_CONFIGURED_MESSAGE)
            }
            RelayError::Assist(err) => {
                error!("API Error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
            }
        };
        (
            status,
            Json(ErrorBody {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

pub async fn assist<A: AssistantApi + 'static>(
    State(state): State<Arc<RelayState<A>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AssistResponse>, RelayError> {
    let Some(assistant) = &state.assistant else {
        return Err(AssistError::Configuration(NOT_CONFIGURED_MESSAGE.into()).into());
    };

    let form = read_form(multipart?).await?;
    info!(
        "Assist request (thread: {}, file: {})",
        form.thread_id.as_deref().unwrap_or("new"),
        form.file.as_ref().map(|f| f.file_name.as_str()).unwrap_or("none"),
    );

    let conversation = assistant
        .converse(form.thread_id.as_deref(), &form.message, form.file.as_ref())
        .await?;

    Ok(Json(AssistResponse {
        thread_id: conversation.thread_id,
        message_id: conversation.message_id,
        content: conversation.content,
    }))
}

pub async fn read_form(mut multipart: Multipart) -> Result<AssistForm, RelayError> {
    let mut message = None;
    let mut form = AssistForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("message") => message = Some(field.text().await?),
            Some("threadId") => {
                let id = field.text().await?;
                form.thread_id = Some(id).filter(|id| !id.trim().is_empty());
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    form.file = Some(Attachment {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    form.message = message
        .filter(|m| !m.trim().is_empty())
        .ok_or(RelayError::MissingMessage)?;
    Ok(form)
}

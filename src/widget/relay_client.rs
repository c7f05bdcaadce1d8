use super::RelayClient;
use crate::commands::chat::{AssistResponse, ErrorBody};
use crate::llm::{AssistError, Attachment};
use async_trait::async_trait;
use reqwest::{multipart, Client};

/// Posts chat turns to a running relay endpoint as multipart forms.
#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    endpoint: String,
    client: Client,
}

impl HttpRelayClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn send(
        &self,
        message: &str,
        thread_id: Option<&str>,
        file: Option<&Attachment>,
    ) -> Result<AssistResponse, AssistError> {
        let mut form = multipart::Form::new().text("message", message.to_string());
        if let Some(thread_id) = thread_id {
            form = form.text("threadId", thread_id.to_string());
        }
        if let Some(file) = file {
            let mut part =
                multipart::Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
            if let Some(content_type) = &file.content_type {
                part = part.mime_str(content_type)?;
            }
            form = form.part("file", part);
        }

        let resp = self.client.post(&self.endpoint).multipart(form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(AssistError::Api { status, message });
        }

        Ok(resp.json().await?)
    }
}

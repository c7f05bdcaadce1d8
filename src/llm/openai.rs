use super::{AssistError, AssistantApi, Attachment, Run, ThreadMessage};
use async_trait::async_trait;
use reqwest::{multipart, Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const BETA_HEADER: &str = "assistants=v2";
const FILE_PURPOSE: &str = "assistants";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

/// REST client for the OpenAI Assistants v2 API.
#[derive(Debug, Clone)]
pub struct OpenAiAssistants {
    config: OpenAiConfig,
    client: Client,
}

#[derive(Serialize)]
struct EmptyBody {}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    role: &'static str,
    content: Vec<TextPart<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<MessageAttachment<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
struct MessageAttachment<'a> {
    file_id: &'a str,
    tools: Vec<ToolTag>,
}

#[derive(Serialize)]
struct ToolTag {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

impl OpenAiAssistants {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AssistError> {
        if self.config.api_key.trim().is_empty() {
            return Err(AssistError::Configuration(
                "OpenAI API key not configured".into(),
            ));
        }
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        Ok(self
            .client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("OpenAI-Beta", BETA_HEADER))
    }

    async fn send(req: RequestBuilder) -> Result<Response, AssistError> {
        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(AssistError::Api {
                status,
                message: text,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistants {
    async fn create_thread(&self) -> Result<String, AssistError> {
        let req = self.request(Method::POST, "/threads")?.json(&EmptyBody {});
        let thread: IdResponse = Self::send(req).await?.json().await?;
        Ok(thread.id)
    }

    async fn upload_file(&self, attachment: &Attachment) -> Result<String, AssistError> {
        let mut part = multipart::Part::bytes(attachment.bytes.clone())
            .file_name(attachment.file_name.clone());
        if let Some(content_type) = &attachment.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = multipart::Form::new()
            .text("purpose", FILE_PURPOSE)
            .part("file", part);

        let req = self.request(Method::POST, "/files")?.multipart(form);
        let file: IdResponse = Self::send(req).await?.json().await?;
        Ok(file.id)
    }

    async fn create_message(
        &self,
        thread_id: &str,
        text: &str,
        file_id: Option<&str>,
    ) -> Result<(), AssistError> {
        let body = CreateMessageRequest {
            role: "user",
            content: vec![TextPart { kind: "text", text }],
            attachments: file_id
                .map(|file_id| MessageAttachment {
                    file_id,
                    tools: vec![ToolTag {
                        kind: "file_search",
                    }],
                })
                .into_iter()
                .collect(),
        };

        let req = self
            .request(Method::POST, &format!("/threads/{thread_id}/messages"))?
            .json(&body);
        Self::send(req).await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, AssistError> {
        let req = self
            .request(Method::POST, &format!("/threads/{thread_id}/runs"))?
            .json(&CreateRunRequest { assistant_id });
        Ok(Self::send(req).await?.json().await?)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistError> {
        let req = self.request(Method::GET, &format!("/threads/{thread_id}/runs/{run_id}"))?;
        Ok(Self::send(req).await?.json().await?)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistError> {
        let req = self.request(Method::GET, &format!("/threads/{thread_id}/messages"))?;
        let list: MessageList = Self::send(req).await?.json().await?;
        Ok(list.data)
    }
}

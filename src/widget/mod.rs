//! Headless chat widget: transcript, persisted thread id and per-turn state.

pub mod relay_client;

use crate::commands::chat::AssistResponse;
use crate::db::models::ChatMessage;
use crate::db::{Database, THREAD_ID_KEY};
use crate::llm::{AssistError, Attachment};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CONFIG_MISSING_MESSAGE: &str =
    "Chatbot is niet geconfigureerd. Voeg je OpenAI API key en Assistant ID toe aan .env.local";
pub const FALLBACK_MESSAGE: &str =
    "Er is een fout opgetreden bij het versturen van je bericht. Probeer het opnieuw.";
pub const FILE_REJECTED_NOTICE: &str = "Alleen PDF, DOCX, MD en TXT bestanden zijn toegestaan.";

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "md", "txt"];

pub fn is_allowed_attachment(file: &Attachment) -> bool {
    file.extension()
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

pub fn upload_message(file_name: &str) -> String {
    format!("Bestand geüpload: {file_name}")
}

/// The widget's only way out to the network.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn send(
        &self,
        message: &str,
        thread_id: Option<&str>,
        file: Option<&Attachment>,
    ) -> Result<AssistResponse, AssistError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingReply,
    /// The last turn failed. Cleared by the next submit.
    ErrorShown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied(ChatMessage),
    /// The relay call failed; the fallback notice was appended.
    Failed(ChatMessage),
    NotConfigured(ChatMessage),
    /// Attachment refused before any network call.
    Rejected(&'static str),
    /// A reply is still outstanding; the input was dropped.
    Busy,
    /// Blank input, nothing happened.
    Ignored,
}

pub struct ChatWidget<R> {
    relay: R,
    storage: Arc<Database>,
    enabled: bool,
    thread_id: Option<String>,
    transcript: Vec<ChatMessage>,
    state: TurnState,
}

impl<R: RelayClient> ChatWidget<R> {
    /// `enabled` is false when the assistant is not configured; the widget
    /// then answers every submit locally.
    pub fn new(relay: R, storage: Arc<Database>, enabled: bool) -> Self {
        let thread_id = storage
            .get_item(THREAD_ID_KEY)
            .unwrap_or_else(|err| {
                warn!("Could not read stored thread id: {err}");
                None
            })
            .filter(|id| !id.is_empty());
        let transcript = storage.get_messages().unwrap_or_else(|err| {
            warn!("Could not load transcript: {err}");
            Vec::new()
        });

        Self {
            relay,
            storage,
            enabled,
            thread_id,
            transcript,
            state: TurnState::Idle,
        }
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn submit(&mut self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Ignored;
        }
        self.send(text.to_string(), None).await
    }

    pub async fn attach(&mut self, file: Attachment) -> TurnOutcome {
        if !is_allowed_attachment(&file) {
            debug!("Rejected attachment {}", file.file_name);
            return TurnOutcome::Rejected(FILE_REJECTED_NOTICE);
        }
        let text = upload_message(&file.file_name);
        self.send(text, Some(file)).await
    }

    async fn send(&mut self, content: String, file: Option<Attachment>) -> TurnOutcome {
        if self.state == TurnState::AwaitingReply {
            return TurnOutcome::Busy;
        }
        if !self.enabled {
            let notice = ChatMessage::notice(CONFIG_MISSING_MESSAGE);
            self.push(notice.clone());
            return TurnOutcome::NotConfigured(notice);
        }

        self.push(ChatMessage::user(content.as_str()));
        self.state = TurnState::AwaitingReply;

        let result = self
            .relay
            .send(&content, self.thread_id.as_deref(), file.as_ref())
            .await;

        match result {
            Ok(reply) => {
                if self.thread_id.is_none() && !reply.thread_id.is_empty() {
                    self.remember_thread(reply.thread_id);
                }
                let message = if reply.message_id.is_empty() {
                    ChatMessage::notice(reply.content)
                } else {
                    ChatMessage::assistant(reply.message_id, reply.content)
                };
                self.push(message.clone());
                self.state = TurnState::Idle;
                TurnOutcome::Replied(message)
            }
            Err(err) => {
                warn!("Error sending message: {err}");
                let notice = ChatMessage::notice(FALLBACK_MESSAGE);
                self.push(notice.clone());
                self.state = TurnState::ErrorShown;
                TurnOutcome::Failed(notice)
            }
        }
    }

    /// Start over: forget the thread and the stored transcript.
    pub fn reset(&mut self) {
        if let Err(err) = self.storage.remove_item(THREAD_ID_KEY) {
            warn!("Could not clear stored thread id: {err}");
        }
        if let Err(err) = self.storage.clear_messages() {
            warn!("Could not clear transcript: {err}");
        }
        self.thread_id = None;
        self.transcript.clear();
        self.state = TurnState::Idle;
    }

    fn remember_thread(&mut self, thread_id: String) {
        if let Err(err) = self.storage.set_item(THREAD_ID_KEY, &thread_id) {
            warn!("Could not persist thread id: {err}");
        }
        self.thread_id = Some(thread_id);
    }

    fn push(&mut self, message: ChatMessage) {
        if let Err(err) = self.storage.append_message(&message) {
            warn!("Could not persist chat message: {err}");
        }
        self.transcript.push(message);
    }
}

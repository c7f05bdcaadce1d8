//! Orchestration of one assistant turn: thread, message, run, poll, reply.

use super::{AssistError, AssistantApi, Attachment, RunStatus, ThreadMessage};
use std::time::Duration;
use tracing::{debug, info};

/// How `await_completion` waits for a run to leave the pending states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the service reports a terminal status.
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_polls: Some(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub message_id: String,
    pub content: String,
}

/// Result of a full turn through `Assistant::converse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub thread_id: String,
    pub message_id: String,
    pub content: String,
}

pub struct Assistant<A> {
    api: A,
    assistant_id: String,
    poll: PollPolicy,
}

impl<A: AssistantApi> Assistant<A> {
    pub fn new(api: A, assistant_id: impl Into<String>) -> Self {
        Self {
            api,
            assistant_id: assistant_id.into(),
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Returns `existing` as given when it is not blank, otherwise opens a new thread.
    pub async fn ensure_session(&self, existing: Option<&str>) -> Result<String, AssistError> {
        match existing.filter(|id| !id.trim().is_empty()) {
            Some(id) => Ok(id.to_string()),
            None => {
                let id = self.api.create_thread().await?;
                info!("Created assistant thread {id}");
                Ok(id)
            }
        }
    }

    pub async fn submit_message(
        &self,
        thread_id: &str,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<(), AssistError> {
        let file_id = match attachment {
            Some(file) => {
                let file_id = self.api.upload_file(file).await?;
                debug!("Uploaded {} as {file_id}", file.file_name);
                Some(file_id)
            }
            None => None,
        };
        self.api
            .create_message(thread_id, text, file_id.as_deref())
            .await
    }

    fn assistant_id(&self) -> Result<&str, AssistError> {
        let id = self.assistant_id.trim();
        if id.is_empty() {
            return Err(AssistError::Configuration(
                "Assistant ID not configured".into(),
            ));
        }
        Ok(id)
    }

    pub async fn start_run(&self, thread_id: &str) -> Result<String, AssistError> {
        let run = self.api.create_run(thread_id, self.assistant_id()?).await?;
        debug!("Started run {} on {thread_id} ({:?})", run.id, run.status);
        Ok(run.id)
    }

    /// Sleeps one interval before every status check, so a run created as
    /// `queued` that then reports `in_progress`, `completed` costs two polls.
    pub async fn await_completion(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunStatus, AssistError> {
        let mut polls = 0u32;
        loop {
            if let Some(max) = self.poll.max_polls {
                if polls >= max {
                    return Err(AssistError::Timeout {
                        run_id: run_id.to_string(),
                        polls,
                    });
                }
            }
            tokio::time::sleep(self.poll.interval).await;
            polls += 1;

            let status = self.api.retrieve_run(thread_id, run_id).await?.status;
            debug!("Run {run_id} poll #{polls}: {status:?}");

            if status.is_pending() {
                continue;
            }
            if status.is_failure() {
                return Err(AssistError::RunFailed {
                    run_id: run_id.to_string(),
                    status,
                });
            }
            return Ok(status);
        }
    }

    pub async fn fetch_latest_reply(&self, thread_id: &str) -> Result<AssistantReply, AssistError> {
        let messages = self.api.list_messages(thread_id).await?;
        let latest = latest_assistant_message(&messages)
            .ok_or_else(|| AssistError::NotFound("No assistant response found".into()))?;
        let content = latest.text().ok_or_else(|| {
            AssistError::NotFound(format!("Assistant message {} has no text", latest.id))
        })?;

        Ok(AssistantReply {
            message_id: latest.id.clone(),
            content: content.to_string(),
        })
    }

    pub async fn converse(
        &self,
        thread_id: Option<&str>,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<Conversation, AssistError> {
        self.assistant_id()?;
        let thread_id = self.ensure_session(thread_id).await?;
        self.submit_message(&thread_id, text, attachment).await?;
        let run_id = self.start_run(&thread_id).await?;
        self.await_completion(&thread_id, &run_id).await?;
        let reply = self.fetch_latest_reply(&thread_id).await?;

        Ok(Conversation {
            thread_id,
            message_id: reply.message_id,
            content: reply.content,
        })
    }
}

/// Newest assistant-authored message. On equal `created_at` the one listed
/// first wins.
pub fn latest_assistant_message(messages: &[ThreadMessage]) -> Option<&ThreadMessage> {
    messages
        .iter()
        .filter(|m| m.is_assistant())
        .fold(None, |best: Option<&ThreadMessage>, m| match best {
            Some(b) if b.created_at >= m.created_at => Some(b),
            _ => Some(m),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MessageContent, Run, TextValue};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn msg(id: &str, role: &str, created_at: i64, text: &str) -> ThreadMessage {
        ThreadMessage {
            id: id.into(),
            role: role.into(),
            created_at,
            content: vec![MessageContent {
                text: Some(TextValue { value: text.into() }),
            }],
        }
    }

    #[derive(Default)]
    struct ScriptedApi {
        calls: Mutex<Vec<String>>,
        statuses: Mutex<VecDeque<RunStatus>>,
        messages: Vec<ThreadMessage>,
    }

    impl ScriptedApi {
        fn with_statuses(statuses: &[RunStatus]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                messages: vec![
                    msg("msg_u", "user", 10, "Hello"),
                    msg("msg_a", "assistant", 11, "Hi there"),
                ],
                ..Default::default()
            }
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn polls(&self) -> usize {
            self.calls().iter().filter(|c| c.starts_with("retrieve_run")).count()
        }
    }

    #[async_trait]
    impl AssistantApi for ScriptedApi {
        async fn create_thread(&self) -> Result<String, AssistError> {
            self.log("create_thread".into());
            Ok("thread_new".into())
        }

        async fn upload_file(&self, attachment: &Attachment) -> Result<String, AssistError> {
            self.log(format!("upload_file {}", attachment.file_name));
            Ok("file_1".into())
        }

        async fn create_message(
            &self,
            thread_id: &str,
            text: &str,
            file_id: Option<&str>,
        ) -> Result<(), AssistError> {
            self.log(format!("create_message {thread_id} {text} {file_id:?}"));
            Ok(())
        }

        async fn create_run(
            &self,
            thread_id: &str,
            assistant_id: &str,
        ) -> Result<Run, AssistError> {
            self.log(format!("create_run {thread_id} {assistant_id}"));
            Ok(Run {
                id: "run_1".into(),
                status: RunStatus::Queued,
            })
        }

        async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistError> {
            self.log(format!("retrieve_run {thread_id} {run_id}"));
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(RunStatus::InProgress);
            Ok(Run {
                id: run_id.into(),
                status,
            })
        }

        async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistError> {
            self.log(format!("list_messages {thread_id}"));
            Ok(self.messages.clone())
        }
    }

    #[tokio::test]
    async fn test_existing_session_is_reused() {
        let assistant = Assistant::new(ScriptedApi::default(), "asst_1");
        let id = assistant.ensure_session(Some("thread_old")).await.unwrap();
        assert_eq!(id, "thread_old");
        assert!(assistant.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_session_id_is_returned_verbatim() {
        let assistant = Assistant::new(ScriptedApi::default(), "asst_1");
        let id = assistant.ensure_session(Some(" thread_old ")).await.unwrap();
        assert_eq!(id, " thread_old ");
        assert!(assistant.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_session_id_creates_thread() {
        let assistant = Assistant::new(ScriptedApi::default(), "asst_1");
        let id = assistant.ensure_session(Some("  ")).await.unwrap();
        assert_eq!(id, "thread_new");
        assert_eq!(assistant.api().calls(), vec!["create_thread"]);
    }

    #[tokio::test]
    async fn test_attachment_is_uploaded_before_message() {
        let assistant = Assistant::new(ScriptedApi::default(), "asst_1");
        let file = Attachment::new("cv.pdf", b"%PDF".to_vec());
        assistant
            .submit_message("thread_1", "see file", Some(&file))
            .await
            .unwrap();
        assert_eq!(
            assistant.api().calls(),
            vec![
                "upload_file cv.pdf",
                "create_message thread_1 see file Some(\"file_1\")",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_assistant_id_is_configuration_error() {
        let assistant = Assistant::new(ScriptedApi::default(), "");
        let err = assistant.start_run("thread_1").await.unwrap_err();
        assert!(matches!(err, AssistError::Configuration(_)));
        assert!(assistant.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_converse_without_assistant_id_touches_nothing() {
        let assistant = Assistant::new(ScriptedApi::default(), " ");
        let err = assistant.converse(None, "Hello", None).await.unwrap_err();
        assert!(matches!(err, AssistError::Configuration(_)));
        assert!(assistant.api().calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_polls_at_one_second_cadence() {
        let assistant = Assistant::new(
            ScriptedApi::with_statuses(&[RunStatus::InProgress, RunStatus::Completed]),
            "asst_1",
        );
        let start = tokio::time::Instant::now();
        let status = assistant.await_completion("thread_1", "run_1").await.unwrap();

        assert_eq!(status, RunStatus::Completed);
        assert_eq!(assistant.api().polls(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_is_upstream_error() {
        let assistant = Assistant::new(
            ScriptedApi::with_statuses(&[RunStatus::Queued, RunStatus::Failed]),
            "asst_1",
        );
        let err = assistant.await_completion("thread_1", "run_1").await.unwrap_err();
        assert!(matches!(
            err,
            AssistError::RunFailed {
                status: RunStatus::Failed,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_bound_times_out() {
        let assistant = Assistant::new(ScriptedApi::default(), "asst_1").with_poll_policy(
            PollPolicy {
                interval: Duration::from_secs(1),
                max_polls: Some(5),
            },
        );
        let err = assistant.await_completion("thread_1", "run_1").await.unwrap_err();
        assert!(matches!(err, AssistError::Timeout { polls: 5, .. }));
        assert_eq!(assistant.api().polls(), 5);
    }

    #[tokio::test]
    async fn test_no_assistant_message_is_not_found() {
        let api = ScriptedApi {
            messages: vec![msg("msg_u", "user", 10, "Hello")],
            ..Default::default()
        };
        let assistant = Assistant::new(api, "asst_1");
        let err = assistant.fetch_latest_reply("thread_1").await.unwrap_err();
        assert!(matches!(err, AssistError::NotFound(_)));
    }

    #[test]
    fn test_latest_assistant_message_picks_max_timestamp() {
        let messages = vec![
            msg("a1", "assistant", 5, "old"),
            msg("u1", "user", 50, "newest but user"),
            msg("a2", "assistant", 20, "new"),
            msg("a3", "assistant", 7, "middle"),
        ];
        assert_eq!(latest_assistant_message(&messages).unwrap().id, "a2");
    }

    #[test]
    fn test_latest_assistant_message_tie_keeps_listing_order() {
        let messages = vec![
            msg("first", "assistant", 20, "one"),
            msg("second", "assistant", 20, "two"),
        ];
        assert_eq!(latest_assistant_message(&messages).unwrap().id, "first");
    }

    #[tokio::test(start_paused = true)]
    async fn test_converse_runs_steps_in_order() {
        let assistant = Assistant::new(
            ScriptedApi::with_statuses(&[RunStatus::InProgress, RunStatus::Completed]),
            "asst_1",
        );
        let conversation = assistant.converse(None, "Hello", None).await.unwrap();

        assert_eq!(
            conversation,
            Conversation {
                thread_id: "thread_new".into(),
                message_id: "msg_a".into(),
                content: "Hi there".into(),
            }
        );
        assert_eq!(
            assistant.api().calls(),
            vec![
                "create_thread",
                "create_message thread_new Hello None",
                "create_run thread_new asst_1",
                "retrieve_run thread_new run_1",
                "retrieve_run thread_new run_1",
                "list_messages thread_new",
            ]
        );
    }
}

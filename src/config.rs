use crate::db::Database;
use crate::llm::assistant::PollPolicy;
use crate::llm::openai::{OpenAiConfig, DEFAULT_BASE_URL};
use crate::llm::AssistError;
use std::time::Duration;
use tracing::warn;

pub const API_KEY_SETTING: &str = "openai_api_key";
pub const ASSISTANT_ID_SETTING: &str = "assistant_id";
pub const BASE_URL_SETTING: &str = "openai_base_url";

/// Upstream credentials. The feature is only enabled when both are present.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub assistant_id: String,
    pub base_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &mask_secret(&self.api_key))
            .field("assistant_id", &self.assistant_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Credentials {
    pub fn from_parts(
        api_key: Option<String>,
        assistant_id: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, AssistError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match (present(api_key), present(assistant_id)) {
            (Some(api_key), Some(assistant_id)) => Ok(Self {
                api_key,
                assistant_id,
                base_url: present(base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            }),
            _ => Err(AssistError::Configuration(
                "OpenAI API key or Assistant ID not configured".into(),
            )),
        }
    }

    /// Explicit values (CLI flags or environment) win; anything missing falls
    /// back to the persisted settings table.
    pub fn resolve(
        api_key: Option<String>,
        assistant_id: Option<String>,
        base_url: Option<String>,
        db: &Database,
    ) -> Result<Self, AssistError> {
        let stored = |key: &str| {
            db.get_setting(key).unwrap_or_else(|err| {
                warn!("Could not read setting {key}: {err}");
                None
            })
        };
        Self::from_parts(
            api_key.or_else(|| stored(API_KEY_SETTING)),
            assistant_id.or_else(|| stored(ASSISTANT_ID_SETTING)),
            base_url.or_else(|| stored(BASE_URL_SETTING)),
        )
    }

    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

/// `max_polls == 0` means no bound.
pub fn poll_policy(interval_ms: u64, max_polls: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(interval_ms),
        max_polls: (max_polls > 0).then_some(max_polls),
    }
}

/// Keeps the first and last four characters of longer secrets.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "*".repeat(chars.len())
    }
}

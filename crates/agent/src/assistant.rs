// Chat-completion assistant client
//
// One POST per question, no retry. The CLI shows a single generic notification when
// the assistant fails; the error itself is only logged.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::notify::Notification;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid assistant reply: {0}")]
    Decode(String),
}

impl AssistantError {
    /// The one notification the agent sees for any assistant failure
    pub fn notification(&self) -> Notification {
        Notification::warning("Assistant unavailable", "Try again in a moment")
    }
}

/// Who is asking; shapes the assistant's answer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Agent,
    Supervisor,
    Admin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Request body
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Free-form context, usually the current session snapshot
    pub context: serde_json::Value,
    pub user_role: UserRole,
    pub conversation_history: Vec<ChatMessage>,
}

impl AssistantRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            system_prompt: None,
            context: serde_json::Value::Null,
            user_role: UserRole::default(),
            conversation_history: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.user_role = role;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.conversation_history = history;
        self
    }
}

/// Kind of answer the assistant produced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    Text,
    Suggestion,
    Analysis,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantReply {
    pub response: String,
    #[serde(rename = "type")]
    pub kind: ReplyKind,
}

pub struct AssistantClient {
    url: String,
    http: reqwest::Client,
}

impl AssistantClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AssistantError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    #[instrument(skip(self, request), fields(role = ?request.user_role))]
    pub async fn ask(&self, request: &AssistantRequest) -> Result<AssistantReply, AssistantError> {
        let response = self.http.post(&self.url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                message,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Err(AssistantError::Decode("empty body".to_string()));
        }

        let body = response.text().await?;
        let reply: AssistantReply =
            serde_json::from_str(&body).map_err(|e| AssistantError::Decode(e.to_string()))?;
        debug!(kind = ?reply.kind, "assistant replied");
        Ok(reply)
    }
}

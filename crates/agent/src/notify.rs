// Transient user-facing notifications
//
// Every action outcome that the agent should see is published as a Notification on
// the reconciler's broadcast channel. Presentation decides how to render them.

use chrono::{DateTime, Utc};
use leadline_core::{ActionKind, ControlError};
use serde::{Deserialize, Serialize};

/// Severity of a notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Info => write!(f, "info"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub message: String,
    /// Action that produced the notification, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: Level, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            action: None,
            at: Utc::now(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Warning, title, message)
    }

    /// Error notification for a failed action
    pub fn from_error(action: ActionKind, err: &ControlError) -> Self {
        Self::new(Level::Error, err.title(), err.to_string()).with_action(action)
    }

    pub fn with_action(mut self, action: ActionKind) -> Self {
        self.action = Some(action);
        self
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.title, self.message)
    }
}

// Error types for control-API operations
//
// The taxonomy mirrors how failures reach the agent:
// - Configuration / Validation / NotConnected / Busy are raised locally, before any request
// - Transport covers everything where no classified reply was obtained
// - Protocol carries the platform's own message from an ERROR: or unrecognized reply

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::record::RecordKind;
use crate::session::ActionKind;

/// Result type alias for control-API operations
pub type Result<T> = std::result::Result<T, ControlError>;

/// Failures where no reply text was obtained from the platform
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, DNS, TLS or body-read failure
    #[error("request failed: {0}")]
    Request(String),

    /// Non-2xx HTTP status
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    /// No reply within the per-call timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Record store failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {kind}/{id}")]
    NotFound { kind: RecordKind, id: Uuid },

    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by agent actions and control-API calls
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    /// Required endpoint or credentials missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure or timeout
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The platform replied, but not with a success
    #[error("Platform rejected {function}: {message}")]
    Protocol { function: String, message: String },

    /// Local precondition violated
    #[error("Validation error: {0}")]
    Validation(String),

    /// The connectivity gate refused the action
    #[error("Not connected to the call-center platform")]
    NotConnected,

    /// Another action is outstanding for this session
    #[error("A {0} request is already in progress")]
    Busy(ActionKind),

    /// Record store collaborator failed
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}

impl ControlError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ControlError::Configuration(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        ControlError::Validation(msg.into())
    }

    /// Create a protocol error for a remote function
    pub fn protocol(function: impl Into<String>, message: impl Into<String>) -> Self {
        ControlError::Protocol {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised without touching the network
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ControlError::Configuration(_)
                | ControlError::Validation(_)
                | ControlError::NotConnected
                | ControlError::Busy(_)
        )
    }

    /// Whether this is a transport-level failure (including timeouts)
    pub fn is_transport(&self) -> bool {
        matches!(self, ControlError::Transport(_))
    }

    /// Short user-facing title for notifications
    pub fn title(&self) -> &'static str {
        match self {
            ControlError::Configuration(_) => "Not configured",
            ControlError::Transport(TransportError::Timeout(_)) => "Request timed out",
            ControlError::Transport(_) => "Connection problem",
            ControlError::Protocol { .. } => "Platform error",
            ControlError::Validation(_) => "Cannot do that now",
            ControlError::NotConnected => "Offline",
            ControlError::Busy(_) => "Please wait",
            ControlError::Store(_) => "Record not saved",
        }
    }
}

// Session domain types
//
// These types describe what this client believes about the agent and the current call.
// They are a best-effort mirror of the platform's state, updated only after the
// platform accepted an action.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent status on the platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    LoggedOut,
    Ready,
    Paused,
    OnCall,
    WrapUp,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::LoggedOut => write!(f, "logged_out"),
            AgentStatus::Ready => write!(f, "ready"),
            AgentStatus::Paused => write!(f, "paused"),
            AgentStatus::OnCall => write!(f, "on_call"),
            AgentStatus::WrapUp => write!(f, "wrap_up"),
        }
    }
}

/// Status of the current call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    Idle,
    Ringing,
    Connected,
    Paused,
    Ended,
}

impl CallStatus {
    /// Ringing, connected or paused - a call the agent can hang up
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            CallStatus::Ringing | CallStatus::Connected | CallStatus::Paused
        )
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Idle => write!(f, "idle"),
            CallStatus::Ringing => write!(f, "ringing"),
            CallStatus::Connected => write!(f, "connected"),
            CallStatus::Paused => write!(f, "paused"),
            CallStatus::Ended => write!(f, "ended"),
        }
    }
}

/// How a call status was reached
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusConfidence {
    /// Backed by a platform reply or an explicit connect signal
    #[default]
    Confirmed,
    /// Guessed by the connect fallback timer
    Heuristic,
}

/// Action classes; at most one request per class is in flight
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Login,
    Logout,
    Dial,
    Hangup,
    Pause,
    Disposition,
    Recording,
    Lead,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Login => write!(f, "login"),
            ActionKind::Logout => write!(f, "logout"),
            ActionKind::Dial => write!(f, "dial"),
            ActionKind::Hangup => write!(f, "hangup"),
            ActionKind::Pause => write!(f, "pause"),
            ActionKind::Disposition => write!(f, "disposition"),
            ActionKind::Recording => write!(f, "recording"),
            ActionKind::Lead => write!(f, "lead"),
        }
    }
}

/// Local belief about the agent's login state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSession {
    pub logged_in: bool,
    pub status: AgentStatus,
    pub campaign: Option<String>,
    pub phone_device_id: Option<String>,
    pub last_activity_at: DateTime<Utc>,
}

impl AgentSession {
    pub fn logged_out(now: DateTime<Utc>) -> Self {
        Self {
            logged_in: false,
            status: AgentStatus::LoggedOut,
            campaign: None,
            phone_device_id: None,
            last_activity_at: now,
        }
    }
}

/// Local belief about the current call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallSession {
    pub active: bool,
    pub status: CallStatus,
    pub confidence: StatusConfidence,
    pub phone_number: Option<String>,
    pub lead_id: Option<String>,
    pub lead_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
    pub is_recording: bool,
}

impl Default for CallSession {
    fn default() -> Self {
        Self::idle()
    }
}

impl CallSession {
    pub fn idle() -> Self {
        Self {
            active: false,
            status: CallStatus::Idle,
            confidence: StatusConfidence::Confirmed,
            phone_number: None,
            lead_id: None,
            lead_name: None,
            started_at: None,
            duration_seconds: 0,
            is_recording: false,
        }
    }
}

/// Local display aggregates, not an authoritative ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionMetrics {
    pub conversions: u32,
    pub talk_time_seconds: u64,
    pub calls_handled: u32,
}

/// Reachability of the platform as last observed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Connectivity {
    /// No check has completed yet
    #[default]
    Unknown,
    Connected,
    Disconnected(String),
}

impl Connectivity {
    pub fn is_connected(&self) -> bool {
        matches!(self, Connectivity::Connected)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Unknown => write!(f, "unknown"),
            Connectivity::Connected => write!(f, "connected"),
            Connectivity::Disconnected(reason) => write!(f, "disconnected ({})", reason),
        }
    }
}

/// Read-only copy of everything the presentation layer shows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub agent: AgentSession,
    pub call: CallSession,
    pub metrics: SessionMetrics,
    pub connectivity: Connectivity,
}

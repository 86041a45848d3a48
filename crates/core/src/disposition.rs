// Disposition taxonomy
//
// One canonical list of outcome codes. Each code knows its wire value, whether it
// needs a scheduled callback, and whether it counts as a conversion.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Outcome an agent assigns to a finished call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum DispositionCode {
    Sale,
    Callback,
    NotInterested,
    NoAnswer,
    Busy,
    AnsweringMachine,
    DoNotCall,
    WrongNumber,
    Disconnected,
    Transferred,
}

impl DispositionCode {
    pub const ALL: [DispositionCode; 10] = [
        DispositionCode::Sale,
        DispositionCode::Callback,
        DispositionCode::NotInterested,
        DispositionCode::NoAnswer,
        DispositionCode::Busy,
        DispositionCode::AnsweringMachine,
        DispositionCode::DoNotCall,
        DispositionCode::WrongNumber,
        DispositionCode::Disconnected,
        DispositionCode::Transferred,
    ];

    /// Status value sent to the platform
    pub fn wire(&self) -> &'static str {
        match self {
            DispositionCode::Sale => "SALE",
            DispositionCode::Callback => "CALLBK",
            DispositionCode::NotInterested => "NI",
            DispositionCode::NoAnswer => "NA",
            DispositionCode::Busy => "B",
            DispositionCode::AnsweringMachine => "A",
            DispositionCode::DoNotCall => "DNC",
            DispositionCode::WrongNumber => "WN",
            DispositionCode::Disconnected => "DC",
            DispositionCode::Transferred => "XFER",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DispositionCode::Sale => "Sale",
            DispositionCode::Callback => "Call back",
            DispositionCode::NotInterested => "Not interested",
            DispositionCode::NoAnswer => "No answer",
            DispositionCode::Busy => "Busy",
            DispositionCode::AnsweringMachine => "Answering machine",
            DispositionCode::DoNotCall => "Do not call",
            DispositionCode::WrongNumber => "Wrong number",
            DispositionCode::Disconnected => "Disconnected number",
            DispositionCode::Transferred => "Transferred",
        }
    }

    pub fn requires_callback(&self) -> bool {
        matches!(self, DispositionCode::Callback)
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, DispositionCode::Sale)
    }
}

impl fmt::Display for DispositionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire())
    }
}

impl FromStr for DispositionCode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        DispositionCode::ALL
            .into_iter()
            .find(|code| code.wire().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ControlError::validation(format!("unknown disposition code '{}'", wanted)))
    }
}

impl TryFrom<String> for DispositionCode {
    type Error = ControlError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DispositionCode> for String {
    fn from(code: DispositionCode) -> Self {
        code.wire().to_string()
    }
}

/// Who may work a scheduled callback
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallbackScope {
    #[default]
    AgentOnly,
    Anyone,
}

impl CallbackScope {
    pub fn wire(&self) -> &'static str {
        match self {
            CallbackScope::AgentOnly => "USERONLY",
            CallbackScope::Anyone => "ANYONE",
        }
    }
}

/// Follow-up attached to a callback disposition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackSchedule {
    pub at: DateTime<Utc>,
    pub note: String,
    #[serde(default)]
    pub scope: CallbackScope,
}

impl CallbackSchedule {
    pub fn new(at: DateTime<Utc>, note: impl Into<String>) -> Self {
        Self {
            at,
            note: note.into(),
            scope: CallbackScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: CallbackScope) -> Self {
        self.scope = scope;
        self
    }

    /// Format expected by the platform's callback_datetime parameter
    pub fn wire_datetime(&self) -> String {
        self.at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Outcome and notes for a finished call, relayed to the platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispositionRecord {
    pub outcome: DispositionCode,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackSchedule>,
}

impl DispositionRecord {
    pub fn new(outcome: DispositionCode) -> Self {
        Self {
            outcome,
            notes: String::new(),
            callback: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_callback(mut self, callback: CallbackSchedule) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Check the record before anything is sent
    ///
    /// Callback outcomes need a schedule strictly in the future with a non-empty note.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if !self.outcome.requires_callback() {
            return Ok(());
        }
        let callback = self.callback.as_ref().ok_or_else(|| {
            ControlError::validation(format!(
                "{} requires a callback time and note",
                self.outcome.label()
            ))
        })?;
        if callback.at <= now {
            return Err(ControlError::validation(
                "callback time must be in the future",
            ));
        }
        if callback.note.trim().is_empty() {
            return Err(ControlError::validation("callback note must not be empty"));
        }
        Ok(())
    }
}

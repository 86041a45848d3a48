// Reply grammar of the call-center control API
//
// Every reply is free text. Action functions answer with a single line that starts
// with SUCCESS:, NOTICE: or ERROR:, sometimes followed by " - " and a pipe-delimited
// payload. Lookup/export functions answer with bare pipe-delimited rows, one per line.
//
// This module is the only place that looks at those prefixes.

use serde::Serialize;

use crate::error::{ControlError, Result};

pub const SUCCESS_MARKER: &str = "SUCCESS:";
pub const NOTICE_MARKER: &str = "NOTICE:";
pub const ERROR_MARKER: &str = "ERROR:";

/// Separator between the human-readable message and the data payload
pub const PAYLOAD_SEPARATOR: &str = " - ";

/// Field delimiter inside a payload or a table row
pub const FIELD_DELIMITER: char = '|';

/// Error message used when the platform answered with nothing
pub const EMPTY_RESPONSE: &str = "empty response";

/// A reply parsed into its grammatical shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    /// `SUCCESS:` followed by the trimmed payload
    Success(&'a str),
    /// `NOTICE:` followed by the trimmed payload
    Notice(&'a str),
    /// `ERROR:` followed by the trimmed message
    Error(&'a str),
    /// Non-empty text without a known marker
    Malformed(&'a str),
    /// Nothing but whitespace
    Empty,
}

impl<'a> Reply<'a> {
    /// Parse raw reply text
    pub fn parse(raw: &'a str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            return Reply::Empty;
        }
        if let Some(rest) = text.strip_prefix(SUCCESS_MARKER) {
            return Reply::Success(rest.trim());
        }
        if let Some(rest) = text.strip_prefix(NOTICE_MARKER) {
            return Reply::Notice(rest.trim());
        }
        if let Some(rest) = text.strip_prefix(ERROR_MARKER) {
            return Reply::Error(rest.trim());
        }
        Reply::Malformed(text)
    }

    /// SUCCESS and NOTICE both count as the platform accepting the call
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_) | Reply::Notice(_))
    }
}

/// Normalized outcome of one call to the control API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteCallResult {
    pub succeeded: bool,
    pub raw_text: String,
    pub error_message: Option<String>,
    /// Pipe-delimited payload of the first line
    pub fields: Vec<String>,
    pub first_field: Option<String>,
    /// Every data row of a multi-line reply
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<Vec<String>>,
}

impl RemoteCallResult {
    /// Classify a single-line action reply
    pub fn classify(raw: &str) -> Self {
        let raw_text = raw.trim().to_string();
        let reply = Reply::parse(raw);

        let (succeeded, error_message, body) = match reply {
            Reply::Success(payload) | Reply::Notice(payload) => (true, None, payload),
            Reply::Error(message) => (false, Some(message.to_string()), message),
            Reply::Malformed(text) => (false, Some(text.to_string()), text),
            Reply::Empty => (false, Some(EMPTY_RESPONSE.to_string()), ""),
        };

        let fields = split_payload(first_line(body));
        Self::assemble(succeeded, raw_text, error_message, fields, Vec::new())
    }

    /// Classify a lookup/export reply made of bare data rows
    ///
    /// An `ERROR:` line or an empty body fails; anything else is data.
    pub fn classify_table(raw: &str) -> Self {
        match Reply::parse(raw) {
            Reply::Error(_) | Reply::Empty => Self::classify(raw),
            Reply::Success(_) | Reply::Notice(_) | Reply::Malformed(_) => {
                let records: Vec<Vec<String>> = raw
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .filter(|line| !Reply::parse(line).is_success())
                    .map(split_row)
                    .collect();
                let fields = records.first().cloned().unwrap_or_default();
                Self::assemble(true, raw.trim().to_string(), None, fields, records)
            }
        }
    }

    fn assemble(
        succeeded: bool,
        raw_text: String,
        error_message: Option<String>,
        fields: Vec<String>,
        records: Vec<Vec<String>>,
    ) -> Self {
        let first_field = fields.first().cloned();
        Self {
            succeeded,
            raw_text,
            error_message,
            fields,
            first_field,
            records,
        }
    }

    /// Field at `index`, if present and non-empty
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields
            .get(index)
            .map(String::as_str)
            .filter(|f| !f.is_empty())
    }

    /// Human-readable part of the reply (before the payload separator)
    pub fn message(&self) -> &str {
        if let Some(error) = &self.error_message {
            return error;
        }
        let body = match Reply::parse(&self.raw_text) {
            Reply::Success(payload) | Reply::Notice(payload) => first_line(payload),
            _ => first_line(&self.raw_text),
        };
        body.split_once(PAYLOAD_SEPARATOR)
            .map(|(message, _)| message)
            .unwrap_or(body)
            .trim()
    }

    /// Turn a failed classification into a protocol error
    pub fn into_result(self, function: &str) -> Result<Self> {
        if self.succeeded {
            Ok(self)
        } else {
            let message = self
                .error_message
                .unwrap_or_else(|| EMPTY_RESPONSE.to_string());
            Err(ControlError::protocol(function, message))
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// Payload after the first " - " separator if any, split on the field delimiter
fn split_payload(body: &str) -> Vec<String> {
    let data = body
        .split_once(PAYLOAD_SEPARATOR)
        .map(|(_, data)| data)
        .unwrap_or(body)
        .trim();
    if data.is_empty() {
        return Vec::new();
    }
    split_row(data)
}

fn split_row(line: &str) -> Vec<String> {
    line.split(FIELD_DELIMITER)
        .map(|field| field.trim().to_string())
        .collect()
}

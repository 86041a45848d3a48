// Lead and record types passed through to collaborators
//
// The platform owns lead data; these types only carry the fields the client
// forwards, and parse the rows lookups return.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::request::Params;

/// Collections in the generic record store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Leads,
    Callbacks,
    Sales,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Leads => write!(f, "leads"),
            RecordKind::Callbacks => write!(f, "callbacks"),
            RecordKind::Sales => write!(f, "sales"),
        }
    }
}

/// A stored record; fields are opaque JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: Uuid,
    pub kind: RecordKind,
    pub fields: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A new lead to add on the platform
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeadDraft {
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_lead_code: Option<String>,
}

impl LeadDraft {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            ..Default::default()
        }
    }

    pub fn to_params(&self) -> Params {
        Params::new()
            .set("phone_number", &self.phone_number)
            .set("phone_code", self.phone_code.clone().unwrap_or_else(|| "1".to_string()))
            .set("list_id", self.list_id.clone())
            .set("first_name", self.first_name.clone())
            .set("last_name", self.last_name.clone())
            .set("address1", self.address1.clone())
            .set("city", self.city.clone())
            .set("state", self.state.clone())
            .set("postal_code", self.postal_code.clone())
            .set("email", self.email.clone())
            .set("comments", self.comments.clone())
            .set("vendor_lead_code", self.vendor_lead_code.clone())
    }
}

/// Changes to an existing lead; only set fields are sent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeadUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl LeadUpdate {
    pub fn to_params(&self) -> Params {
        Params::new()
            .set("phone_number", self.phone_number.clone())
            .set("first_name", self.first_name.clone())
            .set("last_name", self.last_name.clone())
            .set("address1", self.address1.clone())
            .set("city", self.city.clone())
            .set("state", self.state.clone())
            .set("postal_code", self.postal_code.clone())
            .set("email", self.email.clone())
            .set("comments", self.comments.clone())
            .set("status", self.status.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.to_params().is_empty()
    }
}

/// One row of a recording lookup: start|user|recording_id|lead_id|location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recording {
    pub started_at: String,
    pub agent_user: String,
    pub recording_id: String,
    pub lead_id: String,
    pub location: String,
}

impl Recording {
    pub fn from_row(row: &[String]) -> Option<Self> {
        match row {
            [started_at, agent_user, recording_id, lead_id, location, ..] => Some(Self {
                started_at: started_at.clone(),
                agent_user: agent_user.clone(),
                recording_id: recording_id.clone(),
                lead_id: lead_id.clone(),
                location: location.clone(),
            }),
            _ => None,
        }
    }
}

/// One row of the agent stats export; leading columns are agent_user and full_name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentStatsRow {
    pub agent_user: String,
    pub full_name: String,
    pub values: Vec<String>,
}

impl AgentStatsRow {
    pub fn from_row(row: &[String]) -> Option<Self> {
        match row {
            [agent_user, full_name, rest @ ..] => Some(Self {
                agent_user: agent_user.clone(),
                full_name: full_name.clone(),
                values: rest.to_vec(),
            }),
            _ => None,
        }
    }
}

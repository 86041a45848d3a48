// Request building for the control API
//
// Every remote function is a GET with a flat query string. Base parameters
// (source, credentials, agent, output format) come first, then `function`, then the
// call's own parameters in insertion order. Absent values are dropped.

use serde::Serialize;
use url::Url;

use crate::config::ControlConfig;
use crate::error::{ControlError, Result};

/// Value of a single query parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Absent,
}

impl ParamValue {
    /// Wire form, or None when the key must not be sent
    pub fn encode(&self) -> Option<String> {
        match self {
            ParamValue::Text(s) => Some(s.clone()),
            ParamValue::Int(i) => Some(i.to_string()),
            ParamValue::Bool(true) => Some("YES".to_string()),
            ParamValue::Bool(false) => Some("NO".to_string()),
            ParamValue::Absent => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        ParamValue::Text(s.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        ParamValue::Int(i64::from(i))
    }
}

impl From<u32> for ParamValue {
    fn from(i: u32) -> Self {
        ParamValue::Int(i64::from(i))
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Absent)
    }
}

/// Ordered parameters for one remote function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter; setting a key again replaces it in place
    pub fn set(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Parameters that will actually be sent, in order
    pub fn present(&self) -> impl Iterator<Item = (&str, String)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.encode().map(|encoded| (k.as_str(), encoded)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

/// Which control endpoint a function lives on
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Session actions for one logged-in agent
    Agent,
    /// Lead CRUD, lookups, exports, version
    NonAgent,
}

const RESERVED_KEYS: [&str; 6] = ["source", "user", "pass", "agent_user", "stage", "function"];

/// Builds fully qualified request targets
#[derive(Clone)]
pub struct RequestBuilder {
    base_url: Url,
    agent_api_path: String,
    non_agent_api_path: String,
    source: String,
    user: String,
    pass: String,
    agent_user: String,
    output_format: Option<String>,
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("base_url", &self.base_url.as_str())
            .field("source", &self.source)
            .field("user", &self.user)
            .field("agent_user", &self.agent_user)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    /// Create a builder; an unparseable base URL is a configuration error
    pub fn new(config: &ControlConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ControlError::config(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ControlError::config(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self {
            base_url,
            agent_api_path: config.agent_api_path.clone(),
            non_agent_api_path: config.non_agent_api_path.clone(),
            source: config.source.clone(),
            user: config.user.clone(),
            pass: config.pass.clone(),
            agent_user: config.agent_user.clone(),
            output_format: config.output_format.clone(),
        })
    }

    pub fn agent_user(&self) -> &str {
        &self.agent_user
    }

    /// Fixed parameters sent with every request to `endpoint`
    pub fn base_params(&self, endpoint: Endpoint) -> Vec<(&'static str, String)> {
        let mut base = vec![
            ("source", self.source.clone()),
            ("user", self.user.clone()),
            ("pass", self.pass.clone()),
        ];
        match endpoint {
            Endpoint::Agent => base.push(("agent_user", self.agent_user.clone())),
            Endpoint::NonAgent => {
                if let Some(format) = &self.output_format {
                    base.push(("stage", format.clone()));
                }
            }
        }
        base
    }

    /// Build the request target for `function` with `params`
    pub fn build(&self, endpoint: Endpoint, function: &str, params: &Params) -> Url {
        let mut url = self.base_url.clone();
        let path = match endpoint {
            Endpoint::Agent => &self.agent_api_path,
            Endpoint::NonAgent => &self.non_agent_api_path,
        };
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(None);

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in self.base_params(endpoint) {
                query.append_pair(key, &value);
            }
            query.append_pair("function", function);
            for (key, value) in params.present() {
                if RESERVED_KEYS.contains(&key) {
                    tracing::debug!(function, key, "ignoring parameter that shadows a base parameter");
                    continue;
                }
                query.append_pair(key, &value);
            }
        }

        url
    }
}

/// Request target with the password replaced, safe for logs
pub fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "pass" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), value)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn builder() -> RequestBuilder {
        let config = ControlConfig::new("https://dialer.example.com/", "apiuser", "s3cret")
            .with_agent_user("6666");
        RequestBuilder::new(&config).unwrap()
    }

    fn query(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_agent_request() {
        let params = Params::new()
            .set("value", "3001234567")
            .set("phone_code", "1")
            .set("search", true)
            .set("preview", false);
        let url = builder().build(Endpoint::Agent, "external_dial", &params);

        assert_eq!(url.path(), "/agc/api.php");
        assert_eq!(
            query(&url),
            vec![
                ("source".to_string(), "leadline".to_string()),
                ("user".to_string(), "apiuser".to_string()),
                ("pass".to_string(), "s3cret".to_string()),
                ("agent_user".to_string(), "6666".to_string()),
                ("function".to_string(), "external_dial".to_string()),
                ("value".to_string(), "3001234567".to_string()),
                ("phone_code".to_string(), "1".to_string()),
                ("search".to_string(), "YES".to_string()),
                ("preview".to_string(), "NO".to_string()),
            ]
        );
    }

    #[test]
    fn test_non_agent_request_has_output_format() {
        let url = builder().build(Endpoint::NonAgent, "version", &Params::new());
        assert_eq!(url.path(), "/vicidial/non_agent_api.php");
        let pairs: HashMap<_, _> = query(&url).into_iter().collect();
        assert_eq!(pairs.get("stage").map(String::as_str), Some("pipe"));
        assert!(!pairs.contains_key("agent_user"));
    }

    #[test]
    fn test_absent_values_are_dropped() {
        let params = Params::new()
            .set("lead_id", None::<String>)
            .set("value", "LOGOUT")
            .set("comments", ParamValue::Absent)
            .set("list_id", Some(999));
        let url = builder().build(Endpoint::Agent, "logout", &params);
        let pairs = query(&url);

        assert!(pairs.iter().all(|(k, _)| k != "lead_id" && k != "comments"));

        let base: Vec<(String, String)> = builder()
            .base_params(Endpoint::Agent)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let mut expected = base;
        expected.push(("function".into(), "logout".into()));
        expected.push(("value".into(), "LOGOUT".into()));
        expected.push(("list_id".into(), "999".into()));
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_values_are_escaped() {
        let params = Params::new()
            .set("comments", "wants a call & a quote | soon")
            .set("callback_datetime", "2026-03-01 14:30:00");
        let url = builder().build(Endpoint::Agent, "external_status", &params);
        let raw = url.query().unwrap();

        assert!(raw.contains("callback_datetime=2026-03-01+14%3A30%3A00"));
        assert!(!raw.contains(" & "));
        let pairs: HashMap<_, _> = query(&url).into_iter().collect();
        assert_eq!(pairs["comments"], "wants a call & a quote | soon");
    }

    #[test]
    fn test_set_replaces_in_place() {
        let params = Params::new().set("value", "PAUSE").set("focus", true).set("value", "RESUME");
        let present: Vec<_> = params.present().collect();
        assert_eq!(
            present,
            vec![("value", "RESUME".to_string()), ("focus", "YES".to_string())]
        );
    }

    #[test]
    fn test_reserved_keys_cannot_override_base() {
        let params = Params::new().set("user", "mallory").set("value", "1");
        let url = builder().build(Endpoint::Agent, "external_hangup", &params);
        let users: Vec<_> = query(&url).into_iter().filter(|(k, _)| k == "user").collect();
        assert_eq!(users, vec![("user".to_string(), "apiuser".to_string())]);
    }

    #[test]
    fn test_deterministic() {
        let params = Params::new().set("value", "PAUSE");
        let a = builder().build(Endpoint::Agent, "external_pause", &params);
        let b = builder().build(Endpoint::Agent, "external_pause", &params);
        assert_eq!(a, b);
    }

    #[test]
    fn test_base_url_with_prefix_path() {
        let config = ControlConfig::new("http://host:8080/vici", "u", "p");
        let url = RequestBuilder::new(&config)
            .unwrap()
            .build(Endpoint::Agent, "version", &Params::new());
        assert_eq!(url.path(), "/vici/agc/api.php");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ControlConfig::new("not a url", "u", "p");
        let err = RequestBuilder::new(&config).unwrap_err();
        assert!(matches!(err, ControlError::Configuration(_)));
    }

    #[test]
    fn test_redact_hides_password() {
        let url = builder().build(Endpoint::Agent, "version", &Params::new());
        let redacted = redact(&url);
        assert!(!redacted.contains("s3cret"));
        assert!(redacted.contains("pass=***") || redacted.contains("pass=%2A%2A%2A"));
    }
}

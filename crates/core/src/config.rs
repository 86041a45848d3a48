// Control-API configuration
//
// Loaded from environment variables. Missing credentials are reported as a
// configuration error before any request is attempted, so they are never confused
// with a connection failure.

use std::env;
use std::time::Duration;

use crate::error::{ControlError, Result};

pub const DEFAULT_SOURCE: &str = "leadline";
pub const DEFAULT_AGENT_API_PATH: &str = "/agc/api.php";
pub const DEFAULT_NON_AGENT_API_PATH: &str = "/vicidial/non_agent_api.php";
pub const DEFAULT_OUTPUT_FORMAT: &str = "pipe";

/// Configuration for the call-center control API
#[derive(Clone)]
pub struct ControlConfig {
    /// Platform base URL (e.g., https://dialer.example.com)
    pub base_url: String,

    /// API user and password sent with every request
    pub user: String,
    pub pass: String,

    /// Agent whose session the agent API acts on
    pub agent_user: String,

    /// Client identifier sent as `source`
    pub source: String,

    pub agent_api_path: String,
    pub non_agent_api_path: String,

    /// Output format for non-agent functions (`stage` parameter)
    pub output_format: Option<String>,

    /// Per-call timeout
    pub request_timeout: Duration,

    /// Interval between connectivity checks
    pub connectivity_interval: Duration,

    /// Delay after which a ringing call is assumed answered
    pub connect_fallback: Duration,

    /// Hold the agent in wrap-up until the call is dispositioned
    pub require_disposition: bool,

    /// Chat-completion endpoint, if the assistant is enabled
    pub assistant_url: Option<String>,
}

impl std::fmt::Debug for ControlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("pass", &"***")
            .field("agent_user", &self.agent_user)
            .field("source", &self.source)
            .field("request_timeout", &self.request_timeout)
            .field("connectivity_interval", &self.connectivity_interval)
            .field("connect_fallback", &self.connect_fallback)
            .field("require_disposition", &self.require_disposition)
            .finish_non_exhaustive()
    }
}

impl ControlConfig {
    /// Create a configuration with defaults for everything but endpoint and credentials
    pub fn new(base_url: impl Into<String>, user: impl Into<String>, pass: impl Into<String>) -> Self {
        let user = user.into();
        Self {
            base_url: base_url.into(),
            agent_user: user.clone(),
            user,
            pass: pass.into(),
            source: DEFAULT_SOURCE.to_string(),
            agent_api_path: DEFAULT_AGENT_API_PATH.to_string(),
            non_agent_api_path: DEFAULT_NON_AGENT_API_PATH.to_string(),
            output_format: Some(DEFAULT_OUTPUT_FORMAT.to_string()),
            request_timeout: Duration::from_secs(15),
            connectivity_interval: Duration::from_secs(30),
            connect_fallback: Duration::from_secs(3),
            require_disposition: false,
            assistant_url: None,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `LEADLINE_API_URL`, `LEADLINE_API_USER`, `LEADLINE_API_PASS`: required
    /// - `LEADLINE_AGENT_USER`: agent to act as (default: the API user)
    /// - `LEADLINE_SOURCE`: client identifier (default: leadline)
    /// - `LEADLINE_AGENT_API_PATH`, `LEADLINE_NON_AGENT_API_PATH`: endpoint paths
    /// - `LEADLINE_REQUEST_TIMEOUT_SECS` (15), `LEADLINE_CONNECTIVITY_INTERVAL_SECS` (30),
    ///   `LEADLINE_CONNECT_FALLBACK_SECS` (3)
    /// - `LEADLINE_REQUIRE_DISPOSITION`: true/1 to enable wrap-up
    /// - `LEADLINE_ASSISTANT_URL`: chat-completion endpoint
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = get("LEADLINE_API_URL");
        let user = get("LEADLINE_API_USER");
        let pass = get("LEADLINE_API_PASS");

        let (base_url, user, pass) = match (base_url, user, pass) {
            (Some(base_url), Some(user), Some(pass)) => (base_url, user, pass),
            (base_url, user, pass) => {
                let missing: Vec<&str> = [
                    ("LEADLINE_API_URL", base_url.is_none()),
                    ("LEADLINE_API_USER", user.is_none()),
                    ("LEADLINE_API_PASS", pass.is_none()),
                ]
                .into_iter()
                .filter_map(|(key, absent)| absent.then_some(key))
                .collect();
                return Err(ControlError::config(format!(
                    "missing required settings: {}",
                    missing.join(", ")
                )));
            }
        };

        let mut config = Self::new(base_url, user, pass);

        if let Some(agent_user) = get("LEADLINE_AGENT_USER") {
            config.agent_user = agent_user;
        }
        if let Some(source) = get("LEADLINE_SOURCE") {
            config.source = source;
        }
        if let Some(path) = get("LEADLINE_AGENT_API_PATH") {
            config.agent_api_path = path;
        }
        if let Some(path) = get("LEADLINE_NON_AGENT_API_PATH") {
            config.non_agent_api_path = path;
        }
        if let Some(secs) = parse_period(get("LEADLINE_REQUEST_TIMEOUT_SECS"), "LEADLINE_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = secs;
        }
        if let Some(secs) = parse_period(
            get("LEADLINE_CONNECTIVITY_INTERVAL_SECS"),
            "LEADLINE_CONNECTIVITY_INTERVAL_SECS",
        )? {
            config.connectivity_interval = secs;
        }
        if let Some(secs) = parse_secs(get("LEADLINE_CONNECT_FALLBACK_SECS"), "LEADLINE_CONNECT_FALLBACK_SECS")? {
            config.connect_fallback = secs;
        }
        config.require_disposition = get("LEADLINE_REQUIRE_DISPOSITION")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);
        config.assistant_url = get("LEADLINE_ASSISTANT_URL");

        Ok(config)
    }

    pub fn with_agent_user(mut self, agent_user: impl Into<String>) -> Self {
        self.agent_user = agent_user.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connectivity_interval(mut self, interval: Duration) -> Self {
        self.connectivity_interval = interval;
        self
    }

    pub fn with_connect_fallback(mut self, delay: Duration) -> Self {
        self.connect_fallback = delay;
        self
    }

    pub fn with_require_disposition(mut self, required: bool) -> Self {
        self.require_disposition = required;
        self
    }

    pub fn with_assistant_url(mut self, url: impl Into<String>) -> Self {
        self.assistant_url = Some(url.into());
        self
    }
}

fn parse_secs(value: Option<String>, key: &str) -> Result<Option<Duration>> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ControlError::config(format!("{} must be a whole number of seconds, got '{}'", key, raw))),
    }
}

/// Like `parse_secs`, for settings where zero would stall every request or check
fn parse_period(value: Option<String>, key: &str) -> Result<Option<Duration>> {
    match parse_secs(value, key)? {
        Some(period) if period.is_zero() => Err(ControlError::config(format!(
            "{} must be at least 1 second",
            key
        ))),
        period => Ok(period),
    }
}

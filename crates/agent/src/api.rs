// Typed client for the call-center control API
//
// One method per remote function. Each builds the request, sends it with the
// per-call timeout, and classifies the reply. A reply the platform did not accept
// comes back as ControlError::Protocol; no method retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use leadline_core::request::redact;
use leadline_core::{
    AgentStatsRow, ControlConfig, ControlError, ControlTransport, DialRequest, DispositionRecord,
    Endpoint, LeadDraft, LeadUpdate, Params, Recording, RemoteCallResult, RequestBuilder, Result,
    TransportError,
};
use tracing::{debug, instrument};

use crate::transport::HttpTransport;

/// Index of the lead id in an add_lead payload: phone|user|list_id|lead_id|gmt
const ADD_LEAD_ID_FIELD: usize = 3;

#[derive(Clone)]
pub struct ControlApi {
    builder: RequestBuilder,
    transport: Arc<dyn ControlTransport>,
    timeout: Duration,
}

impl std::fmt::Debug for ControlApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlApi")
            .field("builder", &self.builder)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ControlApi {
    /// Create a client over any transport
    pub fn new(config: &ControlConfig, transport: Arc<dyn ControlTransport>) -> Result<Self> {
        if config.request_timeout.is_zero() {
            return Err(ControlError::config("request timeout must be at least 1 second"));
        }
        Ok(Self {
            builder: RequestBuilder::new(config)?,
            transport,
            timeout: config.request_timeout,
        })
    }

    /// Create a client over HTTP
    pub fn from_config(config: &ControlConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Self::new(config, Arc::new(transport))
    }

    pub fn agent_user(&self) -> &str {
        self.builder.agent_user()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, endpoint: Endpoint, function: &str, params: &Params) -> Result<String> {
        let url = self.builder.build(endpoint, function, params);
        debug!(url = %redact(&url), "sending control request");

        let body = tokio::time::timeout(self.timeout, self.transport.get(&url))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;
        Ok(body)
    }

    /// Call an action function and require a SUCCESS/NOTICE reply
    #[instrument(skip(self, params))]
    pub async fn call(
        &self,
        endpoint: Endpoint,
        function: &str,
        params: &Params,
    ) -> Result<RemoteCallResult> {
        let body = self.send(endpoint, function, params).await?;
        let result = RemoteCallResult::classify(&body);
        debug!(succeeded = result.succeeded, "classified reply");
        result.into_result(function)
    }

    /// Call a lookup/export function whose reply is a table of rows
    #[instrument(skip(self, params))]
    pub async fn call_table(
        &self,
        endpoint: Endpoint,
        function: &str,
        params: &Params,
    ) -> Result<RemoteCallResult> {
        let body = self.send(endpoint, function, params).await?;
        let result = RemoteCallResult::classify_table(&body);
        debug!(succeeded = result.succeeded, rows = result.records.len(), "classified table");
        result.into_result(function)
    }

    // ---- session actions (agent endpoint) ------------------------------

    pub async fn login(&self, campaign: &str, phone_login: &str) -> Result<RemoteCallResult> {
        let params = Params::new()
            .set("value", campaign)
            .set("phone_login", phone_login);
        self.call(Endpoint::Agent, "login", &params).await
    }

    pub async fn logout(&self) -> Result<RemoteCallResult> {
        let params = Params::new().set("value", "LOGOUT");
        self.call(Endpoint::Agent, "logout", &params).await
    }

    pub async fn external_dial(&self, request: &DialRequest) -> Result<RemoteCallResult> {
        self.call(Endpoint::Agent, "external_dial", &request.to_params())
            .await
    }

    pub async fn external_hangup(&self) -> Result<RemoteCallResult> {
        let params = Params::new().set("value", 1_i64);
        self.call(Endpoint::Agent, "external_hangup", &params).await
    }

    /// Pause (`true`) or resume (`false`)
    pub async fn external_pause(&self, pause: bool) -> Result<RemoteCallResult> {
        let params = Params::new().set("value", if pause { "PAUSE" } else { "RESUME" });
        self.call(Endpoint::Agent, "external_pause", &params).await
    }

    /// Set the disposition of the current call
    pub async fn external_status(&self, record: &DispositionRecord) -> Result<RemoteCallResult> {
        let callback = record.callback.as_ref();
        let notes = Some(record.notes.trim()).filter(|n| !n.is_empty());
        let params = Params::new()
            .set("value", record.outcome.wire())
            .set("comments", notes)
            .set("callback_datetime", callback.map(|c| c.wire_datetime()))
            .set("callback_type", callback.map(|c| c.scope.wire()))
            .set("callback_comments", callback.map(|c| c.note.trim().to_string()));
        self.call(Endpoint::Agent, "external_status", &params).await
    }

    /// Start (`true`) or stop (`false`) recording the current call
    pub async fn recording(&self, start: bool) -> Result<RemoteCallResult> {
        let params = Params::new().set("value", if start { "START" } else { "STOP" });
        self.call(Endpoint::Agent, "recording", &params).await
    }

    // ---- lead and reporting functions (non-agent endpoint) -------------

    /// Platform version string; the connectivity probe
    pub async fn version(&self) -> Result<String> {
        let result = self
            .call_table(Endpoint::NonAgent, "version", &Params::new())
            .await?;
        let version = result
            .first_field
            .as_deref()
            .map(|f| f.trim_start_matches("VERSION:").trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| result.message().to_string());
        Ok(version)
    }

    /// Add a lead; returns the platform's lead id
    pub async fn add_lead(&self, draft: &LeadDraft) -> Result<String> {
        if draft.phone_number.trim().is_empty() {
            return Err(ControlError::validation("phone number is required"));
        }
        let result = self
            .call(Endpoint::NonAgent, "add_lead", &draft.to_params())
            .await?;
        result
            .field(ADD_LEAD_ID_FIELD)
            .map(str::to_string)
            .ok_or_else(|| {
                ControlError::protocol("add_lead", format!("no lead id in reply '{}'", result.raw_text))
            })
    }

    pub async fn update_lead(&self, lead_id: &str, update: &LeadUpdate) -> Result<RemoteCallResult> {
        if update.is_empty() {
            return Err(ControlError::validation("nothing to update"));
        }
        let mut params = update.to_params();
        params.insert("lead_id", lead_id);
        self.call(Endpoint::NonAgent, "update_lead", &params).await
    }

    /// Lead ids matching a phone number
    pub async fn lead_search(&self, phone_number: &str) -> Result<Vec<String>> {
        let params = Params::new().set("phone_number", phone_number);
        let result = self
            .call_table(Endpoint::NonAgent, "lead_search", &params)
            .await?;
        Ok(result
            .records
            .iter()
            .filter_map(|row| row.first())
            .filter(|id| !id.is_empty())
            .cloned()
            .collect())
    }

    pub async fn recording_lookup(&self, lead_id: &str) -> Result<Vec<Recording>> {
        let params = Params::new().set("lead_id", lead_id);
        let result = self
            .call_table(Endpoint::NonAgent, "recording_lookup", &params)
            .await?;
        Ok(result
            .records
            .iter()
            .filter_map(|row| Recording::from_row(row))
            .collect())
    }

    pub async fn agent_stats_export(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<AgentStatsRow>> {
        if end <= start {
            return Err(ControlError::validation("stats range end must be after its start"));
        }
        let params = Params::new()
            .set("datetime_start", start.format("%Y-%m-%d %H:%M:%S").to_string())
            .set("datetime_end", end.format("%Y-%m-%d %H:%M:%S").to_string())
            .set("time_format", "S");
        let result = self
            .call_table(Endpoint::NonAgent, "agent_stats_export", &params)
            .await?;
        Ok(result
            .records
            .iter()
            .filter_map(|row| AgentStatsRow::from_row(row))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadline_core::memory::{ScriptedReply, ScriptedTransport};
    use leadline_core::{CallbackSchedule, DispositionCode};
    use std::collections::HashMap;

    fn api(transport: &ScriptedTransport) -> ControlApi {
        let config = ControlConfig::new("http://dialer.test", "apiuser", "secret")
            .with_agent_user("6666")
            .with_request_timeout(Duration::from_secs(10));
        ControlApi::new(&config, Arc::new(transport.clone())).unwrap()
    }

    fn query(url: &url::Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[tokio::test]
    async fn test_error_reply_becomes_protocol_error() {
        let transport = ScriptedTransport::new();
        transport
            .respond("external_hangup", "ERROR: external_hangup agent_user is not logged in - 6666")
            .await;
        let err = api(&transport).external_hangup().await.unwrap_err();
        assert_eq!(
            err,
            ControlError::protocol("external_hangup", "external_hangup agent_user is not logged in - 6666")
        );
    }

    #[tokio::test]
    async fn test_malformed_reply_is_protocol_error() {
        let transport = ScriptedTransport::new();
        transport.respond("external_pause", "<html>oops</html>").await;
        let err = api(&transport).external_pause(true).await.unwrap_err();
        assert!(matches!(err, ControlError::Protocol { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transport_error() {
        let transport = ScriptedTransport::new();
        transport
            .push(
                "external_pause",
                ScriptedReply::Delayed(Duration::from_secs(60), "SUCCESS: late".into()),
            )
            .await;
        let err = api(&transport).external_pause(true).await.unwrap_err();
        assert_eq!(
            err,
            ControlError::Transport(TransportError::Timeout(Duration::from_secs(10)))
        );
    }

    #[tokio::test]
    async fn test_disposition_callback_params() {
        let transport = ScriptedTransport::new();
        transport
            .respond("external_status", "SUCCESS: external_status function set - CALLBK|6666")
            .await;
        let at = chrono::DateTime::parse_from_rfc3339("2030-06-01T09:15:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let record = DispositionRecord::new(DispositionCode::Callback)
            .with_callback(CallbackSchedule::new(at, " after lunch "));
        api(&transport).external_status(&record).await.unwrap();

        let sent = transport.requests_for("external_status").await;
        let q = query(&sent[0]);
        assert_eq!(q["value"], "CALLBK");
        assert_eq!(q["callback_datetime"], "2030-06-01 09:15:00");
        assert_eq!(q["callback_type"], "USERONLY");
        assert_eq!(q["callback_comments"], "after lunch");
        assert!(!q.contains_key("comments"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ControlConfig::new("http://dialer.test", "api", "secret")
            .with_request_timeout(Duration::ZERO);
        let err = ControlApi::new(&config, Arc::new(ScriptedTransport::new())).unwrap_err();
        assert!(matches!(err, ControlError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_add_lead_returns_id() {
        let transport = ScriptedTransport::new();
        transport
            .respond(
                "add_lead",
                "SUCCESS: add_lead LEAD HAS BEEN ADDED - 3001234567|6666|999|193715|-5",
            )
            .await;
        let draft = LeadDraft {
            list_id: Some("999".into()),
            ..LeadDraft::new("3001234567")
        };
        let lead_id = api(&transport).add_lead(&draft).await.unwrap();
        assert_eq!(lead_id, "193715");

        let q = query(&transport.requests_for("add_lead").await[0]);
        assert_eq!(q["list_id"], "999");
        assert_eq!(q["stage"], "pipe");
        assert!(!q.contains_key("first_name"));
    }

    #[tokio::test]
    async fn test_add_lead_without_id_is_protocol_error() {
        let transport = ScriptedTransport::new();
        transport.respond("add_lead", "SUCCESS: add_lead LEAD HAS BEEN ADDED").await;
        // list id present, lead id cut off
        transport
            .respond("add_lead", "SUCCESS: add_lead LEAD HAS BEEN ADDED - 3001234567|6666|999")
            .await;
        let api = api(&transport);
        for _ in 0..2 {
            let err = api.add_lead(&LeadDraft::new("3001234567")).await.unwrap_err();
            assert!(matches!(err, ControlError::Protocol { .. }));
        }
    }

    #[tokio::test]
    async fn test_empty_update_never_sent() {
        let transport = ScriptedTransport::new();
        let err = api(&transport)
            .update_lead("193715", &LeadUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));
        assert!(transport.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_version_strips_label() {
        let transport = ScriptedTransport::new();
        transport
            .respond("version", "VERSION: 2.14-917a|BUILD: 230401-1234|DATE: 2024-01-05")
            .await;
        assert_eq!(api(&transport).version().await.unwrap(), "2.14-917a");

        transport.respond("version", "ERROR: Login incorrect").await;
        assert!(api(&transport).version().await.is_err());
    }

    #[tokio::test]
    async fn test_recording_lookup_rows() {
        let transport = ScriptedTransport::new();
        transport
            .respond(
                "recording_lookup",
                "2024-01-05 10:00:01|6666|88231|193715|http://rec/1.mp3\nbroken row\n",
            )
            .await;
        let recordings = api(&transport).recording_lookup("193715").await.unwrap();
        assert_eq!(recordings.len(), 1);
        assert_eq!(recordings[0].recording_id, "88231");
    }

    #[tokio::test]
    async fn test_stats_range_validated() {
        let transport = ScriptedTransport::new();
        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let start = day.and_hms_opt(9, 0, 0).unwrap();
        let err = api(&transport)
            .agent_stats_export(start, start)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));

        transport
            .respond("agent_stats_export", "6666|Jane Doe|12|3400\n7777|Omar Diaz|9|2100")
            .await;
        let end = day.and_hms_opt(17, 0, 0).unwrap();
        let rows = api(&transport).agent_stats_export(start, end).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].agent_user, "7777");
    }
}

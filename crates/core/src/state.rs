// Session state transitions
//
// SessionState is the pure half of the reconciler: every `check_*` validates a local
// precondition without side effects, every `apply_*` mutates state after the platform
// accepted the matching action. The lock is released between the two while the
// remote call is outstanding; callers keep other actions out of that window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::disposition::{DispositionCode, DispositionRecord};
use crate::error::{ControlError, Result};
use crate::request::Params;
use crate::session::{
    AgentSession, AgentStatus, CallSession, CallStatus, Connectivity, SessionMetrics,
    SessionSnapshot, StatusConfidence,
};

/// Parameters of an outbound dial
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialRequest {
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_name: Option<String>,
    /// Ask the platform to match the number against existing leads
    #[serde(default)]
    pub search: bool,
    /// Show the lead to the agent before dialing
    #[serde(default)]
    pub preview: bool,
    /// Bring the agent screen to the front
    #[serde(default = "default_focus")]
    pub focus: bool,
}

fn default_focus() -> bool {
    true
}

impl DialRequest {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            phone_code: None,
            lead_id: None,
            lead_name: None,
            search: false,
            preview: false,
            focus: default_focus(),
        }
    }

    pub fn with_lead(mut self, lead_id: impl Into<String>, lead_name: Option<String>) -> Self {
        self.lead_id = Some(lead_id.into());
        self.lead_name = lead_name;
        self
    }

    pub fn with_search(mut self, search: bool) -> Self {
        self.search = search;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let number = self.phone_number.trim();
        if number.is_empty() {
            return Err(ControlError::validation("phone number is required"));
        }
        if !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(ControlError::validation(format!(
                "phone number '{}' must contain digits only",
                number
            )));
        }
        Ok(())
    }

    pub fn to_params(&self) -> Params {
        Params::new()
            .set("value", self.phone_number.trim())
            .set("phone_code", self.phone_code.clone().unwrap_or_else(|| "1".to_string()))
            .set("lead_id", self.lead_id.clone())
            .set("search", self.search)
            .set("preview", self.preview)
            .set("focus", self.focus)
    }
}

/// What a pause/resume applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseTarget {
    /// The agent, between calls
    Agent,
    /// The connected call
    Call,
}

/// Summary of a call closed by a disposition
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClosedCall {
    pub outcome: DispositionCode,
    pub phone_number: Option<String>,
    pub lead_id: Option<String>,
    pub lead_name: Option<String>,
    pub duration_seconds: u64,
}

/// Agent, call and metrics owned by one reconciler
#[derive(Debug, Clone)]
pub struct SessionState {
    agent: AgentSession,
    call: CallSession,
    metrics: SessionMetrics,
    /// Incremented per dial so stale fallback timers can be told apart
    call_seq: u64,
    /// Duration reached when the call was hung up, kept until disposition
    ended_duration: u64,
    require_disposition: bool,
}

impl SessionState {
    pub fn new(now: DateTime<Utc>, require_disposition: bool) -> Self {
        Self {
            agent: AgentSession::logged_out(now),
            call: CallSession::idle(),
            metrics: SessionMetrics::default(),
            call_seq: 0,
            ended_duration: 0,
            require_disposition,
        }
    }

    pub fn agent(&self) -> &AgentSession {
        &self.agent
    }

    pub fn call(&self) -> &CallSession {
        &self.call
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn call_seq(&self) -> u64 {
        self.call_seq
    }

    pub fn snapshot(&self, connectivity: Connectivity) -> SessionSnapshot {
        SessionSnapshot {
            agent: self.agent.clone(),
            call: self.call.clone(),
            metrics: self.metrics.clone(),
            connectivity,
        }
    }

    /// Record activity from any accepted action
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.agent.last_activity_at = now;
    }

    fn require_logged_in(&self) -> Result<()> {
        if self.agent.logged_in {
            Ok(())
        } else {
            Err(ControlError::validation("agent is not logged in"))
        }
    }

    // ---- login / logout -------------------------------------------------

    pub fn check_login(&self) -> Result<()> {
        if self.agent.logged_in {
            return Err(ControlError::validation("agent is already logged in"));
        }
        Ok(())
    }

    pub fn apply_login(
        &mut self,
        campaign: Option<String>,
        phone_device_id: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.agent = AgentSession {
            logged_in: true,
            status: AgentStatus::Ready,
            campaign,
            phone_device_id,
            last_activity_at: now,
        };
        self.call = CallSession::idle();
        self.ended_duration = 0;
    }

    pub fn check_logout(&self) -> Result<()> {
        self.require_logged_in()
    }

    /// Forced reset of agent and call; metrics are kept for display
    pub fn apply_logout(&mut self, now: DateTime<Utc>) {
        self.agent = AgentSession::logged_out(now);
        self.call = CallSession::idle();
        self.ended_duration = 0;
        self.call_seq += 1;
    }

    // ---- dial / connect / hangup ----------------------------------------

    pub fn check_dial(&self, request: &DialRequest) -> Result<()> {
        self.require_logged_in()?;
        match self.agent.status {
            AgentStatus::Ready => {}
            AgentStatus::Paused => {
                return Err(ControlError::validation("resume before dialing"));
            }
            AgentStatus::OnCall => {
                return Err(ControlError::validation("a call is already in progress"));
            }
            AgentStatus::WrapUp => {
                return Err(ControlError::validation(
                    "the previous call is awaiting a disposition",
                ));
            }
            AgentStatus::LoggedOut => {
                return Err(ControlError::validation("agent is not logged in"));
            }
        }
        match self.call.status {
            CallStatus::Idle => {}
            CallStatus::Ended => {
                return Err(ControlError::validation(
                    "the previous call is awaiting a disposition",
                ));
            }
            _ => return Err(ControlError::validation("a call is already in progress")),
        }
        request.validate()
    }

    /// Start a ringing call; returns its sequence number
    pub fn apply_dial(&mut self, request: &DialRequest, now: DateTime<Utc>) -> u64 {
        self.call_seq += 1;
        self.ended_duration = 0;
        self.agent.status = AgentStatus::OnCall;
        self.agent.last_activity_at = now;
        self.call = CallSession {
            active: true,
            status: CallStatus::Ringing,
            confidence: StatusConfidence::Confirmed,
            phone_number: Some(request.phone_number.trim().to_string()),
            lead_id: request.lead_id.clone(),
            lead_name: request.lead_name.clone(),
            started_at: Some(now),
            duration_seconds: 0,
            is_recording: false,
        };
        self.call_seq
    }

    /// Upgrade a ringing call to connected
    ///
    /// `seq` limits the upgrade to one specific dial; `None` applies to whatever is ringing.
    pub fn promote_connected(&mut self, seq: Option<u64>, confidence: StatusConfidence) -> bool {
        if self.call.status != CallStatus::Ringing {
            return false;
        }
        if seq.is_some_and(|seq| seq != self.call_seq) {
            return false;
        }
        self.call.status = CallStatus::Connected;
        self.call.confidence = confidence;
        true
    }

    pub fn check_hangup(&self) -> Result<()> {
        self.require_logged_in()?;
        if !self.call.status.is_live() {
            return Err(ControlError::validation("there is no call to hang up"));
        }
        Ok(())
    }

    /// End the call; returns the seconds added to talk time
    pub fn apply_hangup(&mut self, now: DateTime<Utc>) -> u64 {
        let duration = self.call.duration_seconds;
        self.metrics.talk_time_seconds += duration;
        self.ended_duration = duration;

        self.call.status = CallStatus::Ended;
        self.call.confidence = StatusConfidence::Confirmed;
        self.call.is_recording = false;

        if self.agent.status == AgentStatus::OnCall {
            self.agent.status = if self.require_disposition {
                AgentStatus::WrapUp
            } else {
                AgentStatus::Ready
            };
        }
        self.agent.last_activity_at = now;
        duration
    }

    // ---- pause / resume -------------------------------------------------

    pub fn pause_target(&self) -> Result<PauseTarget> {
        self.require_logged_in()?;
        match (self.agent.status, self.call.status) {
            (AgentStatus::OnCall, CallStatus::Connected) => Ok(PauseTarget::Call),
            (AgentStatus::OnCall, CallStatus::Paused) => {
                Err(ControlError::validation("the call is already paused"))
            }
            (AgentStatus::OnCall, _) => {
                Err(ControlError::validation("the call is not connected yet"))
            }
            (AgentStatus::Ready, _) => Ok(PauseTarget::Agent),
            (AgentStatus::Paused, _) => Err(ControlError::validation("agent is already paused")),
            (AgentStatus::WrapUp, _) => Err(ControlError::validation(
                "the previous call is awaiting a disposition",
            )),
            (AgentStatus::LoggedOut, _) => Err(ControlError::validation("agent is not logged in")),
        }
    }

    pub fn apply_pause(&mut self, target: PauseTarget, now: DateTime<Utc>) {
        match target {
            PauseTarget::Agent => self.agent.status = AgentStatus::Paused,
            PauseTarget::Call => {
                self.call.status = CallStatus::Paused;
                self.call.confidence = StatusConfidence::Confirmed;
            }
        }
        self.agent.last_activity_at = now;
    }

    pub fn resume_target(&self) -> Result<PauseTarget> {
        self.require_logged_in()?;
        match (self.agent.status, self.call.status) {
            (AgentStatus::OnCall, CallStatus::Paused) => Ok(PauseTarget::Call),
            (AgentStatus::Paused, _) => Ok(PauseTarget::Agent),
            _ => Err(ControlError::validation("nothing is paused")),
        }
    }

    pub fn apply_resume(&mut self, target: PauseTarget, now: DateTime<Utc>) {
        match target {
            PauseTarget::Agent => self.agent.status = AgentStatus::Ready,
            PauseTarget::Call => {
                self.call.status = CallStatus::Connected;
                self.call.confidence = StatusConfidence::Confirmed;
            }
        }
        self.agent.last_activity_at = now;
    }

    // ---- disposition ----------------------------------------------------

    pub fn check_disposition(&self, record: &DispositionRecord, now: DateTime<Utc>) -> Result<()> {
        self.require_logged_in()?;
        match self.call.status {
            CallStatus::Connected | CallStatus::Paused | CallStatus::Ended => {}
            CallStatus::Ringing => {
                return Err(ControlError::validation(
                    "hang up the ringing call before recording a disposition",
                ));
            }
            CallStatus::Idle => {
                return Err(ControlError::validation("there is no call to disposition"));
            }
        }
        record.validate(now)
    }

    /// Close the call with an accepted disposition
    pub fn apply_disposition(&mut self, record: &DispositionRecord, now: DateTime<Utc>) -> ClosedCall {
        let duration = if self.call.status == CallStatus::Ended {
            self.ended_duration
        } else {
            // closed straight from the conversation, no hangup added its talk time
            self.metrics.talk_time_seconds += self.call.duration_seconds;
            self.call.duration_seconds
        };

        let closed = ClosedCall {
            outcome: record.outcome,
            phone_number: self.call.phone_number.clone(),
            lead_id: self.call.lead_id.clone(),
            lead_name: self.call.lead_name.clone(),
            duration_seconds: duration,
        };

        self.metrics.calls_handled += 1;
        if record.outcome.is_conversion() {
            self.metrics.conversions += 1;
        }
        self.close_call(now);
        closed
    }

    /// Drop the pending disposition of an ended call
    pub fn skip_disposition(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.call.status != CallStatus::Ended {
            return Err(ControlError::validation("there is no ended call to skip"));
        }
        self.close_call(now);
        Ok(())
    }

    fn close_call(&mut self, now: DateTime<Utc>) {
        self.call = CallSession::idle();
        self.ended_duration = 0;
        if matches!(self.agent.status, AgentStatus::OnCall | AgentStatus::WrapUp) {
            self.agent.status = AgentStatus::Ready;
        }
        self.agent.last_activity_at = now;
    }

    // ---- recording ------------------------------------------------------

    pub fn check_recording(&self, start: bool) -> Result<()> {
        self.require_logged_in()?;
        if !matches!(self.call.status, CallStatus::Connected | CallStatus::Paused) {
            return Err(ControlError::validation("recording needs a connected call"));
        }
        match (start, self.call.is_recording) {
            (true, true) => Err(ControlError::validation("the call is already being recorded")),
            (false, false) => Err(ControlError::validation("the call is not being recorded")),
            _ => Ok(()),
        }
    }

    pub fn apply_recording(&mut self, start: bool, now: DateTime<Utc>) {
        self.call.is_recording = start;
        self.agent.last_activity_at = now;
    }

    // ---- timer ----------------------------------------------------------

    /// Advance the call duration by one second if the call is in conversation
    pub fn tick(&mut self) -> bool {
        if self.call.active && self.call.status == CallStatus::Connected {
            self.call.duration_seconds += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposition::CallbackSchedule;
    use chrono::Duration;

    fn logged_in() -> SessionState {
        let mut state = SessionState::new(Utc::now(), false);
        state.apply_login(Some("SALES".into()), Some("SIP/6666".into()), Utc::now());
        state
    }

    fn connected_call() -> SessionState {
        let mut state = logged_in();
        state.apply_dial(&DialRequest::new("3001234567"), Utc::now());
        assert!(state.promote_connected(None, StatusConfidence::Confirmed));
        state
    }

    #[test]
    fn test_new_state_is_logged_out() {
        let state = SessionState::new(Utc::now(), false);
        assert!(!state.agent().logged_in);
        assert_eq!(state.agent().status, AgentStatus::LoggedOut);
        assert_eq!(state.call().status, CallStatus::Idle);
    }

    #[test]
    fn test_login_twice_rejected() {
        let state = logged_in();
        assert!(state.check_login().is_err());
        assert_eq!(state.agent().status, AgentStatus::Ready);
        assert_eq!(state.agent().campaign.as_deref(), Some("SALES"));
    }

    #[test]
    fn test_dial_requires_login() {
        let state = SessionState::new(Utc::now(), false);
        let err = state.check_dial(&DialRequest::new("3001234567")).unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));
    }

    #[test]
    fn test_dial_rejects_bad_numbers() {
        let state = logged_in();
        assert!(state.check_dial(&DialRequest::new("")).is_err());
        assert!(state.check_dial(&DialRequest::new("300-123")).is_err());
        assert!(state.check_dial(&DialRequest::new("3001234567")).is_ok());
    }

    #[test]
    fn test_dial_starts_ringing() {
        let mut state = logged_in();
        let request = DialRequest::new("3001234567").with_lead("193715", Some("Ana Ruiz".into()));
        let seq = state.apply_dial(&request, Utc::now());

        assert_eq!(seq, state.call_seq());
        assert_eq!(state.agent().status, AgentStatus::OnCall);
        let call = state.call();
        assert!(call.active);
        assert_eq!(call.status, CallStatus::Ringing);
        assert_eq!(call.lead_id.as_deref(), Some("193715"));
        assert_eq!(call.duration_seconds, 0);
        assert!(call.started_at.is_some());
    }

    #[test]
    fn test_stale_promotion_is_ignored() {
        let mut state = logged_in();
        let first = state.apply_dial(&DialRequest::new("3001234567"), Utc::now());
        state.apply_hangup(Utc::now());
        state.skip_disposition(Utc::now()).unwrap();
        let second = state.apply_dial(&DialRequest::new("3007654321"), Utc::now());

        assert!(!state.promote_connected(Some(first), StatusConfidence::Heuristic));
        assert_eq!(state.call().status, CallStatus::Ringing);
        assert!(state.promote_connected(Some(second), StatusConfidence::Heuristic));
        assert_eq!(state.call().confidence, StatusConfidence::Heuristic);
    }

    #[test]
    fn test_duration_only_advances_while_connected() {
        let mut state = logged_in();
        assert!(!state.tick());

        state.apply_dial(&DialRequest::new("3001234567"), Utc::now());
        assert!(!state.tick());
        assert_eq!(state.call().duration_seconds, 0);

        state.promote_connected(None, StatusConfidence::Confirmed);
        for _ in 0..5 {
            assert!(state.tick());
        }
        assert_eq!(state.call().duration_seconds, 5);

        let target = state.pause_target().unwrap();
        assert_eq!(target, PauseTarget::Call);
        state.apply_pause(target, Utc::now());
        for _ in 0..5 {
            assert!(!state.tick());
        }
        assert_eq!(state.call().duration_seconds, 5);

        let target = state.resume_target().unwrap();
        state.apply_resume(target, Utc::now());
        state.tick();
        assert_eq!(state.call().duration_seconds, 6);
    }

    #[test]
    fn test_pause_resume_between_calls_targets_agent() {
        let mut state = logged_in();
        let target = state.pause_target().unwrap();
        assert_eq!(target, PauseTarget::Agent);
        state.apply_pause(target, Utc::now());
        assert_eq!(state.agent().status, AgentStatus::Paused);
        assert!(state.pause_target().is_err());
        assert!(state.check_dial(&DialRequest::new("3001234567")).is_err());

        let target = state.resume_target().unwrap();
        state.apply_resume(target, Utc::now());
        assert_eq!(state.agent().status, AgentStatus::Ready);
        assert!(state.resume_target().is_err());
    }

    #[test]
    fn test_hangup_adds_talk_time_and_ends_call() {
        let mut state = connected_call();
        for _ in 0..42 {
            state.tick();
        }
        let added = state.apply_hangup(Utc::now());
        assert_eq!(added, 42);
        assert_eq!(state.metrics().talk_time_seconds, 42);
        assert_eq!(state.call().status, CallStatus::Ended);
        assert_eq!(state.agent().status, AgentStatus::Ready);
        assert!(!state.tick());

        let err = state.check_dial(&DialRequest::new("3001234567")).unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));
    }

    #[test]
    fn test_wrap_up_when_disposition_required() {
        let mut state = SessionState::new(Utc::now(), true);
        state.apply_login(None, None, Utc::now());
        state.apply_dial(&DialRequest::new("3001234567"), Utc::now());
        state.apply_hangup(Utc::now());
        assert_eq!(state.agent().status, AgentStatus::WrapUp);
        assert!(state.pause_target().is_err());

        state.apply_disposition(&DispositionRecord::new(DispositionCode::NoAnswer), Utc::now());
        assert_eq!(state.agent().status, AgentStatus::Ready);
        assert_eq!(state.call().status, CallStatus::Idle);
    }

    #[test]
    fn test_sale_after_hangup() {
        let mut state = connected_call();
        for _ in 0..30 {
            state.tick();
        }
        state.apply_hangup(Utc::now());
        let closed = state.apply_disposition(&DispositionRecord::new(DispositionCode::Sale), Utc::now());

        assert_eq!(closed.duration_seconds, 30);
        assert_eq!(state.metrics().conversions, 1);
        assert_eq!(state.metrics().calls_handled, 1);
        assert_eq!(state.metrics().talk_time_seconds, 30);
        assert_eq!(*state.call(), CallSession::idle());
    }

    #[test]
    fn test_disposition_from_connected_closes_call() {
        let mut state = connected_call();
        for _ in 0..10 {
            state.tick();
        }
        let record = DispositionRecord::new(DispositionCode::NotInterested);
        state.check_disposition(&record, Utc::now()).unwrap();
        let closed = state.apply_disposition(&record, Utc::now());

        assert_eq!(closed.duration_seconds, 10);
        assert_eq!(state.metrics().talk_time_seconds, 10);
        assert_eq!(state.metrics().conversions, 0);
        assert_eq!(state.agent().status, AgentStatus::Ready);
        assert!(!state.call().active);
        assert_eq!(state.call().duration_seconds, 0);
    }

    #[test]
    fn test_disposition_preconditions() {
        let state = logged_in();
        let record = DispositionRecord::new(DispositionCode::Sale);
        assert!(state.check_disposition(&record, Utc::now()).is_err());

        let mut ringing = logged_in();
        ringing.apply_dial(&DialRequest::new("3001234567"), Utc::now());
        assert!(ringing.check_disposition(&record, Utc::now()).is_err());

        let connected = connected_call();
        let now = Utc::now();
        let bad_callback = DispositionRecord::new(DispositionCode::Callback)
            .with_callback(CallbackSchedule::new(now - Duration::minutes(5), "later"));
        assert!(connected.check_disposition(&bad_callback, now).is_err());
    }

    #[test]
    fn test_skip_disposition() {
        let mut state = connected_call();
        assert!(state.skip_disposition(Utc::now()).is_err());
        state.apply_hangup(Utc::now());
        state.skip_disposition(Utc::now()).unwrap();
        assert_eq!(state.call().status, CallStatus::Idle);
        assert_eq!(state.metrics().calls_handled, 0);
    }

    #[test]
    fn test_logout_resets_everything_but_metrics() {
        let mut state = connected_call();
        state.tick();
        state.apply_hangup(Utc::now());
        state.apply_logout(Utc::now());

        assert!(!state.agent().logged_in);
        assert_eq!(state.agent().status, AgentStatus::LoggedOut);
        assert!(state.agent().campaign.is_none());
        assert_eq!(*state.call(), CallSession::idle());
        assert_eq!(state.metrics().talk_time_seconds, 1);
    }

    #[test]
    fn test_recording_toggle() {
        let mut state = logged_in();
        assert!(state.check_recording(true).is_err());

        let mut state2 = connected_call();
        assert!(state2.check_recording(false).is_err());
        state2.check_recording(true).unwrap();
        state2.apply_recording(true, Utc::now());
        assert!(state2.call().is_recording);
        assert!(state2.check_recording(true).is_err());

        state2.apply_hangup(Utc::now());
        assert!(!state2.call().is_recording);
        state.touch(Utc::now());
    }

    #[test]
    fn test_dial_params() {
        let request = DialRequest::new(" 3001234567 ").with_lead("193715", None);
        let present: Vec<_> = request
            .to_params()
            .present()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        assert_eq!(
            present,
            vec![
                "value=3001234567",
                "phone_code=1",
                "lead_id=193715",
                "search=NO",
                "preview=NO",
                "focus=YES",
            ]
        );
    }
}

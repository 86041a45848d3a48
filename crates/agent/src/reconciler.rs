// Session state reconciler
//
// Ties agent actions to AgentSession/CallSession changes. Every action follows the
// same path:
//   1. connectivity gate, then the session's single in-flight slot
//   2. local precondition check under the state lock
//   3. the remote call, with no lock held
//   4. on success, apply the transition under the lock and publish a snapshot
// Any failure leaves state untouched and raises an error notification.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leadline_core::{
    ActionKind, ClosedCall, ControlConfig, ControlError, Connectivity, DialRequest,
    DispositionRecord, LeadDraft, LeadUpdate, PauseTarget, RecordKind, RecordStore, Result,
    SessionSnapshot, SessionState, StatusConfidence, StoreError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, trace, warn};

use crate::api::ControlApi;
use crate::notify::Notification;

/// Notifications buffered per subscriber before the oldest are dropped
const NOTIFICATION_CAPACITY: usize = 64;

/// Reconciler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Delay after which a ringing call is assumed answered
    pub connect_fallback: Duration,
    /// Hold the agent in wrap-up after hangup until the call is dispositioned
    pub require_disposition: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            connect_fallback: Duration::from_secs(3),
            require_disposition: false,
        }
    }
}

impl From<&ControlConfig> for ReconcilerConfig {
    fn from(config: &ControlConfig) -> Self {
        Self {
            connect_fallback: config.connect_fallback,
            require_disposition: config.require_disposition,
        }
    }
}

struct Inner {
    api: ControlApi,
    store: Option<Arc<dyn RecordStore>>,
    config: ReconcilerConfig,
    state: Mutex<SessionState>,
    /// The one outstanding action of this session
    in_flight: Mutex<Option<ActionKind>>,
    connectivity: watch::Receiver<Connectivity>,
    notifications: broadcast::Sender<Notification>,
    snapshots: watch::Sender<SessionSnapshot>,
}

/// Frees the session's in-flight slot when dropped
struct InFlight<'a> {
    slot: &'a Mutex<Option<ActionKind>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

/// Owner of one agent's session state
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("agent_user", &self.inner.api.agent_user())
            .field("config", &self.inner.config)
            .field("store", &self.inner.store.is_some())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler gated by `connectivity`
    pub fn new(
        api: ControlApi,
        config: ReconcilerConfig,
        connectivity: watch::Receiver<Connectivity>,
    ) -> Self {
        Self::build(api, None, config, connectivity)
    }

    /// Create a reconciler that also writes callbacks, sales and leads to `store`
    pub fn with_store(
        api: ControlApi,
        store: Arc<dyn RecordStore>,
        config: ReconcilerConfig,
        connectivity: watch::Receiver<Connectivity>,
    ) -> Self {
        Self::build(api, Some(store), config, connectivity)
    }

    fn build(
        api: ControlApi,
        store: Option<Arc<dyn RecordStore>>,
        config: ReconcilerConfig,
        connectivity: watch::Receiver<Connectivity>,
    ) -> Self {
        let state = SessionState::new(Utc::now(), config.require_disposition);
        let snapshot = state.snapshot(connectivity.borrow().clone());
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let (snapshots, _) = watch::channel(snapshot);

        Self {
            inner: Arc::new(Inner {
                api,
                store,
                config,
                state: Mutex::new(state),
                in_flight: Mutex::new(None),
                connectivity,
                notifications,
                snapshots,
            }),
        }
    }

    // ========================================================================
    // Read side
    // ========================================================================

    /// Copy of the current session
    pub fn snapshot(&self) -> SessionSnapshot {
        let connectivity = self.inner.connectivity.borrow().clone();
        self.inner.state.lock().snapshot(connectivity)
    }

    /// Notifications raised from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifications.subscribe()
    }

    /// Snapshots published after every state change
    pub fn subscribe_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// The action currently awaiting the platform, if any
    pub fn in_flight(&self) -> Option<ActionKind> {
        *self.inner.in_flight.lock()
    }

    pub fn is_in_flight(&self, kind: ActionKind) -> bool {
        self.in_flight() == Some(kind)
    }

    pub fn api(&self) -> &ControlApi {
        &self.inner.api
    }

    // ========================================================================
    // Agent actions
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn login(&self, campaign: &str, phone_login: &str) -> Result<()> {
        let result = async {
            let _guard = self.begin(ActionKind::Login)?;
            self.inner.state.lock().check_login()?;
            if campaign.trim().is_empty() {
                return Err(ControlError::validation("campaign is required"));
            }
            if phone_login.trim().is_empty() {
                return Err(ControlError::validation("phone login is required"));
            }

            self.inner.api.login(campaign, phone_login).await?;

            self.inner.state.lock().apply_login(
                Some(campaign.to_string()),
                Some(phone_login.to_string()),
                Utc::now(),
            );
            info!(campaign, "agent logged in");
            self.succeed(ActionKind::Login, "Logged in", format!("Campaign {}", campaign));
            Ok(())
        }
        .await;
        self.report(ActionKind::Login, result)
    }

    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let result = async {
            let _guard = self.begin(ActionKind::Logout)?;
            self.inner.state.lock().check_logout()?;

            self.inner.api.logout().await?;

            self.inner.state.lock().apply_logout(Utc::now());
            info!("agent logged out");
            self.succeed(ActionKind::Logout, "Logged out", "Session closed");
            Ok(())
        }
        .await;
        self.report(ActionKind::Logout, result)
    }

    /// Dial out; the call starts RINGING and is upgraded by the connect fallback
    #[instrument(skip(self, request), fields(lead_id = ?request.lead_id))]
    pub async fn dial(&self, request: DialRequest) -> Result<()> {
        let result = async {
            let _guard = self.begin(ActionKind::Dial)?;
            self.inner.state.lock().check_dial(&request)?;

            self.inner.api.external_dial(&request).await?;

            let seq = self.inner.state.lock().apply_dial(&request, Utc::now());
            info!(seq, "call ringing");
            self.spawn_connect_fallback(seq);
            self.succeed(
                ActionKind::Dial,
                "Dialing",
                request.phone_number.trim().to_string(),
            );
            Ok(())
        }
        .await;
        self.report(ActionKind::Dial, result)
    }

    #[instrument(skip(self))]
    pub async fn hangup(&self) -> Result<()> {
        let result = async {
            let _guard = self.begin(ActionKind::Hangup)?;
            self.inner.state.lock().check_hangup()?;

            self.inner.api.external_hangup().await?;

            let duration = self.inner.state.lock().apply_hangup(Utc::now());
            info!(duration_seconds = duration, "call ended");
            self.succeed(
                ActionKind::Hangup,
                "Call ended",
                format!("Talk time {}s", duration),
            );
            Ok(())
        }
        .await;
        self.report(ActionKind::Hangup, result)
    }

    /// Pause the connected call, or the agent when no call is active
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        self.toggle_pause(true).await
    }

    /// Resume whatever `pause` paused
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<()> {
        self.toggle_pause(false).await
    }

    async fn toggle_pause(&self, pause: bool) -> Result<()> {
        let result = async {
            let _guard = self.begin(ActionKind::Pause)?;
            let target = {
                let state = self.inner.state.lock();
                if pause {
                    state.pause_target()?
                } else {
                    state.resume_target()?
                }
            };

            self.inner.api.external_pause(pause).await?;

            {
                let mut state = self.inner.state.lock();
                if pause {
                    state.apply_pause(target, Utc::now());
                } else {
                    state.apply_resume(target, Utc::now());
                }
            }

            let (title, what) = match (pause, target) {
                (true, PauseTarget::Agent) => ("Paused", "Agent paused"),
                (true, PauseTarget::Call) => ("Paused", "Call on hold"),
                (false, PauseTarget::Agent) => ("Resumed", "Agent ready"),
                (false, PauseTarget::Call) => ("Resumed", "Call resumed"),
            };
            info!(?target, pause, "pause state changed");
            self.succeed(ActionKind::Pause, title, what);
            Ok(())
        }
        .await;
        self.report(ActionKind::Pause, result)
    }

    /// Record the outcome of the current call and close it
    #[instrument(skip(self, record), fields(outcome = %record.outcome))]
    pub async fn dispose(&self, record: DispositionRecord) -> Result<ClosedCall> {
        let result = async {
            let _guard = self.begin(ActionKind::Disposition)?;
            self.inner
                .state
                .lock()
                .check_disposition(&record, Utc::now())?;

            self.inner.api.external_status(&record).await?;

            let closed = self
                .inner
                .state
                .lock()
                .apply_disposition(&record, Utc::now());
            info!(duration_seconds = closed.duration_seconds, "call dispositioned");
            self.succeed(
                ActionKind::Disposition,
                "Disposition saved",
                record.outcome.label(),
            );
            self.store_outcome(&record, &closed).await;
            Ok(closed)
        }
        .await;
        self.report(ActionKind::Disposition, result)
    }

    /// Close an ended call without a disposition; nothing is sent
    pub fn skip_disposition(&self) -> Result<()> {
        let result = self.inner.state.lock().skip_disposition(Utc::now());
        if result.is_ok() {
            debug!("disposition skipped");
            self.publish();
        }
        self.report(ActionKind::Disposition, result)
    }

    /// Start or stop recording the current call
    #[instrument(skip(self))]
    pub async fn set_recording(&self, start: bool) -> Result<()> {
        let result = async {
            let _guard = self.begin(ActionKind::Recording)?;
            self.inner.state.lock().check_recording(start)?;

            self.inner.api.recording(start).await?;

            self.inner.state.lock().apply_recording(start, Utc::now());
            let message = if start { "Recording started" } else { "Recording stopped" };
            info!(start, "recording toggled");
            self.succeed(ActionKind::Recording, "Recording", message);
            Ok(())
        }
        .await;
        self.report(ActionKind::Recording, result)
    }

    /// Explicit "answered" signal; upgrades a ringing call with confirmed confidence
    pub fn mark_connected(&self) -> bool {
        self.promote(None, StatusConfidence::Confirmed)
    }

    /// Advance the call timer by one second; returns whether it moved
    pub fn tick(&self) -> bool {
        let moved = self.inner.state.lock().tick();
        if moved {
            self.publish();
        }
        moved
    }

    // ========================================================================
    // Lead actions
    // ========================================================================

    /// Add a lead on the platform; returns its lead id
    #[instrument(skip(self, draft))]
    pub async fn add_lead(&self, draft: LeadDraft) -> Result<String> {
        let result = async {
            let _guard = self.begin(ActionKind::Lead)?;
            let lead_id = self.inner.api.add_lead(&draft).await?;
            info!(lead_id = %lead_id, "lead added");
            self.succeed(ActionKind::Lead, "Lead added", format!("Lead {}", lead_id));

            if let Some(store) = &self.inner.store {
                if let Err(e) = mirror_new_lead(store.as_ref(), &lead_id, &draft).await {
                    self.store_failed(ActionKind::Lead, e);
                }
            }
            Ok(lead_id)
        }
        .await;
        self.report(ActionKind::Lead, result)
    }

    #[instrument(skip(self, update))]
    pub async fn update_lead(&self, lead_id: &str, update: LeadUpdate) -> Result<()> {
        let result = async {
            let _guard = self.begin(ActionKind::Lead)?;
            self.inner.api.update_lead(lead_id, &update).await?;
            info!(lead_id, "lead updated");
            self.succeed(ActionKind::Lead, "Lead updated", format!("Lead {}", lead_id));

            if let Some(store) = &self.inner.store {
                if let Err(e) = mirror_lead_update(store.as_ref(), lead_id, &update).await {
                    self.store_failed(ActionKind::Lead, e);
                }
            }
            Ok(())
        }
        .await;
        self.report(ActionKind::Lead, result)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Connectivity gate, then claim the in-flight slot for `kind`
    fn begin(&self, kind: ActionKind) -> Result<InFlight<'_>> {
        if !self.inner.connectivity.borrow().is_connected() {
            return Err(ControlError::NotConnected);
        }
        let mut slot = self.inner.in_flight.lock();
        if let Some(outstanding) = *slot {
            return Err(ControlError::Busy(outstanding));
        }
        *slot = Some(kind);
        Ok(InFlight {
            slot: &self.inner.in_flight,
        })
    }

    fn promote(&self, seq: Option<u64>, confidence: StatusConfidence) -> bool {
        let promoted = self.inner.state.lock().promote_connected(seq, confidence);
        if promoted {
            debug!(?seq, ?confidence, "call connected");
            self.publish();
        }
        promoted
    }

    fn spawn_connect_fallback(&self, seq: u64) {
        let reconciler = self.clone();
        let delay = self.inner.config.connect_fallback;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !reconciler.promote(Some(seq), StatusConfidence::Heuristic) {
                trace!(seq, "connect fallback found nothing to upgrade");
            }
        });
    }

    async fn store_outcome(&self, record: &DispositionRecord, closed: &ClosedCall) {
        let Some(store) = &self.inner.store else {
            return;
        };
        let agent_user = self.inner.api.agent_user();

        let write = if let Some(callback) = &record.callback {
            Some((
                RecordKind::Callbacks,
                json!({
                    "lead_id": closed.lead_id,
                    "phone_number": closed.phone_number,
                    "lead_name": closed.lead_name,
                    "callback_at": callback.at,
                    "note": callback.note.trim(),
                    "scope": callback.scope,
                    "agent_user": agent_user,
                }),
            ))
        } else if record.outcome.is_conversion() {
            Some((
                RecordKind::Sales,
                json!({
                    "lead_id": closed.lead_id,
                    "phone_number": closed.phone_number,
                    "lead_name": closed.lead_name,
                    "duration_seconds": closed.duration_seconds,
                    "notes": record.notes.trim(),
                    "agent_user": agent_user,
                }),
            ))
        } else {
            None
        };

        if let Some((kind, fields)) = write {
            match store.create(kind, fields).await {
                Ok(saved) => debug!(%kind, id = %saved.id, "outcome stored"),
                Err(e) => self.store_failed(ActionKind::Disposition, e.into()),
            }
        }
    }

    fn store_failed(&self, action: ActionKind, err: ControlError) {
        warn!(%action, error = %err, "remote action applied but the record was not stored");
        self.notify(Notification::warning(err.title(), err.to_string()).with_action(action));
    }

    fn succeed(&self, action: ActionKind, title: &str, message: impl Into<String>) {
        self.publish();
        self.notify(Notification::info(title, message).with_action(action));
    }

    fn report<T>(&self, action: ActionKind, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_local() {
                debug!(%action, error = %err, "action refused locally");
            } else {
                warn!(%action, error = %err, "action failed");
            }
            self.notify(Notification::from_error(action, err));
        }
        result
    }

    fn publish(&self) {
        self.inner.snapshots.send_replace(self.snapshot());
    }

    fn notify(&self, notification: Notification) {
        if self.inner.notifications.send(notification).is_err() {
            trace!("no notification subscribers");
        }
    }
}

/// Store a freshly added lead under its platform id
async fn mirror_new_lead(store: &dyn RecordStore, lead_id: &str, draft: &LeadDraft) -> Result<()> {
    let mut fields = serde_json::to_value(draft).map_err(invalid_record)?;
    let Value::Object(map) = &mut fields else {
        return Err(invalid_record("lead draft is not an object"));
    };
    map.insert("lead_id".to_string(), json!(lead_id));
    store.create(RecordKind::Leads, fields).await?;
    Ok(())
}

fn invalid_record(err: impl std::fmt::Display) -> ControlError {
    ControlError::Store(StoreError::Invalid(err.to_string()))
}

/// Merge a lead update into the stored lead with the same platform id, if any
async fn mirror_lead_update(
    store: &dyn RecordStore,
    lead_id: &str,
    update: &LeadUpdate,
) -> Result<()> {
    let leads = store.list(RecordKind::Leads).await?;
    let Some(existing) = leads
        .iter()
        .find(|r| r.fields.get("lead_id").and_then(Value::as_str) == Some(lead_id))
    else {
        return Ok(());
    };
    let patch = serde_json::to_value(update).map_err(invalid_record)?;
    store.update(RecordKind::Leads, existing.id, patch).await?;
    Ok(())
}

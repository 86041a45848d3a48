// End-to-end agent session scenarios against a scripted platform
//
// The reconciler, ticker and connect fallback run for real; only the transport is
// scripted and time is paused so timers are deterministic.
//
// Run with: cargo test -p leadline-agent --test session_scenarios_test

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leadline_agent::{
    ControlApi, DurationTicker, Level, Reconciler, ReconcilerConfig,
};
use leadline_core::memory::{InMemoryRecordStore, ScriptedReply, ScriptedTransport};
use leadline_core::{
    ActionKind, AgentStatus, CallStatus, CallbackSchedule, Connectivity, ControlConfig,
    ControlError, DialRequest, DispositionCode, DispositionRecord, LeadDraft, RecordKind, RecordStore,
    StatusConfidence, TransportError,
};
use tokio::sync::watch;

struct Platform {
    reconciler: Reconciler,
    transport: ScriptedTransport,
    store: InMemoryRecordStore,
    connectivity: watch::Sender<Connectivity>,
}

async fn platform() -> Platform {
    let transport = ScriptedTransport::new();
    for function in [
        "login",
        "logout",
        "external_dial",
        "external_hangup",
        "external_pause",
        "external_status",
    ] {
        transport
            .set_default(
                function,
                ScriptedReply::Text(format!("SUCCESS: {} function set - 6666", function)),
            )
            .await;
    }

    let config = ControlConfig::new("http://dialer.test", "apiuser", "secret")
        .with_agent_user("6666")
        .with_request_timeout(Duration::from_secs(15))
        .with_connect_fallback(Duration::from_secs(3));
    let api = ControlApi::new(&config, Arc::new(transport.clone())).unwrap();
    let store = InMemoryRecordStore::new();
    let (connectivity, rx) = watch::channel(Connectivity::Connected);
    let reconciler = Reconciler::with_store(
        api,
        Arc::new(store.clone()),
        ReconcilerConfig::from(&config),
        rx,
    );

    Platform {
        reconciler,
        transport,
        store,
        connectivity,
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_dial_connect_hangup_sale() {
    let p = platform().await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker = DurationTicker::new(p.reconciler.clone()).spawn(shutdown_rx);

    p.reconciler.login("SALES", "SIP/6666").await.unwrap();
    assert_eq!(p.reconciler.snapshot().agent.status, AgentStatus::Ready);

    p.reconciler
        .dial(DialRequest::new("3001234567"))
        .await
        .unwrap();
    let snapshot = p.reconciler.snapshot();
    assert_eq!(snapshot.agent.status, AgentStatus::OnCall);
    assert_eq!(snapshot.call.status, CallStatus::Ringing);
    assert_eq!(snapshot.call.phone_number.as_deref(), Some("3001234567"));
    assert_eq!(snapshot.call.duration_seconds, 0);

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let call = p.reconciler.snapshot().call;
    assert_eq!(call.status, CallStatus::Connected);
    assert_eq!(call.confidence, StatusConfidence::Heuristic);

    tokio::time::sleep(Duration::from_secs(7)).await;
    p.reconciler.hangup().await.unwrap();
    let snapshot = p.reconciler.snapshot();
    let talked = snapshot.call.duration_seconds;
    assert!(talked >= 7, "duration was {}", talked);
    assert_eq!(snapshot.call.status, CallStatus::Ended);
    assert_eq!(snapshot.agent.status, AgentStatus::Ready);
    assert_eq!(snapshot.metrics.talk_time_seconds, talked);

    let closed = p
        .reconciler
        .dispose(DispositionRecord::new(DispositionCode::Sale).with_notes("annual plan"))
        .await
        .unwrap();
    assert_eq!(closed.duration_seconds, talked);

    let snapshot = p.reconciler.snapshot();
    assert_eq!(snapshot.call.status, CallStatus::Idle);
    assert_eq!(snapshot.call.duration_seconds, 0);
    assert!(!snapshot.call.active);
    assert_eq!(snapshot.metrics.conversions, 1);
    assert_eq!(snapshot.metrics.calls_handled, 1);

    let sales = p.store.list(RecordKind::Sales).await.unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].fields["notes"], "annual plan");

    shutdown_tx.send(true).unwrap();
    ticker.await.unwrap();
}

#[tokio::test]
async fn scenario_dial_while_disconnected_sends_nothing() {
    let p = platform().await;
    p.reconciler.login("SALES", "SIP/6666").await.unwrap();
    p.connectivity
        .send_replace(Connectivity::Disconnected("request timed out".into()));
    let mut notes = p.reconciler.subscribe();

    let err = p
        .reconciler
        .dial(DialRequest::new("3001234567"))
        .await
        .unwrap_err();
    assert_eq!(err, ControlError::NotConnected);
    assert_eq!(p.transport.request_count("external_dial").await, 0);
    assert_eq!(p.reconciler.snapshot().call.status, CallStatus::Idle);

    let note = notes.recv().await.unwrap();
    assert_eq!(note.level, Level::Error);
    assert_eq!(note.action, Some(ActionKind::Dial));
}

#[tokio::test(start_paused = true)]
async fn scenario_pause_timeout_leaves_agent_ready() {
    let p = platform().await;
    p.reconciler.login("SALES", "SIP/6666").await.unwrap();
    p.transport
        .push(
            "external_pause",
            ScriptedReply::Delayed(Duration::from_secs(60), "SUCCESS: too late".into()),
        )
        .await;
    let mut notes = p.reconciler.subscribe();

    let err = p.reconciler.pause().await.unwrap_err();
    assert_eq!(
        err,
        ControlError::Transport(TransportError::Timeout(Duration::from_secs(15)))
    );
    assert_eq!(p.reconciler.snapshot().agent.status, AgentStatus::Ready);
    assert!(!p.reconciler.is_in_flight(ActionKind::Pause));

    let note = notes.recv().await.unwrap();
    assert_eq!(note.title, "Request timed out");

    // retry by hand succeeds against the default reply
    p.reconciler.pause().await.unwrap();
    assert_eq!(p.reconciler.snapshot().agent.status, AgentStatus::Paused);
}

#[tokio::test]
async fn failed_pause_leaves_agent_ready() {
    let p = platform().await;
    p.reconciler.login("SALES", "SIP/6666").await.unwrap();
    p.transport
        .respond("external_pause", "ERROR: external_pause agent is not in a pausable state")
        .await;

    let err = p.reconciler.pause().await.unwrap_err();
    assert!(matches!(err, ControlError::Protocol { .. }));
    assert_eq!(p.reconciler.snapshot().agent.status, AgentStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn callback_in_the_past_is_rejected_before_sending() {
    let p = platform().await;
    p.reconciler.login("SALES", "SIP/6666").await.unwrap();
    p.reconciler
        .dial(DialRequest::new("3001234567"))
        .await
        .unwrap();
    p.reconciler.mark_connected();

    let past = DispositionRecord::new(DispositionCode::Callback)
        .with_callback(CallbackSchedule::new(Utc::now() - chrono::Duration::minutes(5), "later"));
    let err = p.reconciler.dispose(past).await.unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));

    let missing = DispositionRecord::new(DispositionCode::Callback);
    assert!(p.reconciler.dispose(missing).await.is_err());

    assert_eq!(p.transport.request_count("external_status").await, 0);
    assert_eq!(p.reconciler.snapshot().call.status, CallStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn store_failure_is_a_warning_not_a_failure() {
    struct BrokenStore;

    #[async_trait::async_trait]
    impl RecordStore for BrokenStore {
        async fn create(
            &self,
            _kind: RecordKind,
            _fields: serde_json::Value,
        ) -> Result<leadline_core::Record, leadline_core::StoreError> {
            Err(leadline_core::StoreError::Backend("disk full".into()))
        }
        async fn get(
            &self,
            kind: RecordKind,
            id: uuid::Uuid,
        ) -> Result<leadline_core::Record, leadline_core::StoreError> {
            Err(leadline_core::StoreError::NotFound { kind, id })
        }
        async fn update(
            &self,
            kind: RecordKind,
            id: uuid::Uuid,
            _patch: serde_json::Value,
        ) -> Result<leadline_core::Record, leadline_core::StoreError> {
            Err(leadline_core::StoreError::NotFound { kind, id })
        }
        async fn list(
            &self,
            _kind: RecordKind,
        ) -> Result<Vec<leadline_core::Record>, leadline_core::StoreError> {
            Ok(Vec::new())
        }
    }

    let p = platform().await;
    let config = ControlConfig::new("http://dialer.test", "apiuser", "secret");
    let api = ControlApi::new(&config, Arc::new(p.transport.clone())).unwrap();
    let (_connectivity, rx) = watch::channel(Connectivity::Connected);
    let reconciler =
        Reconciler::with_store(api, Arc::new(BrokenStore), ReconcilerConfig::default(), rx);

    reconciler.login("SALES", "SIP/6666").await.unwrap();
    reconciler.dial(DialRequest::new("3001234567")).await.unwrap();
    reconciler.mark_connected();

    let mut notes = reconciler.subscribe();
    reconciler
        .dispose(DispositionRecord::new(DispositionCode::Sale))
        .await
        .unwrap();

    let info = notes.recv().await.unwrap();
    assert_eq!(info.level, Level::Info);
    let warning = notes.recv().await.unwrap();
    assert_eq!(warning.level, Level::Warning);
    assert!(warning.message.contains("disk full"));
    assert_eq!(reconciler.snapshot().metrics.conversions, 1);

    p.transport
        .respond("add_lead", "SUCCESS: add_lead LEAD HAS BEEN ADDED - 3001234567|6666|999|193715|-5")
        .await;
    let lead_id = reconciler.add_lead(LeadDraft::new("3001234567")).await.unwrap();
    assert_eq!(lead_id, "193715");
    assert_eq!(notes.recv().await.unwrap().level, Level::Info);
    let warning = notes.recv().await.unwrap();
    assert_eq!(warning.level, Level::Warning);
    assert_eq!(warning.action, Some(ActionKind::Lead));
    assert!(warning.message.contains("disk full"));
}

#[tokio::test]
async fn logout_resets_session_and_keeps_metrics() {
    let p = platform().await;
    p.reconciler.login("SALES", "SIP/6666").await.unwrap();
    p.reconciler
        .dial(DialRequest::new("3001234567"))
        .await
        .unwrap();
    p.reconciler.mark_connected();
    p.reconciler.tick();
    p.reconciler.hangup().await.unwrap();

    let mut snapshots = p.reconciler.subscribe_snapshots();
    p.reconciler.logout().await.unwrap();
    assert!(snapshots.has_changed().unwrap());

    let snapshot = snapshots.borrow_and_update().clone();
    assert!(!snapshot.agent.logged_in);
    assert_eq!(snapshot.agent.status, AgentStatus::LoggedOut);
    assert_eq!(snapshot.call.status, CallStatus::Idle);
    assert_eq!(snapshot.metrics.talk_time_seconds, 1);
}

// Interactive agent session
//
// Runs the reconciler with its connectivity monitor and duration ticker, reads one
// command per line from stdin and prints notifications as they arrive.

use std::sync::Arc;

use crate::output::{print_snapshot, OutputFormat};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use leadline_agent::{
    ConnectivityMonitor, ControlApi, DurationTicker, Level, Notification, Reconciler,
    ReconcilerConfig,
};
use leadline_core::memory::InMemoryRecordStore;
use leadline_core::{
    CallbackSchedule, ControlConfig, DialRequest, DispositionCode, DispositionRecord,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};

const HELP: &str = "\
commands:
  login                         log into the campaign
  logout                        log out
  dial <number> [lead_id]       call a number
  hangup                        end the call
  pause | resume                pause/resume the call, or the agent between calls
  record on|off                 start/stop recording
  connected                     mark the ringing call as answered
  dispo <code> [notes...]       disposition the call (SALE, NI, NA, B, A, DNC, WN, DC, XFER)
  callback <rfc3339> <note...>  schedule a callback and disposition the call
  skip                          close an ended call without a disposition
  status                        show the session
  quit                          leave";

/// One parsed line of input
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Login,
    Logout,
    Dial {
        number: String,
        lead_id: Option<String>,
    },
    Hangup,
    Pause,
    Resume,
    Record(bool),
    Connected,
    Dispose(DispositionRecord),
    Skip,
    Status,
    Help,
    Quit,
}

/// Parse a line; `Ok(None)` for a blank line
pub fn parse_line(line: &str) -> Result<Option<SessionCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "login" => SessionCommand::Login,
        "logout" => SessionCommand::Logout,
        "dial" => match rest.as_slice() {
            [number] => SessionCommand::Dial {
                number: number.to_string(),
                lead_id: None,
            },
            [number, lead_id] => SessionCommand::Dial {
                number: number.to_string(),
                lead_id: Some(lead_id.to_string()),
            },
            _ => return Err("usage: dial <number> [lead_id]".to_string()),
        },
        "hangup" => SessionCommand::Hangup,
        "pause" => SessionCommand::Pause,
        "resume" => SessionCommand::Resume,
        "record" => match rest.as_slice() {
            ["on"] => SessionCommand::Record(true),
            ["off"] => SessionCommand::Record(false),
            _ => return Err("usage: record on|off".to_string()),
        },
        "connected" => SessionCommand::Connected,
        "dispo" => {
            let Some((code, notes)) = rest.split_first() else {
                return Err("usage: dispo <code> [notes...]".to_string());
            };
            let outcome: DispositionCode = code.parse().map_err(|e| format!("{}", e))?;
            if outcome.requires_callback() {
                return Err("use: callback <rfc3339> <note...>".to_string());
            }
            SessionCommand::Dispose(DispositionRecord::new(outcome).with_notes(notes.join(" ")))
        }
        "callback" => {
            let Some((at, note)) = rest.split_first() else {
                return Err("usage: callback <rfc3339> <note...>".to_string());
            };
            let at = DateTime::parse_from_rfc3339(at)
                .map_err(|e| format!("invalid callback time '{}': {}", at, e))?
                .with_timezone(&Utc);
            let record = DispositionRecord::new(DispositionCode::Callback)
                .with_callback(CallbackSchedule::new(at, note.join(" ")));
            SessionCommand::Dispose(record)
        }
        "skip" => SessionCommand::Skip,
        "status" => SessionCommand::Status,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

pub async fn run(
    config: &ControlConfig,
    output: OutputFormat,
    quiet: bool,
    campaign: String,
    phone: String,
) -> Result<()> {
    let api = ControlApi::from_config(config)?;
    let monitor = ConnectivityMonitor::new(api.clone(), config.connectivity_interval)?;
    let store = Arc::new(InMemoryRecordStore::new());
    let reconciler = Reconciler::with_store(
        api,
        store,
        ReconcilerConfig::from(config),
        monitor.subscribe(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_handle = monitor.spawn(shutdown_rx.clone());
    let ticker_handle = DurationTicker::new(reconciler.clone()).spawn(shutdown_rx);
    let printer_handle = tokio::spawn(print_notifications(reconciler.subscribe(), quiet));

    if !quiet {
        println!("Agent {} - type 'help' for commands", reconciler.api().agent_user());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("{}", message);
                continue;
            }
        };

        // Failures are reported through notifications
        let outcome = match command {
            SessionCommand::Login => reconciler.login(&campaign, &phone).await,
            SessionCommand::Logout => reconciler.logout().await,
            SessionCommand::Dial { number, lead_id } => {
                let mut request = DialRequest::new(number);
                if let Some(lead_id) = lead_id {
                    request = request.with_lead(lead_id, None);
                }
                reconciler.dial(request).await
            }
            SessionCommand::Hangup => reconciler.hangup().await,
            SessionCommand::Pause => reconciler.pause().await,
            SessionCommand::Resume => reconciler.resume().await,
            SessionCommand::Record(start) => reconciler.set_recording(start).await,
            SessionCommand::Connected => {
                if !reconciler.mark_connected() {
                    eprintln!("no ringing call");
                }
                Ok(())
            }
            SessionCommand::Dispose(record) => reconciler.dispose(record).await.map(|_| ()),
            SessionCommand::Skip => reconciler.skip_disposition(),
            SessionCommand::Status => {
                let snapshot = reconciler.snapshot();
                if output.is_text() {
                    print_snapshot(&snapshot);
                } else {
                    output.print_value(&snapshot)?;
                }
                Ok(())
            }
            SessionCommand::Help => {
                println!("{}", HELP);
                Ok(())
            }
            SessionCommand::Quit => break,
        };
        if let Err(e) = outcome {
            tracing::debug!(error = %e, "session command failed");
        }
    }

    if reconciler.snapshot().agent.logged_in {
        eprintln!("leaving while still logged in; the platform session stays open");
    }

    shutdown_tx.send(true).ok();
    monitor_handle.await.ok();
    ticker_handle.await.ok();
    printer_handle.abort();
    Ok(())
}

async fn print_notifications(mut notifications: broadcast::Receiver<Notification>, quiet: bool) {
    loop {
        match notifications.recv().await {
            Ok(note) if quiet && note.level == Level::Info => {}
            Ok(note) => match note.level {
                Level::Info => println!("{}", note),
                Level::Warning | Level::Error => eprintln!("{}", note),
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                eprintln!("({} notifications dropped)", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// Output formatting for CLI

use anyhow::Result;
use leadline_core::SessionSnapshot;
use serde::Serialize;

#[derive(Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Text,
        }
    }

    pub fn print_value<T: Serialize>(&self, value: &T) -> Result<()> {
        match self {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(value)?);
            }
            OutputFormat::Yaml => {
                println!("{}", serde_yaml::to_string(value)?);
            }
            OutputFormat::Text => {
                // Text format is handled by each command
            }
        }
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Print a simple key-value pair for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<14} {}", format!("{}:", label), value);
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let header: String = columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header);
}

/// Print a table row
pub fn print_table_row(values: &[(&str, usize)]) {
    let row: String = values
        .iter()
        .map(|(val, width)| format!("{:<width$}", truncate(val, *width), width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", row);
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width || width < 3 {
        return value.to_string();
    }
    let kept: String = value.chars().take(width - 3).collect();
    format!("{}...", kept)
}

/// Seconds as m:ss, or h:mm:ss past the hour
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Text rendering of a session snapshot
pub fn print_snapshot(snapshot: &SessionSnapshot) {
    let agent = &snapshot.agent;
    print_field("Connectivity", &snapshot.connectivity.to_string());
    print_field("Agent", &agent.status.to_string());
    if let Some(campaign) = &agent.campaign {
        print_field("Campaign", campaign);
    }

    let call = &snapshot.call;
    if call.active {
        let mut status = call.status.to_string();
        if call.is_recording {
            status.push_str(" (recording)");
        }
        print_field("Call", &status);
        print_field("Number", call.phone_number.as_deref().unwrap_or("-"));
        if let Some(lead) = &call.lead_id {
            print_field("Lead", lead);
        }
        print_field("Duration", &format_duration(call.duration_seconds));
    } else {
        print_field("Call", "none");
    }

    let metrics = &snapshot.metrics;
    print_field("Calls", &metrics.calls_handled.to_string());
    print_field("Conversions", &metrics.conversions.to_string());
    print_field("Talk time", &format_duration(metrics.talk_time_seconds));
}

// Recording lookup and stats export commands

use crate::output::{print_table_header, print_table_row, OutputFormat};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use leadline_agent::ControlApi;
use leadline_core::ControlConfig;

pub async fn recordings(config: &ControlConfig, output: OutputFormat, lead_id: &str) -> Result<()> {
    let api = ControlApi::from_config(config)?;
    let recordings = api.recording_lookup(lead_id).await?;

    if output.is_text() {
        if recordings.is_empty() {
            println!("No recordings found");
            return Ok(());
        }
        print_table_header(&[("ID", 10), ("STARTED", 20), ("AGENT", 10), ("LOCATION", 40)]);
        for rec in &recordings {
            print_table_row(&[
                (&rec.recording_id, 10),
                (&rec.started_at, 20),
                (&rec.agent_user, 10),
                (&rec.location, 40),
            ]);
        }
    } else {
        output.print_value(&recordings)?;
    }
    Ok(())
}

pub async fn stats(config: &ControlConfig, output: OutputFormat, from: &str, to: &str) -> Result<()> {
    let start = parse_bound(from, NaiveTime::MIN).context("invalid --from")?;
    let end = parse_bound(to, end_of_day()).context("invalid --to")?;

    let api = ControlApi::from_config(config)?;
    let rows = api.agent_stats_export(start, end).await?;

    if output.is_text() {
        if rows.is_empty() {
            println!("No agent activity in range");
            return Ok(());
        }
        print_table_header(&[("AGENT", 10), ("NAME", 22), ("VALUES", 40)]);
        for row in &rows {
            print_table_row(&[
                (&row.agent_user, 10),
                (&row.full_name, 22),
                (&row.values.join(" "), 40),
            ]);
        }
    } else {
        output.print_value(&rows)?;
    }
    Ok(())
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// Full timestamp, or a bare date completed with `time_of_day`
fn parse_bound(value: &str, time_of_day: NaiveTime) -> Result<NaiveDateTime> {
    let value = value.trim();
    if let Ok(at) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(at);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS, got '{}'", value))?;
    Ok(date.and_time(time_of_day))
}

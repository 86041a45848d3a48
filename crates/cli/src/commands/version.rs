// Version command - one connectivity check

use crate::output::{print_field, OutputFormat};
use anyhow::Result;
use leadline_agent::{ConnectivityMonitor, ControlApi};
use leadline_core::{Connectivity, ControlConfig};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct VersionReport {
    base_url: String,
    connectivity: Connectivity,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

pub async fn run(config: &ControlConfig, output: OutputFormat) -> Result<()> {
    let api = ControlApi::from_config(config)?;
    let monitor = ConnectivityMonitor::new(api, config.connectivity_interval)?;
    let connectivity = monitor.check_once().await;

    let report = VersionReport {
        base_url: config.base_url.clone(),
        connectivity,
        version: monitor.platform_version(),
    };

    if output.is_text() {
        print_field("Platform", &report.base_url);
        print_field("Status", &report.connectivity.to_string());
        if let Some(version) = &report.version {
            print_field("Version", version);
        }
    } else {
        output.print_value(&report)?;
    }

    if let Connectivity::Disconnected(reason) = report.connectivity {
        anyhow::bail!("platform unreachable: {}", reason);
    }
    Ok(())
}

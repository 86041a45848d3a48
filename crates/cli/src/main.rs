// Leadline CLI
//
// Decision: Use clap derive for ergonomic argument parsing.
// Decision: Support text/json/yaml output formats for scripting.
// Decision: Logs go to stderr so they never mix with command output.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leadline_core::ControlConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "leadline=info";
const QUIET_LOG_FILTER: &str = "leadline=warn";

#[derive(Parser)]
#[command(name = "leadline")]
#[command(about = "Leadline CLI - Call-center agent control")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the platform is reachable and print its version
    Version,

    /// Add, update and search leads
    Lead {
        #[command(subcommand)]
        command: commands::lead::LeadCommand,
    },

    /// List recordings of a lead
    Recordings {
        /// Platform lead ID
        #[arg(long)]
        lead_id: String,
    },

    /// Export agent statistics for a time range
    Stats {
        /// Range start (YYYY-MM-DD HH:MM:SS or YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Range end (YYYY-MM-DD HH:MM:SS or YYYY-MM-DD)
        #[arg(long)]
        to: String,
    },

    /// Ask the assistant a question
    Ask {
        /// Question text
        message: String,

        /// Who is asking
        #[arg(long, default_value = "agent", value_parser = ["agent", "supervisor", "admin"])]
        role: String,

        /// Chat-completion endpoint
        #[arg(long, env = "LEADLINE_ASSISTANT_URL")]
        url: String,
    },

    /// Run an interactive agent session
    Session {
        /// Campaign to log into
        #[arg(long)]
        campaign: String,

        /// Phone login of the agent's device
        #[arg(long)]
        phone: String,
    },
}

fn init_tracing(quiet: bool) {
    let default = if quiet { QUIET_LOG_FILTER } else { DEFAULT_LOG_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn load_config() -> Result<ControlConfig> {
    ControlConfig::from_env().context("Leadline is not configured")
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; variables may come from the environment
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.quiet);
    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Version => commands::version::run(&load_config()?, output_format).await,
        Commands::Lead { command } => {
            commands::lead::run(command, &load_config()?, output_format, cli.quiet).await
        }
        Commands::Recordings { lead_id } => {
            commands::reports::recordings(&load_config()?, output_format, &lead_id).await
        }
        Commands::Stats { from, to } => {
            commands::reports::stats(&load_config()?, output_format, &from, &to).await
        }
        Commands::Ask { message, role, url } => {
            commands::ask::run(output_format, &url, message, &role).await
        }
        Commands::Session { campaign, phone } => {
            commands::session::run(&load_config()?, output_format, cli.quiet, campaign, phone).await
        }
    }
}

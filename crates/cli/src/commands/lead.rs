// Lead commands

use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use leadline_agent::ControlApi;
use leadline_core::{ControlConfig, LeadDraft, LeadUpdate};
use serde::Serialize;

#[derive(Subcommand)]
pub enum LeadCommand {
    /// Add a lead to a list
    Add {
        /// Phone number, digits only
        #[arg(long)]
        phone: String,

        /// List to add the lead to
        #[arg(long)]
        list_id: Option<String>,

        #[command(flatten)]
        fields: LeadFields,
    },

    /// Update fields of an existing lead
    Update {
        /// Platform lead ID
        #[arg(long)]
        lead_id: String,

        /// New phone number
        #[arg(long)]
        phone: Option<String>,

        /// New lead status
        #[arg(long)]
        status: Option<String>,

        #[command(flatten)]
        fields: LeadFields,
    },

    /// Find leads by phone number
    Search {
        /// Phone number, digits only
        phone: String,
    },
}

/// Optional lead fields shared by add and update
#[derive(Args, Default)]
pub struct LeadFields {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub state: Option<String>,
    #[arg(long)]
    pub postal_code: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub comments: Option<String>,
}

#[derive(Debug, Serialize)]
struct AddedLead {
    lead_id: String,
    phone_number: String,
}

#[derive(Debug, Serialize)]
struct SearchResult {
    phone_number: String,
    lead_ids: Vec<String>,
}

pub async fn run(
    command: LeadCommand,
    config: &ControlConfig,
    output: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let api = ControlApi::from_config(config)?;
    match command {
        LeadCommand::Add {
            phone,
            list_id,
            fields,
        } => add(&api, output, quiet, draft(phone, list_id, fields)).await,
        LeadCommand::Update {
            lead_id,
            phone,
            status,
            fields,
        } => update(&api, output, quiet, &lead_id, lead_update(phone, status, fields)).await,
        LeadCommand::Search { phone } => search(&api, output, phone).await,
    }
}

fn draft(phone: String, list_id: Option<String>, fields: LeadFields) -> LeadDraft {
    LeadDraft {
        list_id,
        first_name: fields.first_name,
        last_name: fields.last_name,
        address1: fields.address,
        city: fields.city,
        state: fields.state,
        postal_code: fields.postal_code,
        email: fields.email,
        comments: fields.comments,
        ..LeadDraft::new(phone)
    }
}

fn lead_update(phone: Option<String>, status: Option<String>, fields: LeadFields) -> LeadUpdate {
    LeadUpdate {
        phone_number: phone,
        first_name: fields.first_name,
        last_name: fields.last_name,
        address1: fields.address,
        city: fields.city,
        state: fields.state,
        postal_code: fields.postal_code,
        email: fields.email,
        comments: fields.comments,
        status,
    }
}

async fn add(api: &ControlApi, output: OutputFormat, quiet: bool, draft: LeadDraft) -> Result<()> {
    let lead_id = api.add_lead(&draft).await?;
    let added = AddedLead {
        lead_id,
        phone_number: draft.phone_number,
    };

    if output.is_text() {
        if quiet {
            println!("{}", added.lead_id);
        } else {
            println!("Added lead: {}", added.lead_id);
            print_field("Phone", &added.phone_number);
        }
    } else {
        output.print_value(&added)?;
    }
    Ok(())
}

async fn update(
    api: &ControlApi,
    output: OutputFormat,
    quiet: bool,
    lead_id: &str,
    update: LeadUpdate,
) -> Result<()> {
    let result = api.update_lead(lead_id, &update).await?;

    if output.is_text() {
        if !quiet {
            println!("Updated lead: {}", lead_id);
            print_field("Platform", result.message());
        }
    } else {
        output.print_value(&result)?;
    }
    Ok(())
}

async fn search(api: &ControlApi, output: OutputFormat, phone_number: String) -> Result<()> {
    let lead_ids = api.lead_search(&phone_number).await?;
    let result = SearchResult {
        phone_number,
        lead_ids,
    };

    if output.is_text() {
        if result.lead_ids.is_empty() {
            println!("No leads found");
            return Ok(());
        }
        print_table_header(&[("LEAD ID", 12), ("PHONE", 16)]);
        for id in &result.lead_ids {
            print_table_row(&[(id, 12), (&result.phone_number, 16)]);
        }
    } else {
        output.print_value(&result)?;
    }
    Ok(())
}

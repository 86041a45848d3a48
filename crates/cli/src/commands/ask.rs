// Ask command - one question to the assistant

use std::time::Duration;

use crate::output::OutputFormat;
use anyhow::Result;
use leadline_agent::{AssistantClient, AssistantRequest, ReplyKind, UserRole};

const ASK_TIMEOUT: Duration = Duration::from_secs(60);

fn role(value: &str) -> UserRole {
    match value {
        "supervisor" => UserRole::Supervisor,
        "admin" => UserRole::Admin,
        _ => UserRole::Agent,
    }
}

pub async fn run(output: OutputFormat, url: &str, message: String, role_name: &str) -> Result<()> {
    let client = AssistantClient::new(url, ASK_TIMEOUT)?;
    let request = AssistantRequest::new(message).with_role(role(role_name));

    let reply = match client.ask(&request).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "assistant request failed");
            anyhow::bail!("{}", e.notification());
        }
    };

    if output.is_text() {
        let label = match reply.kind {
            ReplyKind::Suggestion => "Suggestion: ",
            ReplyKind::Analysis => "Analysis: ",
            ReplyKind::Text | ReplyKind::Other => "",
        };
        println!("{}{}", label, reply.response);
    } else {
        output.print_value(&reply)?;
    }
    Ok(())
}

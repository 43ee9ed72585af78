use anyhow::Result;
use console::style;
use serde_json::Value;

use super::RemoteArgs;
use crate::core::terminal::{print_error, print_success, styled_status};

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(|v| v.as_str()).unwrap_or("-")
}

/// Send the request and unwrap the `{"success": ...}` envelope, printing failures.
async fn call(request: reqwest::RequestBuilder, token: Option<&str>) -> Option<Value> {
    let request = match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    };
    match request.send().await {
        Ok(resp) => match resp.json::<Value>().await {
            Ok(body) if body.get("success").and_then(|v| v.as_bool()) == Some(true) => Some(body),
            Ok(body) => {
                let err = body
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown error");
                print_error(&format!("Error: {}", err));
                None
            }
            Err(e) => {
                print_error(&format!("Error: unexpected response - {}", e));
                None
            }
        },
        Err(e) => {
            print_error(&format!(
                "Error: Could not reach agentdeck - {}. Is the server running?",
                e
            ));
            None
        }
    }
}

fn print_execution(record: &Value) {
    let status = str_field(record, "status");
    let duration = record
        .get("durationMs")
        .and_then(|v| v.as_i64())
        .map(|ms| format!("{:.1}s", ms as f64 / 1000.0))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {} {}  {}  {}  {}",
        style("→").cyan(),
        style(str_field(record, "executionId")).white().bold(),
        styled_status(status),
        style(str_field(record, "startTime")).dim(),
        duration
    );
    if let Some(error) = record.get("error").and_then(|v| v.as_str()) {
        println!("      {}", style(error).red());
    }
}

pub async fn run_agent_command(sub_cmd: &str, args: RemoteArgs) -> Result<()> {
    let client = reqwest::Client::new();
    let token = args.token.as_deref();
    let agent_id = args.positional.first();

    match (sub_cmd, agent_id) {
        ("list" | "ls", _) => {
            let url = format!("{}/api/agents", args.api_url);
            let Some(body) = call(client.get(&url), token).await else {
                return Ok(());
            };
            let agents = body
                .get("agents")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            if agents.is_empty() {
                println!("  {} No agents yet.", style("●").dim());
                return Ok(());
            }
            println!();
            for agent in &agents {
                println!(
                    "  {} {}  {}  {}",
                    style("→").cyan(),
                    style(str_field(agent, "name")).white().bold(),
                    styled_status(str_field(agent, "status")),
                    style(str_field(agent, "id")).dim()
                );
                println!(
                    "      schedule: {}  next: {}  last: {}",
                    str_field(agent, "schedule"),
                    str_field(agent, "nextRun"),
                    str_field(agent, "lastRun")
                );
            }
            println!();
        }
        ("run" | "execute", Some(agent_id)) => {
            let url = format!("{}/api/agents/{}/execute", args.api_url, agent_id);
            if let Some(body) = call(client.post(&url), token).await {
                print_success(&format!(
                    "Execution {} started.",
                    str_field(&body, "executionId")
                ));
                println!(
                    "  {} agentdeck agent logs {}\n",
                    style("→").cyan(),
                    agent_id
                );
            }
        }
        ("logs", Some(agent_id)) => {
            let url = format!("{}/api/agents/{}/logs", args.api_url, agent_id);
            let Some(body) = call(client.get(&url), token).await else {
                return Ok(());
            };
            let mut logs = body
                .get("logs")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            if let Some(limit) = args.limit {
                logs.truncate(limit as usize);
            }
            if logs.is_empty() {
                println!("  {} No executions for agent '{}'.", style("●").dim(), agent_id);
                return Ok(());
            }
            println!();
            for record in &logs {
                print_execution(record);
            }
            println!();
        }
        _ => {
            println!("{}", style("Usage: agentdeck agent <command>").bold());
            println!("  • list          List your agents");
            println!("  • run <id>      Start an execution now");
            println!("  • logs <id>     Show execution history (--limit <n>)");
            println!("\n  Options: --api-url <url> --token <token>");
        }
    }
    Ok(())
}

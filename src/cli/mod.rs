mod agents;
mod serve;
mod tokens;
mod users;

use anyhow::Result;
use console::style;
use std::path::PathBuf;

use crate::core::config::AppConfig;
use crate::core::store::Store;
use crate::core::terminal::{self, GuideSection, print_error};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8470";

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Server")
        .command("serve", "Start the dashboard API, scheduler and runner")
        .text("--config <path>  --host <addr>  --port <n>  --seed-demo")
        .print();

    GuideSection::new("Accounts (local database)")
        .command("user add <name> <email>", "Create a user")
        .command("user list", "List users")
        .command("token create <user> <name>", "Issue an API token")
        .command("token list <user>", "List a user's tokens")
        .command("token revoke <user> <id>", "Revoke a token")
        .print();

    GuideSection::new("Agents (running server)")
        .command("agent list", "List your agents")
        .command("agent run <id>", "Start an execution now")
        .command("agent logs <id>", "Show execution history")
        .text("--api-url <url>  --token <token>  (or AGENTDECK_TOKEN)")
        .blank()
        .hint("agentdeck serve --seed-demo", "start with the demo dataset")
        .print();

    println!(
        "\n {} {} <command> [subcommand]\n",
        style("Usage:").bold(),
        style("agentdeck").green()
    );
}

/// Value following `args[i]`, advancing past it when present.
fn take_value(args: &[String], i: &mut usize) -> Option<String> {
    let value = args.get(*i + 1).cloned();
    *i += if value.is_some() { 2 } else { 1 };
    value
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ServeArgs {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub seed_demo: bool,
}

pub(crate) fn parse_serve_flags(args: &[String], start: usize) -> ServeArgs {
    let mut parsed = ServeArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => parsed.config = take_value(args, &mut i).map(PathBuf::from),
            "--host" => parsed.host = take_value(args, &mut i),
            "--port" | "-p" => {
                parsed.port = take_value(args, &mut i).and_then(|p| p.parse().ok())
            }
            "--seed-demo" => {
                parsed.seed_demo = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    parsed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RemoteArgs {
    pub api_url: String,
    pub token: Option<String>,
    pub limit: Option<u32>,
    pub positional: Vec<String>,
}

pub(crate) fn parse_remote_flags(args: &[String], start: usize) -> RemoteArgs {
    let mut parsed = RemoteArgs {
        api_url: DEFAULT_API_URL.to_string(),
        token: None,
        limit: None,
        positional: Vec::new(),
    };
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-url" => {
                if let Some(url) = take_value(args, &mut i) {
                    parsed.api_url = url.trim_end_matches('/').to_string();
                }
            }
            "--token" | "-t" => parsed.token = take_value(args, &mut i),
            "--limit" | "-n" => parsed.limit = take_value(args, &mut i).and_then(|n| n.parse().ok()),
            other => {
                parsed.positional.push(other.to_string());
                i += 1;
            }
        }
    }
    if parsed.token.is_none() {
        parsed.token = std::env::var("AGENTDECK_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
    }
    parsed
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LocalArgs {
    pub config: Option<PathBuf>,
    pub positional: Vec<String>,
}

pub(crate) fn parse_local_flags(args: &[String], start: usize) -> LocalArgs {
    let mut parsed = LocalArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => parsed.config = take_value(args, &mut i).map(PathBuf::from),
            other => {
                parsed.positional.push(other.to_string());
                i += 1;
            }
        }
    }
    parsed
}

/// Open the database the server would use for the given config file.
async fn open_local_store(config: Option<&std::path::Path>) -> Result<Store> {
    let config = AppConfig::load(config).await?;
    Store::open(config.database_path()).await
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or("");
    let sub_cmd = args.get(2).map(String::as_str).unwrap_or("");

    match cmd {
        "serve" => serve::run_server(parse_serve_flags(&args, 2)).await,
        "user" | "users" => users::run_user_command(sub_cmd, parse_local_flags(&args, 3)).await,
        "token" | "tokens" => {
            tokens::run_token_command(sub_cmd, parse_local_flags(&args, 3)).await
        }
        "agent" | "agents" => {
            agents::run_agent_command(sub_cmd, parse_remote_flags(&args, 3)).await
        }
        "" | "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command '{}'.", other));
            print_help();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn parse_serve_flags_reads_overrides() {
        let args = argv(&[
            "agentdeck",
            "serve",
            "--config",
            "/tmp/deck.toml",
            "--host",
            "0.0.0.0",
            "--port",
            "9001",
            "--seed-demo",
        ]);
        let parsed = parse_serve_flags(&args, 2);
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/deck.toml")));
        assert_eq!(parsed.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(parsed.port, Some(9001));
        assert!(parsed.seed_demo);
    }

    #[test]
    fn parse_serve_flags_ignores_bad_port_and_dangling_flag() {
        let args = argv(&["agentdeck", "serve", "--port", "lots", "--host"]);
        let parsed = parse_serve_flags(&args, 2);
        assert_eq!(parsed.port, None);
        assert_eq!(parsed.host, None);
    }

    #[test]
    fn parse_remote_flags_collects_positionals() {
        let args = argv(&[
            "agentdeck",
            "agent",
            "logs",
            "agent-1",
            "--api-url",
            "http://deck.local:9000/",
            "--token",
            "adk_abc",
            "--limit",
            "5",
        ]);
        let parsed = parse_remote_flags(&args, 3);
        assert_eq!(parsed.positional, vec!["agent-1".to_string()]);
        assert_eq!(parsed.api_url, "http://deck.local:9000");
        assert_eq!(parsed.token.as_deref(), Some("adk_abc"));
        assert_eq!(parsed.limit, Some(5));
    }

    #[test]
    fn parse_local_flags_splits_config_from_positionals() {
        let args = argv(&[
            "agentdeck",
            "user",
            "add",
            "Ada",
            "--config",
            "deck.toml",
            "ada@example.com",
        ]);
        let parsed = parse_local_flags(&args, 3);
        assert_eq!(parsed.config, Some(PathBuf::from("deck.toml")));
        assert_eq!(
            parsed.positional,
            vec!["Ada".to_string(), "ada@example.com".to_string()]
        );
    }
}

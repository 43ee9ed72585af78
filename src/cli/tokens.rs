use anyhow::Result;
use console::style;

use super::{LocalArgs, open_local_store};
use crate::core::store::Store;
use crate::core::store::types::UserRecord;
use crate::core::terminal::{print_error, print_success};

async fn resolve_user(store: &Store, id_or_email: &str) -> Result<Option<UserRecord>> {
    let user = store.find_user(id_or_email).await?;
    if user.is_none() {
        print_error(&format!("Error: no user '{}'.", id_or_email));
    }
    Ok(user)
}

pub async fn run_token_command(sub_cmd: &str, args: LocalArgs) -> Result<()> {
    match sub_cmd {
        "create" => {
            let [user, name] = args.positional.as_slice() else {
                println!(
                    "{}",
                    style("Usage: agentdeck token create <user> <name>").bold()
                );
                println!("  Example: agentdeck token create ada@example.com laptop");
                return Ok(());
            };
            let store = open_local_store(args.config.as_deref()).await?;
            let Some(user) = resolve_user(&store, user).await? else {
                return Ok(());
            };
            let (token, _) = store.create_api_token(&user.id, name.trim()).await?;
            println!();
            print_success(&format!("API token '{}' created for {}.", name, user.name));
            println!(
                "\n  {} {}\n",
                style("Token:").bold(),
                style(&token).green().bold()
            );
            println!(
                "  {} Save this token now. It will not be shown again.",
                style("⚠").yellow()
            );
            println!(
                "  {} Use it with: Authorization: Bearer {}\n",
                style("→").cyan(),
                token
            );
        }
        "list" | "ls" => {
            let [user] = args.positional.as_slice() else {
                println!("{}", style("Usage: agentdeck token list <user>").bold());
                return Ok(());
            };
            let store = open_local_store(args.config.as_deref()).await?;
            let Some(user) = resolve_user(&store, user).await? else {
                return Ok(());
            };
            let tokens = store.list_api_tokens(&user.id).await?;
            if tokens.is_empty() {
                println!("  {} No API tokens for {}.", style("●").dim(), user.name);
                return Ok(());
            }
            println!(
                "\n  {} API tokens for {}:\n",
                style("●").cyan(),
                style(&user.name).bold()
            );
            for tk in &tokens {
                println!(
                    "  {} {} (id: {})  created: {}",
                    style("→").cyan(),
                    style(&tk.name).white().bold(),
                    style(&tk.id).dim(),
                    style(tk.created_at.format("%Y-%m-%d %H:%M")).dim()
                );
            }
            println!();
        }
        "revoke" | "delete" | "rm" => {
            let [user, token_id] = args.positional.as_slice() else {
                println!(
                    "{}",
                    style("Usage: agentdeck token revoke <user> <token_id>").bold()
                );
                return Ok(());
            };
            let store = open_local_store(args.config.as_deref()).await?;
            let Some(user) = resolve_user(&store, user).await? else {
                return Ok(());
            };
            if store.delete_api_token(&user.id, token_id).await? {
                print_success("Token revoked.");
            } else {
                print_error("Error: Token not found");
            }
        }
        _ => {
            println!("{}", style("Usage: agentdeck token <command>").bold());
            println!("  • create <user> <name>   Create a new API token");
            println!("  • list <user>            List a user's API tokens");
            println!("  • revoke <user> <id>     Revoke an API token");
            println!("\n  <user> is a user id or email. Options: --config <path>");
        }
    }
    Ok(())
}

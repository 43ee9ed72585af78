use anyhow::Result;
use console::style;

use super::{LocalArgs, open_local_store};
use crate::core::terminal::{print_error, print_success};

pub async fn run_user_command(sub_cmd: &str, args: LocalArgs) -> Result<()> {
    match sub_cmd {
        "add" | "create" => {
            let [name, email] = args.positional.as_slice() else {
                println!(
                    "{}",
                    style("Usage: agentdeck user add <name> <email> [--config <path>]").bold()
                );
                return Ok(());
            };
            let store = open_local_store(args.config.as_deref()).await?;
            match store.create_user(name, email).await {
                Ok(user) => {
                    print_success(&format!("User '{}' created.", user.name));
                    println!("  {} {}", style("id:").bold(), style(&user.id).green());
                    println!(
                        "  {} agentdeck token create {} <name>\n",
                        style("→").cyan(),
                        user.id
                    );
                }
                Err(e) => print_error(&format!("Error: {}", e)),
            }
        }
        "list" | "ls" => {
            let store = open_local_store(args.config.as_deref()).await?;
            let users = store.list_users().await?;
            if users.is_empty() {
                println!("  {} No users yet.", style("●").dim());
                return Ok(());
            }
            println!();
            for user in &users {
                println!(
                    "  {} {} <{}>  {}",
                    style("→").cyan(),
                    style(&user.name).white().bold(),
                    user.email,
                    style(&user.id).dim()
                );
            }
            println!();
        }
        _ => {
            println!("{}", style("Usage: agentdeck user <command>").bold());
            println!("  • add <name> <email>   Create a user");
            println!("  • list                 List users");
        }
    }
    Ok(())
}

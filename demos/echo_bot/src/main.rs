//! Echo Bot Example
//!
//! Connects every account in `config/QQGuild.yaml` and answers:
//!
//! ```text
//! /echo <text>   echo text back
//! /ping          Pong!
//! /info          where the message came from
//! #QQ频道账号     list accounts (permission-gated)
//! #QQ频道设置...  add or remove an account (permission-gated)
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --master 1234567890
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use guild_adapter_qqguild::{ConnectEvent, MessageEvent, MessageType, Role};
use guild_runtime::{GuildRuntime, RuntimeCommands};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(about = "Echo bot on the QQ guild adapter")]
struct Args {
    /// Directory holding QQGuild.yaml and runtime.yaml.
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// User ids allowed to run every account command.
    #[arg(long)]
    master: Vec<String>,
}

async fn handle_message(msg: &MessageEvent, commands: &RuntimeCommands, masters: &[String]) {
    let text = msg.plain_text();
    let text = text.trim();
    let message = msg.message();

    match message.message_type {
        MessageType::Private => info!("[Private] {} ({}): {}", message.sender.nickname, message.user_id, text),
        MessageType::Group => info!(
            "[Group {}] {} ({}): {}",
            message.group_id, message.sender.nickname, message.user_id, text
        ),
    }

    let role = Role::from_member_roles(&message.sender.roles, masters.contains(&message.user_id));
    let reply = match commands.handle(text, role).await {
        Ok(Some(reply)) => Some(reply),
        Ok(None) => match text {
            "/ping" => Some("Pong! 🏓".to_string()),
            "/info" => Some(format!(
                "type: {}\nuser: {}\ngroup: {}",
                message.message_type.as_str(),
                message.user_id,
                message.group_id
            )),
            _ => text.strip_prefix("/echo ").map(str::to_string),
        },
        Err(e) => {
            error!("Account command failed: {e:#}");
            None
        }
    };

    if let Some(reply) = reply
        && let Err(e) = msg.reply(reply).await
    {
        error!("Failed to send reply: {:?}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let runtime = GuildRuntime::builder().config_dir(&args.config_dir).build()?;

    let commands = Arc::new(runtime.commands());
    let masters = Arc::new(args.master);
    let mut events = runtime.events().subscribe();

    tokio::spawn(async move {
        while let Some(emitted) = events.recv().await {
            match emitted.name() {
                "message" => {
                    if let Some(msg) = emitted.event.downcast_ref::<MessageEvent>() {
                        handle_message(msg, &commands, &masters).await;
                    }
                }
                "connect" => {
                    if let Some(event) = emitted.event.downcast_ref::<ConnectEvent>() {
                        info!("{} ({}) is online", event.bot().nickname(), event.bot().id());
                    }
                }
                _ => {}
            }
        }
    });

    runtime.run().await?;
    Ok(())
}

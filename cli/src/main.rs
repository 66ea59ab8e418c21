use std::io::Write;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use claude_chat_client_core::{ChatClientCore, ClientConfig, CreateChatRequest};
use futures::StreamExt;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod render;

use render::CompletionPrinter;

#[derive(Parser)]
#[command(name = "claude-chat")]
#[command(about = "Chat with Claude through a claude.ai API bridge")]
#[command(version)]
struct Cli {
    /// Base URL of the API bridge (defaults to $CLAUDE_CHAT_BASE_URL or http://127.0.0.1:8000)
    #[arg(short = 'u', long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds (defaults to $CLAUDE_CHAT_TIMEOUT_S or 3600)
    #[arg(long, global = true)]
    timeout_s: Option<f64>,

    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List organizations available to the configured session
    Orgs,
    /// Send a message and stream the reply
    Chat {
        /// Organization id; the first organization is used when omitted
        #[arg(short, long)]
        org: Option<String>,

        /// Continue an existing conversation (see `chats` and `new-chat`)
        #[arg(long)]
        chat_id: Option<String>,

        message: String,
    },
    /// List conversations of an organization
    Chats {
        /// Organization id; the first organization is used when omitted
        #[arg(short, long)]
        org: Option<String>,
    },
    /// Create an empty conversation and print its id
    NewChat {
        #[arg(short, long)]
        org: Option<String>,

        #[arg(long, default_value = "")]
        name: String,
    },
    /// Check that the bridge is up and has a session configured
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = Level::from_str(&cli.log_level)
        .map_err(|_| anyhow!("Invalid log level: {}", cli.log_level))?;

    // RUST_LOG wins over --log-level when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(timeout_s) = cli.timeout_s {
        config = config.with_timeout_s(timeout_s)?;
    }
    tracing::debug!("Base URL: {}", config.base_url);

    let client = ChatClientCore::new(config)?;
    let result = match cli.command {
        Command::Orgs => list_organizations(&client).await,
        Command::Chat {
            org,
            chat_id,
            message,
        } => chat(&client, org, chat_id, &message).await,
        Command::Chats { org } => list_chats(&client, org).await,
        Command::NewChat { org, name } => new_chat(&client, org, name).await,
        Command::Health => health(&client).await,
    };

    if let Some(last_error) = client.last_error() {
        tracing::error!("{}", last_error);
    }
    result
}

async fn list_organizations(client: &ChatClientCore) -> anyhow::Result<()> {
    let organizations = client
        .get_organizations()
        .await
        .context("Failed to fetch organizations")?;

    if organizations.is_empty() {
        tracing::warn!("No organizations available");
    }
    let mut stdout = std::io::stdout().lock();
    for organization in organizations {
        writeln!(stdout, "{}\t{}", organization.id, organization.name)?;
    }
    Ok(())
}

async fn chat(
    client: &ChatClientCore,
    org: Option<String>,
    chat_id: Option<String>,
    message: &str,
) -> anyhow::Result<()> {
    if message.trim().is_empty() {
        return Err(anyhow!("Message must not be empty"));
    }

    let org_id = resolve_org(client, org).await?;

    let mut events = match &chat_id {
        Some(chat_id) => client.stream_message(&org_id, chat_id, message).await,
        None => client.stream_chat(&org_id, message).await,
    }
    .context("Chat error occurred")?;

    let mut printer = CompletionPrinter::new(std::io::stdout());
    while let Some(event) = events.next().await {
        let event = event.context("Chat error occurred")?;
        printer.print(&event)?;
    }
    printer.finish()?;

    tracing::debug!("received {} events", printer.events_seen());
    Ok(())
}

async fn list_chats(client: &ChatClientCore, org: Option<String>) -> anyhow::Result<()> {
    let org_id = resolve_org(client, org).await?;
    let chats = client
        .list_chats(&org_id)
        .await
        .context("Failed to fetch chats")?;

    let mut stdout = std::io::stdout().lock();
    for chat in chats {
        writeln!(
            stdout,
            "{}\t{}\t{}",
            chat.uuid,
            chat.updated_at.as_deref().unwrap_or("-"),
            chat.name
        )?;
    }
    Ok(())
}

async fn new_chat(client: &ChatClientCore, org: Option<String>, name: String) -> anyhow::Result<()> {
    let org_id = resolve_org(client, org).await?;
    let chat = client
        .create_chat(&org_id, &CreateChatRequest::new(name))
        .await
        .context("Failed to create chat")?;
    println!("{}", chat.uuid);
    Ok(())
}

/// Uses the given organization, or the first one the session can see.
async fn resolve_org(client: &ChatClientCore, org: Option<String>) -> anyhow::Result<String> {
    if let Some(org_id) = org {
        return Ok(org_id);
    }
    client
        .get_organizations()
        .await
        .context("Failed to fetch organizations")?
        .into_iter()
        .next()
        .map(|organization| organization.id)
        .ok_or_else(|| anyhow!("No organizations available"))
}

async fn health(client: &ChatClientCore) -> anyhow::Result<()> {
    let status = client.health().await.context("Health check failed")?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

//! # parley
//!
//! Command-line client: listen on a channel, send one envelope, issue a GET
//! through the request dispatcher, and manage stored credentials.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use parley_channel::HandlerRegistry;
use parley_client::{ChannelCallbacks, ClientContext};
use parley_core::logging::{init_json_subscriber, init_subscriber};
use parley_core::{Credentials, Envelope, LinkInfo, LinkStatus, OperationType};
use parley_request::Outcome;
use parley_settings::{ClientSettings, get_settings, load_settings_from_path};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Parley command-line client.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Parley command-line client")]
struct Cli {
    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log filter, overriding the configured level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Open a channel and print inbound envelopes until Ctrl-C or link loss.
    Listen {
        /// Channel path, e.g. `/chat/42`.
        path: String,
        /// Extra operation types to print besides the built-in ones.
        #[arg(long = "op")]
        operations: Vec<String>,
    },
    /// Open a channel, send one envelope and print replies.
    Send {
        /// Channel path.
        path: String,
        /// Operation type, e.g. `send` or `append`.
        operation: String,
        /// JSON payload.
        data: String,
        /// How long to wait for replies, in milliseconds.
        #[arg(long, default_value = "5000")]
        wait_ms: u64,
    },
    /// Issue a GET through the request dispatcher and print the JSON body.
    Get {
        /// Request path, e.g. `/memo/1`.
        path: String,
        /// Query parameters as `key=value`.
        #[arg(long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
    },
    /// Store a session token and user id.
    Login {
        /// Session token.
        #[arg(long)]
        token: String,
        /// User id.
        #[arg(long)]
        user_id: String,
    },
    /// Remove stored credentials.
    Logout,
}

fn parse_pair(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

/// Operation types printed by `listen` without `--op`.
fn default_operations() -> Vec<OperationType> {
    vec![
        OperationType::Read,
        OperationType::Send,
        OperationType::Append,
        OperationType::Replace,
    ]
}

fn load(cli: &Cli) -> Result<ClientSettings> {
    match &cli.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(get_settings().clone()),
    }
}

/// Registry forwarding every listed operation to `tx`.
fn forwarding_registry(
    operations: Vec<OperationType>,
    tx: &mpsc::UnboundedSender<Envelope>,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    for op in operations {
        let tx = tx.clone();
        registry.register(op, move |env: &Envelope| {
            let _ = tx.send(env.clone());
        });
    }
    registry
}

/// Error out once the link has failed.
fn check_link(info: &LinkInfo) -> Result<()> {
    if info.status == LinkStatus::Failure {
        bail!("channel failed: {}", info.message);
    }
    Ok(())
}

async fn wait_for_link(ctx: &ClientContext, timeout: Duration) -> Result<()> {
    let mut rx = ctx.link().subscribe();
    let info = tokio::time::timeout(
        timeout,
        rx.wait_for(|info| info.status != LinkStatus::Loading),
    )
    .await
    .context("Timed out connecting")?
    .context("Link monitor closed")?
    .clone();
    check_link(&info)
}

async fn listen(ctx: &ClientContext, path: &str, extra: Vec<String>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut operations = default_operations();
    operations.extend(extra.into_iter().map(OperationType::from));
    let registry = forwarding_registry(operations, &tx);

    let _channel = ctx.open_channel(path, registry, ChannelCallbacks::new())?;
    let mut link = ctx.link().subscribe();
    check_link(&link.borrow_and_update())?;

    loop {
        tokio::select! {
            Some(env) = rx.recv() => println!("{}", serde_json::to_string(&env)?),
            changed = link.changed() => {
                if changed.is_err() {
                    break;
                }
                let info = link.borrow_and_update().clone();
                match info.status {
                    LinkStatus::Success => info!(%path, "listening"),
                    LinkStatus::Failure => bail!("channel failed: {}", info.message),
                    LinkStatus::Loading => {}
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for ctrl-c")?;
                break;
            }
        }
    }
    Ok(())
}

async fn send(ctx: &ClientContext, path: &str, operation: &str, data: &str, wait: Duration) -> Result<()> {
    let data: Value = serde_json::from_str(data).context("Payload is not valid JSON")?;
    let op = OperationType::from(operation);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let registry = forwarding_registry(vec![op.clone()], &tx);

    let channel = ctx.open_channel(path, registry, ChannelCallbacks::new())?;
    wait_for_link(ctx, ctx.settings().channel.liveness_deadline()).await?;
    let mut link = ctx.link().subscribe();
    check_link(&link.borrow_and_update())?;
    channel.send_envelope(&Envelope::new(op, data))?;
    relay_replies(&mut rx, &mut link, wait).await
}

/// Print replies until `wait` elapses, failing as soon as the link does.
async fn relay_replies(
    rx: &mut mpsc::UnboundedReceiver<Envelope>,
    link: &mut watch::Receiver<LinkInfo>,
    wait: Duration,
) -> Result<()> {
    let deadline = tokio::time::sleep(wait);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            Some(env) = rx.recv() => println!("{}", serde_json::to_string(&env)?),
            changed = link.changed() => {
                if changed.is_err() {
                    break;
                }
                check_link(&link.borrow_and_update())?;
            }
            () = &mut deadline => break,
        }
    }
    Ok(())
}

async fn get(ctx: &ClientContext, path: &str, query: &[(String, String)]) -> Result<()> {
    let http = ctx.http();
    let outcome = ctx
        .dispatcher()
        .dispatch(ctx.request_options(), |rc| async move {
            http.get_with_query::<Value, _>(&rc, path, query).await
        })
        .await;
    match outcome {
        Outcome::Success(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Outcome::Handled => Err(anyhow!(
            "request failed (client now at {})",
            ctx.navigator().current_path()
        )),
        Outcome::Unhandled(err) => Err(err.into()),
    }
}

async fn run(cli: Cli, settings: ClientSettings) -> Result<()> {
    let ctx = ClientContext::new(settings).context("Failed to build client")?;
    let result = match cli.command {
        Command::Listen { path, operations } => listen(&ctx, &path, operations).await,
        Command::Send {
            path,
            operation,
            data,
            wait_ms,
        } => send(&ctx, &path, &operation, &data, Duration::from_millis(wait_ms)).await,
        Command::Get { path, query } => get(&ctx, &path, &query).await,
        Command::Login { token, user_id } => ctx
            .login(Credentials::new(token, user_id))
            .map_err(Into::into),
        Command::Logout => ctx.logout().map_err(Into::into),
    };
    ctx.shutdown();
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level).to_owned();
    if settings.logging.json {
        init_json_subscriber(&level);
    } else {
        init_subscriber(&level);
    }

    run(cli, settings).await
}

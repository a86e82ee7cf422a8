// onionrelay — run an onion-routing overlay on one machine
//
// Every role (registry, relay, user endpoint) is an HTTP service on its own
// port. `launch` starts a whole overlay in one process; the other commands
// start or drive a single node.

mod api;
mod config;
mod server;

use anyhow::{Context, Result};
use api::{HttpClient, HttpDirectory, HttpTransport};
use clap::{Parser, Subcommand};
use colored::*;
use onionrelay_core::crypto::{export_private_key, export_public_key};
use onionrelay_core::{KeyPair, NodeDirectory, NodeId, Registry, RelayNode, UserId, UserNode};
use server::UserContext;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "onionrelay")]
#[command(about = "onionrelay — layered-encryption message relay overlay", long_about = None)]
#[command(version)]
struct Cli {
    /// Override the configured host
    #[arg(long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node registry
    Registry,
    /// Run one relay
    Relay {
        #[arg(long)]
        id: NodeId,
    },
    /// Run one user endpoint
    User {
        #[arg(long)]
        id: UserId,
    },
    /// Run a registry, relays 1..=N and users 1..=M in this process
    Launch {
        #[arg(long, default_value = "5")]
        relays: u32,
        #[arg(long, default_value = "2")]
        users: u32,
    },
    /// Ask a running user endpoint to send a message
    Send {
        #[arg(long)]
        from: UserId,
        #[arg(long)]
        to: UserId,
        message: String,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate a relay key pair and print it
    Keygen,
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set { key: String, value: String },
    Get { key: String },
}

/// Registration attempts before a relay gives up and serves anyway
const REGISTER_ATTEMPTS: u32 = 5;
const REGISTER_BACKOFF: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load()?;
    if let Some(host) = cli.host {
        config.set("host", &host)?;
    }

    match cli.command {
        Commands::Registry => cmd_registry(&config).await,
        Commands::Relay { id } => cmd_relay(&config, id).await,
        Commands::User { id } => cmd_user(&config, id).await,
        Commands::Launch { relays, users } => cmd_launch(&config, relays, users).await,
        Commands::Send { from, to, message } => cmd_send(&config, from, to, &message).await,
        Commands::Config { action } => cmd_config(config, action),
        Commands::Keygen => cmd_keygen(),
    }
}

// ============================================================================
// NODE STARTUP
// ============================================================================

fn http_client(config: &config::Config) -> HttpClient {
    HttpClient::new(config.host.clone(), config.request_timeout())
}

fn directory(config: &config::Config) -> Arc<HttpDirectory> {
    Arc::new(HttpDirectory::new(http_client(config), config.registry_port))
}

fn transport(config: &config::Config) -> Arc<HttpTransport> {
    Arc::new(HttpTransport::new(http_client(config)))
}

fn port_of(address: onionrelay_core::Address) -> Result<u16> {
    api::port_for(address).with_context(|| format!("Address {} is not a valid port", address))
}

/// Publish the relay's key. Failure is logged, never fatal.
async fn register_relay(relay: &RelayNode, directory: &dyn NodeDirectory) {
    for attempt in 1..=REGISTER_ATTEMPTS {
        match relay.register(directory).await {
            Ok(()) => return,
            Err(e) if attempt < REGISTER_ATTEMPTS => {
                tracing::debug!(
                    "Relay {} registration attempt {} failed: {}",
                    relay.node_id(),
                    attempt,
                    e
                );
                tokio::time::sleep(REGISTER_BACKOFF * attempt).await;
            }
            Err(e) => {
                tracing::warn!("Relay {} could not register: {}", relay.node_id(), e);
            }
        }
    }
}

/// Build a relay, start serving, then register it
fn start_relay(config: &config::Config, id: NodeId) -> Result<tokio::task::JoinHandle<()>> {
    let port = port_of(config.topology().relay_address(id))?;
    let relay = Arc::new(RelayNode::generate(id).context("Failed to generate relay keys")?);

    let handle = tokio::spawn(server::serve_relay(relay.clone(), transport(config), port));

    let directory = directory(config);
    tokio::spawn(async move {
        register_relay(&relay, directory.as_ref()).await;
    });

    Ok(handle)
}

fn start_user(config: &config::Config, id: UserId) -> Result<tokio::task::JoinHandle<()>> {
    let port = port_of(config.topology().user_address(id))?;
    let ctx = UserContext {
        user: Arc::new(UserNode::new(id, config.topology())),
        directory: directory(config),
        transport: transport(config),
    };
    Ok(tokio::spawn(server::serve_user(ctx, port)))
}

async fn cmd_registry(config: &config::Config) -> Result<()> {
    println!("{} Registry on port {}", "✓".green(), config.registry_port);
    server::serve_registry(Arc::new(Registry::new()), config.registry_port).await;
    Ok(())
}

async fn cmd_relay(config: &config::Config, id: NodeId) -> Result<()> {
    let handle = start_relay(config, id)?;
    println!(
        "{} Relay {} on port {}",
        "✓".green(),
        id,
        config.topology().relay_address(id)
    );
    handle.await.context("Relay server stopped")?;
    Ok(())
}

async fn cmd_user(config: &config::Config, id: UserId) -> Result<()> {
    let handle = start_user(config, id)?;
    println!(
        "{} User {} on port {}",
        "✓".green(),
        id,
        config.topology().user_address(id)
    );
    handle.await.context("User server stopped")?;
    Ok(())
}

async fn cmd_launch(config: &config::Config, relays: u32, users: u32) -> Result<()> {
    println!("{}", "onionrelay — Launching overlay...".bold());
    println!();

    let mut handles = vec![tokio::spawn(server::serve_registry(
        Arc::new(Registry::new()),
        config.registry_port,
    ))];
    println!("  {} Registry on port {}", "✓".green(), config.registry_port);

    for id in 1..=relays {
        handles.push(start_relay(config, id)?);
        println!(
            "  {} Relay {} on port {}",
            "✓".green(),
            id,
            config.topology().relay_address(id)
        );
    }

    for id in 1..=users {
        handles.push(start_user(config, id)?);
        println!(
            "  {} User {} on port {}",
            "✓".green(),
            id,
            config.topology().user_address(id)
        );
    }

    if relays < onionrelay_core::CIRCUIT_LENGTH as u32 {
        println!();
        println!(
            "{} fewer than {} relays: every send will fail",
            "⚠".yellow(),
            onionrelay_core::CIRCUIT_LENGTH
        );
    }

    println!();
    println!("{}", "Try:".bold());
    println!(
        "  {}",
        "onionrelay send --from 1 --to 2 \"hello\"".bright_green()
    );

    futures::future::join_all(handles).await;
    Ok(())
}

// ============================================================================
// CLIENT COMMANDS
// ============================================================================

async fn cmd_send(config: &config::Config, from: UserId, to: UserId, message: &str) -> Result<()> {
    let user_port = port_of(config.topology().user_address(from))?;
    let result = api::send_via_user(&http_client(config), user_port, message, to)
        .await
        .with_context(|| format!("User {} could not send", from))?;

    println!("{} {} → {}: {}", "✓".green(), from, to, result);
    Ok(())
}

fn cmd_config(mut config: config::Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", "Configuration".bold());
            println!();
            for (key, value) in config.list() {
                println!("  {:<22} {}", key.bright_cyan(), value);
            }
            println!();
            println!("  {}", config::Config::config_file()?.display().to_string().dimmed());
        }

        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }
    }

    Ok(())
}

fn cmd_keygen() -> Result<()> {
    let keys = KeyPair::generate().context("Failed to generate key pair")?;
    let public = export_public_key(keys.public_key())?;
    let private = export_private_key(Some(keys.private_key()))?.unwrap_or_default();

    println!("{}", "Relay key pair".bold());
    println!();
    println!("Public key (SPKI, base64):");
    println!("  {}", public.bright_yellow());
    println!();
    println!("{}", "⚠️  Private key (PKCS#8, base64) — keep it secret:".bright_red().bold());
    println!("  {}", private);
    Ok(())
}

//! Guided Flow Display
//!
//! Customer-facing cart display for a retail checkout: pairs with the POS
//! backend through a one-time passcode and mirrors the live cart.

mod config;
mod console;
mod render;
mod shutdown;

use clap::Parser;
use config::ConfigLoader;
use gfd_core::connection::HttpTransport;
use gfd_core::identity::{FileIdentityStore, IdentityStore};
use gfd_core::session::{DisplaySession, SessionCommand};
use gfd_core::store::DisplaySnapshot;
use gfd_sdk::client::DisplayClient;
use shutdown::{shutdown_signal, spawn_config_reload_handler};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// Guided Flow Display - customer-facing cart display
#[derive(Parser, Debug)]
#[command(name = "gfd-display")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./gfd-config.toml")]
    config: PathBuf,

    /// Override the backend base URL (e.g., http://10.0.0.5:8081)
    #[arg(long, env = "GFD_BASE_URL")]
    base_url: Option<Url>,

    /// Pair with this one-time passcode on startup
    #[arg(long)]
    otp: Option<String>,
}

/// Buffer for UI actions waiting on the session.
const COMMAND_BUFFER: usize = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting gfd-display v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.base_url));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!(
        base_url = %loaded_config.session.base_url,
        "Configuration loaded from {:?}",
        args.config
    );

    let identity_store = FileIdentityStore::new(&loaded_config.identity_path);
    let paired = match identity_store.load() {
        Ok(identity) => identity.is_some(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read stored device identity");
            false
        }
    };

    let client = DisplayClient::new(loaded_config.session.base_url.clone());
    let transport = Arc::new(HttpTransport::new(client));
    let session = DisplaySession::new(loaded_config.session, transport, Box::new(identity_store));

    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (snapshot_tx, snapshot_rx) = watch::channel(DisplaySnapshot::default());

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(config_loader, command_tx.clone());
    let renderer = render::spawn_renderer(snapshot_rx.clone());
    let console = console::spawn_console(command_tx.clone(), snapshot_rx);

    match args.otp {
        Some(otp) => command_tx.send(SessionCommand::Connect { otp }).await?,
        None if paired => command_tx.send(SessionCommand::Reconnect).await?,
        None => tracing::info!("Display not paired yet, waiting for `connect <otp>`"),
    }

    let session_task = tokio::spawn(session.run(command_rx, shutdown_rx, snapshot_tx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    session_task.await?;

    // Signal the config reload handler to stop
    reload_notify.notify_one();
    console.abort();
    renderer.abort();

    tracing::info!("gfd-display shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

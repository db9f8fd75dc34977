mod action;
mod app;
mod app_state;
mod commands;
mod component;
mod components;
mod focus;
mod gesture;
mod icons;
mod intent;
mod matrix;
mod registry;
mod selection;
mod sync;
mod theme;
mod widgets;
mod workspace;

use std::path::PathBuf;

use clap::Parser;

use panel_proto::client::ControlClient;
use panel_proto::config::Config;
use panel_proto::platform;

use crate::selection::SelectionStore;

/// Terminal control panel for a model railway control server.
#[derive(Debug, Parser)]
#[command(name = "mspanel", version)]
struct Args {
    /// Control server base URL, overrides the config file.
    #[arg(long, short)]
    server: Option<String>,

    /// Config file to read instead of the default location.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // ── Load config ──────────────────────────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(server) = args.server {
        config.server.base_url = server;
    }
    config.validate()?;

    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = platform::log_path();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins over the config file.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.filter.clone());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("mspanel log: {}", log_path.display());

    tracing::info!("mspanel starting, server {}", config.server_url());

    let client = ControlClient::from_config(&config.server)?;
    let store = SelectionStore::new(platform::ui_state_path());

    let app = app::App::new(&config, client, store);
    app.run().await?;

    Ok(())
}

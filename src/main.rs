// Auction desk entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database
// 4. Seed teams and the bootstrap admin on first run
// 5. Spawn the WebSocket server for operator consoles
// 6. Wait for Ctrl+C, then shut down

use std::sync::Arc;

use anyhow::Context;
use auction_desk::app::Gateway;
use auction_desk::config;
use auction_desk::db::Database;
use auction_desk::ws_server;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Auction desk starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} teams, {} purse, {} slots",
        config.auction.name,
        config.teams.len(),
        config.auction.initial_purse,
        config.auction.slot_cap
    );

    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    let ws_port = config.ws_port;
    let gateway = Arc::new(Gateway::new(config, Arc::new(db)));
    gateway.bootstrap().context("first-run seeding failed")?;

    let server = tokio::spawn(async move {
        if let Err(e) = ws_server::run(ws_port, gateway).await {
            error!("WebSocket server error: {e}");
        }
    });

    info!("Application ready. Operator consoles connect on 127.0.0.1:{ws_port}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    // The server loops forever; cut it off and exit.
    server.abort();
    info!("Auction desk shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (keeping the terminal free for the
/// operator's shell).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("auction-desk.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auction_desk=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

//! Bulk player import from the league's CSV sheet.
//!
//! Reads config/auction.toml for the sheet path and league rules, upserts
//! every row into the player ledger, then recomputes team stats from
//! retained players (the same formula the auction reset uses).
//!
//! Usage:
//!   cargo run --bin import_players -- [sheet.csv] [--fresh]
//!
//! `--fresh` deletes the existing auction-pool players first for a clean
//! reseed (retained players are kept and updated in place).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use auction_desk::app::Gateway;
use auction_desk::config;
use auction_desk::db::Database;
use auction_desk::import;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut sheet: Option<PathBuf> = None;
    let mut fresh = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--fresh" => fresh = true,
            other => sheet = Some(PathBuf::from(other)),
        }
    }

    let config = config::load_config().context("failed to load configuration")?;
    let sheet = sheet.unwrap_or_else(|| PathBuf::from(&config.data.players));

    let db = Arc::new(Database::open(&config.db_path).context("failed to open database")?);

    // Teams must exist before retained players can be resolved to them.
    let initial_purse = config.auction.initial_purse;
    let slot_cap = config.auction.slot_cap;
    let gateway = Gateway::new(config, db.clone());
    gateway.bootstrap().context("first-run seeding failed")?;

    if fresh {
        let deleted = db.delete_pool_players()?;
        println!("Deleted {deleted} auction-pool players for fresh import.");
    }

    println!("Reading player data from {}...", sheet.display());
    let summary = import::import_players(&db, &sheet, initial_purse, slot_cap)
        .with_context(|| format!("import from {} failed", sheet.display()))?;

    println!(
        "Import complete. Added: {}, Updated: {}, Skipped: {}",
        summary.added, summary.updated, summary.skipped
    );

    for team in db.list_teams()? {
        println!(
            "Team: {}, Retained: {}, Cost: {}, Purse Left: {}, Slots Left: {}",
            team.name, team.players_taken, team.purse_spent, team.purse, team.slots_remaining
        );
    }

    Ok(())
}

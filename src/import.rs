// Bulk player import from the league's CSV sheet.
//
// The sheet is hand-maintained, so parsing is deliberately lenient:
// numeric cells may be blank, fractional, or junk (defaulting to zero),
// and malformed rows are skipped with a warning rather than failing the
// whole import. After the rows land, team stats are recomputed from
// retained players with the same formula the auction reset uses.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::auction::player::{NewPlayer, PlayerStats, PlayerStatus};
use crate::auction::AuctionError;
use crate::db::{Database, UpsertOutcome};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Storage(#[from] AuctionError),
}

/// Outcome counters for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Raw CSV serde struct (private)
// ---------------------------------------------------------------------------

/// One row of the import sheet. Everything is an optional string so a
/// half-filled sheet still deserializes; the lenient parsers below decide
/// what each cell means. Extra columns are ignored by the csv reader.
#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    #[serde(default)]
    player_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    is_retained: Option<String>,
    #[serde(default)]
    retaining_team_name: Option<String>,
    #[serde(default)]
    last_year_price: Option<String>,
    #[serde(default)]
    overall_matches: Option<String>,
    #[serde(default)]
    overall_runs: Option<String>,
    #[serde(default)]
    overall_wickets: Option<String>,
    #[serde(default)]
    overall_sr: Option<String>,
    #[serde(default)]
    overall_hs: Option<String>,
    #[serde(default)]
    batting_inn: Option<String>,
    #[serde(default)]
    batting_avg: Option<String>,
    #[serde(default)]
    bowling_inn: Option<String>,
    #[serde(default)]
    bowling_avg: Option<String>,
    #[serde(default)]
    econ: Option<String>,
    #[serde(default)]
    bbi: Option<String>,
}

// ---------------------------------------------------------------------------
// Lenient cell parsers
// ---------------------------------------------------------------------------

fn cell(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse an integer cell, accepting fractional text ("12.0" -> 12).
fn parse_u32(value: &Option<String>) -> u32 {
    cell(value)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32)
        .unwrap_or(0)
}

fn parse_f64(value: &Option<String>) -> f64 {
    cell(value)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Spreadsheet-style truthiness: TRUE/1/YES/T (any case).
fn truthy(value: &Option<String>) -> bool {
    matches!(
        cell(value).map(|s| s.to_uppercase()).as_deref(),
        Some("TRUE") | Some("1") | Some("YES") | Some("T")
    )
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Import player rows from any reader. Rows are upserted by player name;
/// retained players are assigned to their team at last year's price and
/// excluded from the auction pool. Team stats are NOT recomputed here;
/// callers follow up with `Database::recompute_team_stats` (or use
/// `import_players`, which does both).
pub fn import_from_reader<R: Read>(db: &Database, rdr: R) -> Result<ImportSummary, ImportError> {
    let teams_by_name: HashMap<String, i64> = db
        .list_teams()?
        .into_iter()
        .map(|t| (t.name.trim().to_string(), t.id))
        .collect();

    // Flexible: hand-maintained sheets often have ragged rows.
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let mut summary = ImportSummary::default();

    for (idx, result) in reader.deserialize::<RawPlayerRow>().enumerate() {
        let line = idx + 2; // 1-based, after the header row
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed row {line}: {e}");
                summary.skipped += 1;
                continue;
            }
        };

        let Some(name) = cell(&raw.player_name) else {
            warn!("skipping row {line}: missing player name");
            summary.skipped += 1;
            continue;
        };

        let mut is_retained = truthy(&raw.is_retained);
        let mut team_id = None;
        if is_retained {
            match cell(&raw.retaining_team_name) {
                Some(team_name) => match teams_by_name.get(team_name) {
                    Some(id) => team_id = Some(*id),
                    None => {
                        warn!(
                            "retaining team '{team_name}' not found for player '{name}'; \
                             importing as auction-pool player"
                        );
                        is_retained = false;
                    }
                },
                None => {
                    warn!("player '{name}' marked retained without a team; importing as auction-pool player");
                    is_retained = false;
                }
            }
        }

        let last_year_price = parse_u32(&raw.last_year_price);
        let player = NewPlayer {
            name: name.to_string(),
            role: cell(&raw.role).unwrap_or("N/A").to_string(),
            stats: PlayerStats {
                matches: parse_u32(&raw.overall_matches),
                runs: parse_u32(&raw.overall_runs),
                wickets: parse_u32(&raw.overall_wickets),
                strike_rate: parse_f64(&raw.overall_sr),
                highest_score: parse_u32(&raw.overall_hs),
                batting_innings: parse_u32(&raw.batting_inn),
                batting_avg: parse_f64(&raw.batting_avg),
                bowling_innings: parse_u32(&raw.bowling_inn),
                bowling_avg: parse_f64(&raw.bowling_avg),
                economy: parse_f64(&raw.econ),
                best_bowling: cell(&raw.bbi).unwrap_or("-").to_string(),
            },
            is_retained,
            status: if is_retained {
                PlayerStatus::Retained
            } else {
                PlayerStatus::Unsold
            },
            sold_price: if is_retained { last_year_price } else { 0 },
            team_id,
        };

        match db.upsert_player(&player)? {
            UpsertOutcome::Added => summary.added += 1,
            UpsertOutcome::Updated => {
                warn!("player '{name}' already exists; replacing details");
                summary.updated += 1;
            }
        }
    }

    Ok(summary)
}

/// Import the player sheet at `path`, then recompute every team's stats
/// from its retained players (same formula as the auction reset).
pub fn import_players(
    db: &Database,
    path: &Path,
    initial_purse: u32,
    slot_cap: u32,
) -> Result<ImportSummary, ImportError> {
    let file = std::fs::File::open(path).map_err(|source| ImportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let summary = import_from_reader(db, file)?;
    db.recompute_team_stats(initial_purse, slot_cap)?;
    Ok(summary)
}

// Roster and pool exports: flat records, one row per player, written as
// CSV to any writer.

use std::io::Write;

use serde::Serialize;

use crate::auction::player::{Player, PlayerStatus};
use crate::auction::AuctionError;
use crate::db::Database;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Storage(#[from] AuctionError),
}

/// Which slice of the player ledger to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFilter {
    All,
    Retained,
    /// Everyone who enters the auction (non-retained).
    AuctionPool,
    Sold,
    /// Still winnable: plain unsold, tagged for a later round, or finally
    /// unsold.
    Unsold,
}

impl ExportFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(ExportFilter::All),
            "retained" => Some(ExportFilter::Retained),
            "auction" => Some(ExportFilter::AuctionPool),
            "sold" => Some(ExportFilter::Sold),
            "unsold" => Some(ExportFilter::Unsold),
            _ => None,
        }
    }

    /// Suggested download name for this slice.
    pub fn filename(&self) -> &'static str {
        match self {
            ExportFilter::All => "all_players.csv",
            ExportFilter::Retained => "retained_players.csv",
            ExportFilter::AuctionPool => "auction_pool_players.csv",
            ExportFilter::Sold => "sold_players.csv",
            ExportFilter::Unsold => "unsold_players.csv",
        }
    }

    fn matches(&self, player: &Player) -> bool {
        match self {
            ExportFilter::All => true,
            ExportFilter::Retained => player.is_retained,
            ExportFilter::AuctionPool => !player.is_retained,
            ExportFilter::Sold => !player.is_retained && player.status == PlayerStatus::Sold,
            ExportFilter::Unsold => {
                !player.is_retained
                    && matches!(
                        player.status,
                        PlayerStatus::Unsold
                            | PlayerStatus::PendingRound(_)
                            | PlayerStatus::FinalUnsold
                    )
            }
        }
    }
}

/// One exported row. Header names match the league's spreadsheet
/// conventions.
#[derive(Debug, Serialize)]
struct PlayerRow {
    #[serde(rename = "Player Name")]
    name: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Price (Points)")]
    price: u32,
    #[serde(rename = "Role")]
    role: String,
    #[serde(rename = "Matches")]
    matches: u32,
    #[serde(rename = "Bat Inn")]
    batting_innings: u32,
    #[serde(rename = "Bat Runs")]
    runs: u32,
    #[serde(rename = "Bat Avg")]
    batting_avg: f64,
    #[serde(rename = "Bat SR")]
    strike_rate: f64,
    #[serde(rename = "Bat HS")]
    highest_score: u32,
    #[serde(rename = "Bowl Inn")]
    bowling_innings: u32,
    #[serde(rename = "Bowl Wkts")]
    wickets: u32,
    #[serde(rename = "Bowl Avg")]
    bowling_avg: f64,
    #[serde(rename = "Bowl Econ")]
    economy: f64,
    #[serde(rename = "Bowl BBI")]
    best_bowling: String,
}

impl PlayerRow {
    fn from_player(player: &Player, status: String) -> Self {
        let price = if player.is_retained || player.status == PlayerStatus::Sold {
            player.sold_price
        } else {
            0
        };
        PlayerRow {
            name: player.name.clone(),
            status,
            price,
            role: player.role.clone(),
            matches: player.stats.matches,
            batting_innings: player.stats.batting_innings,
            runs: player.stats.runs,
            batting_avg: player.stats.batting_avg,
            strike_rate: player.stats.strike_rate,
            highest_score: player.stats.highest_score,
            bowling_innings: player.stats.bowling_innings,
            wickets: player.stats.wickets,
            bowling_avg: player.stats.bowling_avg,
            economy: player.stats.economy,
            best_bowling: player.stats.best_bowling.clone(),
        }
    }

    /// League-wide export label: retained players read "Retained",
    /// everyone else shows their live auction status.
    fn league(player: &Player) -> Self {
        let status = if player.is_retained {
            "Retained".to_string()
        } else {
            player.status.as_db_string()
        };
        PlayerRow::from_player(player, status)
    }

    /// Team-roster export label: coarser buckets for the captain's sheet.
    fn roster(player: &Player) -> Self {
        let status = if player.is_retained {
            "Retained".to_string()
        } else if player.status == PlayerStatus::Sold {
            "Sold".to_string()
        } else {
            "Unsold/Other".to_string()
        };
        PlayerRow::from_player(player, status)
    }
}

/// Export the filtered player list, ordered by name, as CSV. Returns the
/// number of rows written (header excluded).
pub fn export_players<W: Write>(
    db: &Database,
    filter: ExportFilter,
    writer: W,
) -> Result<usize, ExportError> {
    let mut players: Vec<Player> = db
        .list_players()?
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect();
    players.sort_by(|a, b| a.name.cmp(&b.name));

    let mut csv_writer = csv::Writer::from_writer(writer);
    for player in &players {
        csv_writer.serialize(PlayerRow::league(player))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(players.len())
}

/// Export one team's roster (retained first, then by name) as CSV.
/// Returns the number of rows written.
pub fn export_team_roster<W: Write>(
    db: &Database,
    team_id: i64,
    writer: W,
) -> Result<usize, ExportError> {
    // list_players is already ordered retained-first then by name.
    let players: Vec<Player> = db
        .list_players()?
        .into_iter()
        .filter(|p| p.team_id == Some(team_id))
        .collect();

    let mut csv_writer = csv::Writer::from_writer(writer);
    for player in &players {
        csv_writer.serialize(PlayerRow::roster(player))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(players.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::player::NewPlayer;

    fn test_db() -> Database {
        let db = Database::open(":memory:").expect("in-memory database should open");
        db.seed_teams(
            &[("Jolly Players".to_string(), "Vinoth".to_string())],
            10000,
            15,
        )
        .unwrap();
        db
    }

    fn tid(db: &Database) -> i64 {
        db.team_by_name("Jolly Players").unwrap().unwrap().id
    }

    /// Seed one player in each lifecycle state; returns the team id.
    fn seed_lifecycle(db: &Database) -> i64 {
        let team = tid(db);
        db.insert_player(&NewPlayer::retained("Kept", "Batsman", team, 1000)).unwrap();
        db.insert_player(&NewPlayer::pool_entrant("Fresh", "Bowler")).unwrap();

        let sold = db.insert_player(&NewPlayer::pool_entrant("Bought", "Keeper")).unwrap();
        db.record_sale(sold, team, 700).unwrap();

        let pending = db.insert_player(&NewPlayer::pool_entrant("Later", "Batsman")).unwrap();
        db.mark_player_unsold(pending, 1).unwrap();

        let mut finally = NewPlayer::pool_entrant("Done", "Bowler");
        finally.status = PlayerStatus::FinalUnsold;
        db.insert_player(&finally).unwrap();

        team
    }

    fn export_to_string(db: &Database, filter: ExportFilter) -> (usize, String) {
        let mut buf = Vec::new();
        let count = export_players(db, filter, &mut buf).unwrap();
        (count, String::from_utf8(buf).unwrap())
    }

    fn body_names(csv_text: &str) -> Vec<String> {
        csv_text
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn filter_parse_and_filenames() {
        assert_eq!(ExportFilter::parse("all"), Some(ExportFilter::All));
        assert_eq!(ExportFilter::parse("retained"), Some(ExportFilter::Retained));
        assert_eq!(ExportFilter::parse("auction"), Some(ExportFilter::AuctionPool));
        assert_eq!(ExportFilter::parse("sold"), Some(ExportFilter::Sold));
        assert_eq!(ExportFilter::parse("unsold"), Some(ExportFilter::Unsold));
        assert_eq!(ExportFilter::parse("ALL"), None);
        assert_eq!(ExportFilter::parse(""), None);

        assert_eq!(ExportFilter::Sold.filename(), "sold_players.csv");
        assert_eq!(ExportFilter::Unsold.filename(), "unsold_players.csv");
    }

    #[test]
    fn all_filter_exports_everyone_sorted_by_name() {
        let db = test_db();
        seed_lifecycle(&db);
        let (count, text) = export_to_string(&db, ExportFilter::All);
        assert_eq!(count, 5);
        assert_eq!(body_names(&text), vec!["Bought", "Done", "Fresh", "Kept", "Later"]);
    }

    #[test]
    fn sold_filter_excludes_retained() {
        let db = test_db();
        seed_lifecycle(&db);
        let (count, text) = export_to_string(&db, ExportFilter::Sold);
        assert_eq!(count, 1);
        assert_eq!(body_names(&text), vec!["Bought"]);
    }

    #[test]
    fn unsold_filter_includes_pending_rounds_and_final() {
        let db = test_db();
        seed_lifecycle(&db);
        let (count, text) = export_to_string(&db, ExportFilter::Unsold);
        assert_eq!(count, 3);
        assert_eq!(body_names(&text), vec!["Done", "Fresh", "Later"]);
    }

    #[test]
    fn retained_and_pool_filters_partition_the_league() {
        let db = test_db();
        seed_lifecycle(&db);
        let (retained, _) = export_to_string(&db, ExportFilter::Retained);
        let (pool, _) = export_to_string(&db, ExportFilter::AuctionPool);
        assert_eq!(retained, 1);
        assert_eq!(pool, 4);
    }

    #[test]
    fn header_and_price_labels() {
        let db = test_db();
        seed_lifecycle(&db);
        let (_, text) = export_to_string(&db, ExportFilter::All);

        let header = text.lines().next().unwrap();
        assert!(header.starts_with("Player Name,Status,Price (Points),Role"));
        assert!(header.contains("Bowl BBI"));

        // Retained and sold rows carry their price; unsold rows read 0.
        let kept = text.lines().find(|l| l.starts_with("Kept,")).unwrap();
        assert!(kept.contains("Retained,1000"));
        let bought = text.lines().find(|l| l.starts_with("Bought,")).unwrap();
        assert!(bought.contains("Sold,700"));
        let fresh = text.lines().find(|l| l.starts_with("Fresh,")).unwrap();
        assert!(fresh.contains("Unsold,0"));
        let later = text.lines().find(|l| l.starts_with("Later,")).unwrap();
        assert!(later.contains("Round 1 Unsold,0"));
    }

    #[test]
    fn team_roster_orders_retained_first_with_coarse_labels() {
        let db = test_db();
        let team = seed_lifecycle(&db);

        let mut buf = Vec::new();
        let count = export_team_roster(&db, team, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(count, 2); // Kept (retained) + Bought (sold)
        assert_eq!(body_names(&text), vec!["Kept", "Bought"]);
        assert!(text.contains("Kept,Retained,1000"));
        assert!(text.contains("Bought,Sold,700"));
    }

    #[test]
    fn empty_roster_exports_nothing() {
        let db = test_db();
        let team = tid(&db);
        let mut buf = Vec::new();
        let count = export_team_roster(&db, team, &mut buf).unwrap();
        assert_eq!(count, 0);
        // Serialize was never called, so not even a header line lands.
        assert!(buf.is_empty());
    }
}

// Player ledger types: auction status lifecycle and the player record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a player stands in the auction lifecycle.
///
/// Stored in the database in its legacy textual form (`"Unsold"`, `"Sold"`,
/// `"Retained"`, `"Round <N> Unsold"`, `"Unsold Final"`) so status filters
/// can use plain SQL equality and `LIKE 'Round % Unsold'` patterns. All
/// parsing and formatting lives here; the rest of the crate only ever
/// matches on the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PlayerStatus {
    /// In the active pool, not yet offered (or re-offered) this round.
    Unsold,
    /// Purchased by a team.
    Sold,
    /// Pre-assigned to a team before the auction; never enters the pool.
    Retained,
    /// Went unsold in round `N`; queued for reconsideration in round `N+1`.
    PendingRound(u32),
    /// Went unsold with no further rounds. Legacy data only: the engine
    /// never writes this status, but import/export must round-trip it.
    FinalUnsold,
}

impl PlayerStatus {
    /// Parse the stored textual form. Returns `None` for unknown strings.
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "Unsold" => Some(PlayerStatus::Unsold),
            "Sold" => Some(PlayerStatus::Sold),
            "Retained" => Some(PlayerStatus::Retained),
            "Unsold Final" => Some(PlayerStatus::FinalUnsold),
            other => {
                let round = other.strip_prefix("Round ")?.strip_suffix(" Unsold")?;
                round.parse().ok().map(PlayerStatus::PendingRound)
            }
        }
    }

    /// The textual form used in the database and on the wire.
    pub fn as_db_string(&self) -> String {
        match self {
            PlayerStatus::Unsold => "Unsold".to_string(),
            PlayerStatus::Sold => "Sold".to_string(),
            PlayerStatus::Retained => "Retained".to_string(),
            PlayerStatus::PendingRound(n) => format!("Round {n} Unsold"),
            PlayerStatus::FinalUnsold => "Unsold Final".to_string(),
        }
    }

    /// Whether this status keeps the player out of the current offer pool.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, PlayerStatus::Unsold)
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_string())
    }
}

impl From<PlayerStatus> for String {
    fn from(status: PlayerStatus) -> String {
        status.as_db_string()
    }
}

impl TryFrom<String> for PlayerStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        PlayerStatus::from_db(&s).ok_or_else(|| format!("unknown player status '{s}'"))
    }
}

/// Career record carried alongside each player, surfaced on the auction
/// card and in roster exports. All fields come straight from the import
/// sheet; the engine never touches them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub matches: u32,
    pub runs: u32,
    pub wickets: u32,
    pub strike_rate: f64,
    pub highest_score: u32,
    pub batting_innings: u32,
    pub batting_avg: f64,
    pub bowling_innings: u32,
    pub bowling_avg: f64,
    pub economy: f64,
    pub best_bowling: String,
}

/// A player row from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    /// Display name, unique across the league.
    pub name: String,
    /// Playing role (e.g. "Batsman", "Bowler", "All Rounder").
    pub role: String,
    pub stats: PlayerStats,
    /// Set at import time; never changed by the auction engine.
    pub is_retained: bool,
    pub status: PlayerStatus,
    /// 0 unless sold, or retained with a known price.
    pub sold_price: u32,
    /// Owning team; set only on sale or retention.
    pub team_id: Option<i64>,
}

/// Fields for creating or re-importing a player row. The database layer
/// assigns the id.
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub name: String,
    pub role: String,
    pub stats: PlayerStats,
    pub is_retained: bool,
    pub status: PlayerStatus,
    pub sold_price: u32,
    pub team_id: Option<i64>,
}

impl NewPlayer {
    /// A plain auction-pool entrant with empty stats. Import fills in the
    /// rest; tests use this directly.
    pub fn pool_entrant(name: &str, role: &str) -> Self {
        NewPlayer {
            name: name.to_string(),
            role: role.to_string(),
            stats: PlayerStats::default(),
            is_retained: false,
            status: PlayerStatus::Unsold,
            sold_price: 0,
            team_id: None,
        }
    }

    /// A retained player pre-assigned to `team_id` at `price`.
    pub fn retained(name: &str, role: &str, team_id: i64, price: u32) -> Self {
        NewPlayer {
            name: name.to_string(),
            role: role.to_string(),
            stats: PlayerStats::default(),
            is_retained: true,
            status: PlayerStatus::Retained,
            sold_price: price,
            team_id: Some(team_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip_all_variants() {
        let statuses = [
            PlayerStatus::Unsold,
            PlayerStatus::Sold,
            PlayerStatus::Retained,
            PlayerStatus::PendingRound(1),
            PlayerStatus::PendingRound(12),
            PlayerStatus::FinalUnsold,
        ];
        for status in statuses {
            let text = status.as_db_string();
            assert_eq!(PlayerStatus::from_db(&text), Some(status), "{text}");
        }
    }

    #[test]
    fn status_parses_legacy_strings() {
        assert_eq!(PlayerStatus::from_db("Unsold"), Some(PlayerStatus::Unsold));
        assert_eq!(
            PlayerStatus::from_db("Round 3 Unsold"),
            Some(PlayerStatus::PendingRound(3))
        );
        assert_eq!(
            PlayerStatus::from_db("Unsold Final"),
            Some(PlayerStatus::FinalUnsold)
        );
    }

    #[test]
    fn status_rejects_unknown_strings() {
        assert_eq!(PlayerStatus::from_db(""), None);
        assert_eq!(PlayerStatus::from_db("unsold"), None);
        assert_eq!(PlayerStatus::from_db("Round  Unsold"), None);
        assert_eq!(PlayerStatus::from_db("Round x Unsold"), None);
        assert_eq!(PlayerStatus::from_db("Round 3 Sold"), None);
    }

    #[test]
    fn status_display_matches_db_form() {
        assert_eq!(PlayerStatus::PendingRound(2).to_string(), "Round 2 Unsold");
        assert_eq!(PlayerStatus::FinalUnsold.to_string(), "Unsold Final");
    }

    #[test]
    fn status_serde_uses_textual_form() {
        let json = serde_json::to_string(&PlayerStatus::PendingRound(4)).unwrap();
        assert_eq!(json, "\"Round 4 Unsold\"");
        let back: PlayerStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PlayerStatus::PendingRound(4));
    }

    #[test]
    fn status_serde_rejects_garbage() {
        let result: Result<PlayerStatus, _> = serde_json::from_str("\"Sort Of Sold\"");
        assert!(result.is_err());
    }

    #[test]
    fn only_unsold_is_unresolved() {
        assert!(!PlayerStatus::Unsold.is_resolved());
        assert!(PlayerStatus::Sold.is_resolved());
        assert!(PlayerStatus::Retained.is_resolved());
        assert!(PlayerStatus::PendingRound(1).is_resolved());
        assert!(PlayerStatus::FinalUnsold.is_resolved());
    }

    #[test]
    fn retained_builder_sets_assignment() {
        let p = NewPlayer::retained("Kiran S", "Batsman", 4, 1200);
        assert!(p.is_retained);
        assert_eq!(p.status, PlayerStatus::Retained);
        assert_eq!(p.sold_price, 1200);
        assert_eq!(p.team_id, Some(4));
    }
}

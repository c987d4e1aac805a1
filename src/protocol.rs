// Wire protocol between operator consoles and the auction gateway.
//
// Messages are tagged JSON objects: {"type": "mark_sold", "player_id": 7,
// "team_id": 2, "price": 500}. One request per WebSocket text frame, one
// response frame back.

use serde::{Deserialize, Serialize};

use crate::auction::player::Player;
use crate::auction::team::Team;
use crate::db::PoolCounts;

/// A request from an operator console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Login {
        username: String,
        password: String,
    },
    Logout,
    /// League overview: pool size, team count, countdown to auction day.
    Overview,
    /// Full auction state snapshot. Pure read; never advances anything.
    State,
    /// Draw the next player (or detect round/auction completion).
    NextPlayer,
    MarkSold {
        player_id: i64,
        team_id: i64,
        price: i64,
    },
    MarkUnsold {
        player_id: i64,
    },
    StartNextRound,
    PauseAuction,
    /// Resuming requires the admin to re-enter their password.
    ResumeAuction {
        password: String,
    },
    /// Full reset also requires password re-entry.
    ResetAuction {
        password: String,
    },
    CreateUser {
        full_name: String,
        username: String,
        password: String,
        role: String,
        #[serde(default)]
        team_id: Option<i64>,
    },
    ExportPlayers {
        filter: String,
    },
    ExportTeam {
        team_id: i64,
    },
}

/// Everything a console needs to render the auction page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionSnapshot {
    pub round: u32,
    pub started: bool,
    pub round_complete: bool,
    pub complete: bool,
    pub paused: bool,
    pub counts: PoolCounts,
    /// Players waiting for the next round when the current one is complete.
    pub next_round_pending: usize,
    /// The player this operator currently has up for bid, if still live.
    pub current_player: Option<Player>,
    pub teams: Vec<Team>,
}

/// A response to an operator console.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    LoggedIn {
        username: String,
        role: String,
    },
    LoggedOut,
    Overview {
        league: String,
        auction_pool_count: usize,
        team_count: usize,
        slots_open: usize,
        days_to_go: Option<i64>,
    },
    State {
        snapshot: AuctionSnapshot,
        /// Operator-facing confirmation for the action that produced this
        /// state, e.g. "Arjun K sold to Crazy 11 for 500 points!".
        #[serde(default)]
        message: Option<String>,
    },
    Export {
        filename: String,
        content: String,
    },
    UserCreated {
        username: String,
    },
    Error {
        /// One of: validation, conflict, capacity, budget, not_found,
        /// internal, forbidden.
        kind: String,
        message: String,
    },
}

impl Response {
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Response::Error {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

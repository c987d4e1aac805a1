// SQLite persistence layer: player and team ledgers plus operator accounts.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::auction::player::{NewPlayer, Player, PlayerStats, PlayerStatus};
use crate::auction::team::Team;
use crate::auction::AuctionError;
use crate::auth::{NewUser, Role, User};

/// Column list shared by every player SELECT so row mapping stays in one
/// place.
const PLAYER_COLUMNS: &str = "id, name, role, matches, runs, wickets, strike_rate, \
     highest_score, batting_innings, batting_avg, bowling_innings, bowling_avg, \
     economy, best_bowling, is_retained, status, sold_price, team_id";

const TEAM_COLUMNS: &str = "id, name, captain, purse, purse_spent, players_taken, slots_remaining";

/// Aggregate pool counts for the auction overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    /// Non-retained players in the league.
    pub pool_size: usize,
    pub sold: usize,
    /// Players still carrying plain `Unsold` status this round.
    pub currently_unsold: usize,
    /// Players tagged for a later round (or finally unsold).
    pub marked_unsold: usize,
    /// `currently_unsold + marked_unsold`.
    pub remaining: usize,
}

/// Post-commit state of the player and team touched by a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub player: Player,
    pub team: Team,
}

/// Whether an import row created a new player or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
}

/// SQLite-backed persistence for the player ledger, team ledger, and
/// operator accounts.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS teams (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL UNIQUE,
                captain         TEXT NOT NULL,
                purse           INTEGER NOT NULL,
                purse_spent     INTEGER NOT NULL DEFAULT 0,
                players_taken   INTEGER NOT NULL DEFAULT 0,
                slots_remaining INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS players (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL UNIQUE,
                role            TEXT NOT NULL DEFAULT 'N/A',
                matches         INTEGER NOT NULL DEFAULT 0,
                runs            INTEGER NOT NULL DEFAULT 0,
                wickets         INTEGER NOT NULL DEFAULT 0,
                strike_rate     REAL NOT NULL DEFAULT 0,
                highest_score   INTEGER NOT NULL DEFAULT 0,
                batting_innings INTEGER NOT NULL DEFAULT 0,
                batting_avg     REAL NOT NULL DEFAULT 0,
                bowling_innings INTEGER NOT NULL DEFAULT 0,
                bowling_avg     REAL NOT NULL DEFAULT 0,
                economy         REAL NOT NULL DEFAULT 0,
                best_bowling    TEXT NOT NULL DEFAULT '-',
                is_retained     INTEGER NOT NULL DEFAULT 0,
                status          TEXT NOT NULL DEFAULT 'Unsold',
                sold_price      INTEGER NOT NULL DEFAULT 0,
                team_id         INTEGER REFERENCES teams(id)
            );

            CREATE INDEX IF NOT EXISTS idx_players_status ON players(status);
            CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id);

            CREATE TABLE IF NOT EXISTS users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name     TEXT NOT NULL,
                username      TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role          TEXT NOT NULL,
                team_id       INTEGER REFERENCES teams(id)
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    /// Insert the configured teams in one transaction with full purse and
    /// empty rosters. Existing team names are left untouched, so repeated
    /// startups don't reset anything.
    pub fn seed_teams(
        &self,
        teams: &[(String, String)],
        initial_purse: u32,
        slot_cap: u32,
    ) -> Result<usize, AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for (name, captain) in teams {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO teams (name, captain, purse, purse_spent, players_taken, slots_remaining)
                 VALUES (?1, ?2, ?3, 0, 0, ?4)",
                params![name, captain, initial_purse, slot_cap],
            )?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn team_count(&self) -> Result<usize, AuctionError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All teams, ordered by name.
    pub fn list_teams(&self) -> Result<Vec<Team>, AuctionError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {TEAM_COLUMNS} FROM teams ORDER BY name"))?;
        let teams = stmt
            .query_map([], team_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(teams)
    }

    pub fn team_by_id(&self, id: i64) -> Result<Option<Team>, AuctionError> {
        let conn = self.conn();
        Ok(team_by_id_in(&conn, id)?)
    }

    pub fn team_by_name(&self, name: &str) -> Result<Option<Team>, AuctionError> {
        let conn = self.conn();
        let team = conn
            .query_row(
                &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE name = ?1"),
                params![name],
                team_from_row,
            )
            .optional()?;
        Ok(team)
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    pub fn insert_player(&self, player: &NewPlayer) -> Result<i64, AuctionError> {
        let conn = self.conn();
        insert_player_in(&conn, player)
    }

    /// Insert a player or, when a row with the same name exists, replace
    /// its imported fields (including auction status and team assignment,
    /// which re-importing intentionally resets).
    pub fn upsert_player(&self, player: &NewPlayer) -> Result<UpsertOutcome, AuctionError> {
        let conn = self.conn();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM players WHERE name = ?1",
                params![player.name],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            None => {
                insert_player_in(&conn, player)?;
                Ok(UpsertOutcome::Added)
            }
            Some(id) => {
                conn.execute(
                    "UPDATE players SET
                        role = ?1, matches = ?2, runs = ?3, wickets = ?4,
                        strike_rate = ?5, highest_score = ?6, batting_innings = ?7,
                        batting_avg = ?8, bowling_innings = ?9, bowling_avg = ?10,
                        economy = ?11, best_bowling = ?12, is_retained = ?13,
                        status = ?14, sold_price = ?15, team_id = ?16
                     WHERE id = ?17",
                    params![
                        player.role,
                        player.stats.matches,
                        player.stats.runs,
                        player.stats.wickets,
                        player.stats.strike_rate,
                        player.stats.highest_score,
                        player.stats.batting_innings,
                        player.stats.batting_avg,
                        player.stats.bowling_innings,
                        player.stats.bowling_avg,
                        player.stats.economy,
                        player.stats.best_bowling,
                        player.is_retained,
                        player.status.as_db_string(),
                        player.sold_price,
                        player.team_id,
                        id,
                    ],
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    /// Delete every auction-pool player row. Retained players, teams, and
    /// users are preserved. Used by the import job's fresh-reseed mode.
    pub fn delete_pool_players(&self) -> Result<usize, AuctionError> {
        let conn = self.conn();
        Ok(conn.execute("DELETE FROM players WHERE is_retained = 0", [])?)
    }

    pub fn player_by_id(&self, id: i64) -> Result<Option<Player>, AuctionError> {
        let conn = self.conn();
        Ok(player_by_id_in(&conn, id)?)
    }

    /// All players, retained first then by name (the league listing order).
    pub fn list_players(&self) -> Result<Vec<Player>, AuctionError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players ORDER BY is_retained DESC, name"
        ))?;
        let players = stmt
            .query_map([], player_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    /// The current offer pool: non-retained players still carrying plain
    /// `Unsold` status.
    pub fn unsold_pool(&self) -> Result<Vec<Player>, AuctionError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE status = 'Unsold' AND is_retained = 0"
        ))?;
        let players = stmt
            .query_map([], player_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    /// How many players are tagged for reconsideration after round `round`.
    pub fn pending_round_count(&self, round: u32) -> Result<usize, AuctionError> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM players WHERE status = ?1 AND is_retained = 0",
            params![PlayerStatus::PendingRound(round).as_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Aggregate pool counts for the auction overview. Pure read; never
    /// mutates ledger or session state.
    pub fn pool_counts(&self) -> Result<PoolCounts, AuctionError> {
        let conn = self.conn();
        let (pool_size, sold, currently_unsold, marked_unsold): (i64, i64, i64, i64) = conn
            .query_row(
                "SELECT
                    COUNT(*),
                    SUM(status = 'Sold'),
                    SUM(status = 'Unsold'),
                    SUM(status LIKE 'Round % Unsold' OR status = 'Unsold Final')
                 FROM players WHERE is_retained = 0",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                        row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                        row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                    ))
                },
            )?;
        Ok(PoolCounts {
            pool_size: pool_size as usize,
            sold: sold as usize,
            currently_unsold: currently_unsold as usize,
            marked_unsold: marked_unsold as usize,
            remaining: (currently_unsold + marked_unsold) as usize,
        })
    }

    /// How many players were retained before the auction.
    pub fn retained_count(&self) -> Result<usize, AuctionError> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM players WHERE is_retained = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ------------------------------------------------------------------
    // Auction mutations (each a single commit-or-rollback transaction)
    // ------------------------------------------------------------------

    /// Record a sale: the player becomes `Sold` at `price` for `team_id`,
    /// and the team's purse/slot fields move together. All preconditions
    /// are re-checked inside the transaction so a player resolved by a
    /// concurrent operator session fails here with `Conflict` rather than
    /// double-selling.
    pub fn record_sale(
        &self,
        player_id: i64,
        team_id: i64,
        price: u32,
    ) -> Result<SaleReceipt, AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut player = player_by_id_in(&tx, player_id)?
            .ok_or_else(|| AuctionError::NotFound(format!("player {player_id}")))?;
        if player.is_retained || player.status != PlayerStatus::Unsold {
            return Err(AuctionError::Conflict(format!(
                "{} is not currently up for auction or the action was already taken",
                player.name
            )));
        }

        let mut team = team_by_id_in(&tx, team_id)?
            .ok_or_else(|| AuctionError::NotFound(format!("team {team_id}")))?;
        if team.slots_remaining == 0 {
            return Err(AuctionError::Capacity { team: team.name });
        }
        if team.purse < price {
            return Err(AuctionError::Budget {
                team: team.name,
                purse: team.purse,
                price,
            });
        }

        tx.execute(
            "UPDATE players SET status = 'Sold', sold_price = ?1, team_id = ?2 WHERE id = ?3",
            params![price, team_id, player_id],
        )?;
        tx.execute(
            "UPDATE teams SET
                purse = purse - ?1,
                purse_spent = purse_spent + ?1,
                players_taken = players_taken + 1,
                slots_remaining = slots_remaining - 1
             WHERE id = ?2",
            params![price, team_id],
        )?;
        tx.commit()?;

        player.status = PlayerStatus::Sold;
        player.sold_price = price;
        player.team_id = Some(team_id);
        team.purse -= price;
        team.purse_spent += price;
        team.players_taken += 1;
        team.slots_remaining -= 1;
        Ok(SaleReceipt { player, team })
    }

    /// Tag a player as unsold for the current round, queueing them for the
    /// next one. Same commit-time precondition checks as `record_sale`.
    pub fn mark_player_unsold(&self, player_id: i64, round: u32) -> Result<Player, AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut player = player_by_id_in(&tx, player_id)?
            .ok_or_else(|| AuctionError::NotFound(format!("player {player_id}")))?;
        if player.is_retained || player.status != PlayerStatus::Unsold {
            return Err(AuctionError::Conflict(format!(
                "{} is not currently up for auction or the action was already taken",
                player.name
            )));
        }

        let status = PlayerStatus::PendingRound(round);
        tx.execute(
            "UPDATE players SET status = ?1 WHERE id = ?2",
            params![status.as_db_string(), player_id],
        )?;
        tx.commit()?;

        player.status = status;
        Ok(player)
    }

    /// Move every player tagged for reconsideration after `round` back to
    /// plain `Unsold`, re-entering the active pool. Returns how many moved.
    pub fn requeue_round(&self, round: u32) -> Result<usize, AuctionError> {
        let conn = self.conn();
        let moved = conn.execute(
            "UPDATE players SET status = 'Unsold' WHERE status = ?1 AND is_retained = 0",
            params![PlayerStatus::PendingRound(round).as_db_string()],
        )?;
        Ok(moved)
    }

    /// Administrative full reset: every non-retained player back to
    /// `Unsold`/price 0/no team, every team recomputed from its currently
    /// retained players. One transaction; any failure rolls the whole
    /// operation back.
    pub fn reset_auction(&self, initial_purse: u32, slot_cap: u32) -> Result<(), AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE players SET status = 'Unsold', sold_price = 0, team_id = NULL
             WHERE is_retained = 0",
            [],
        )?;
        recompute_teams_in(&tx, initial_purse, slot_cap)?;
        tx.commit()?;
        Ok(())
    }

    /// Recompute every team's purse/slot fields from its retained players.
    /// Shared by the bulk-import job and `reset_auction` (same formula).
    pub fn recompute_team_stats(
        &self,
        initial_purse: u32,
        slot_cap: u32,
    ) -> Result<(), AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        recompute_teams_in(&tx, initial_purse, slot_cap)?;
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn create_user(&self, user: &NewUser) -> Result<i64, AuctionError> {
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO users (full_name, username, password_hash, role, team_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.full_name,
                user.username,
                user.password_hash,
                user.role.as_str(),
                user.team_id,
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AuctionError::Conflict(format!(
                    "username \"{}\" already exists",
                    user.username
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>, AuctionError> {
        let conn = self.conn();
        let user = conn
            .query_row(
                "SELECT id, full_name, username, password_hash, role, team_id
                 FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn user_count(&self) -> Result<usize, AuctionError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ---------------------------------------------------------------------------
// Row mapping and transaction-scoped helpers
// ---------------------------------------------------------------------------

fn player_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Player> {
    let status_text: String = row.get(15)?;
    let status = PlayerStatus::from_db(&status_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            15,
            rusqlite::types::Type::Text,
            format!("unknown player status '{status_text}'").into(),
        )
    })?;
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        role: row.get(2)?,
        stats: PlayerStats {
            matches: row.get(3)?,
            runs: row.get(4)?,
            wickets: row.get(5)?,
            strike_rate: row.get(6)?,
            highest_score: row.get(7)?,
            batting_innings: row.get(8)?,
            batting_avg: row.get(9)?,
            bowling_innings: row.get(10)?,
            bowling_avg: row.get(11)?,
            economy: row.get(12)?,
            best_bowling: row.get(13)?,
        },
        is_retained: row.get(14)?,
        status,
        sold_price: row.get(16)?,
        team_id: row.get(17)?,
    })
}

fn team_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        captain: row.get(2)?,
        purse: row.get(3)?,
        purse_spent: row.get(4)?,
        players_taken: row.get(5)?,
        slots_remaining: row.get(6)?,
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role_text: String = row.get(4)?;
    let role = Role::from_db(&role_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown role '{role_text}'").into(),
        )
    })?;
    Ok(User {
        id: row.get(0)?,
        full_name: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        role,
        team_id: row.get(5)?,
    })
}

fn player_by_id_in(conn: &Connection, id: i64) -> rusqlite::Result<Option<Player>> {
    conn.query_row(
        &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1"),
        params![id],
        player_from_row,
    )
    .optional()
}

fn team_by_id_in(conn: &Connection, id: i64) -> rusqlite::Result<Option<Team>> {
    conn.query_row(
        &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?1"),
        params![id],
        team_from_row,
    )
    .optional()
}

fn insert_player_in(conn: &Connection, player: &NewPlayer) -> Result<i64, AuctionError> {
    conn.execute(
        "INSERT INTO players
            (name, role, matches, runs, wickets, strike_rate, highest_score,
             batting_innings, batting_avg, bowling_innings, bowling_avg,
             economy, best_bowling, is_retained, status, sold_price, team_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            player.name,
            player.role,
            player.stats.matches,
            player.stats.runs,
            player.stats.wickets,
            player.stats.strike_rate,
            player.stats.highest_score,
            player.stats.batting_innings,
            player.stats.batting_avg,
            player.stats.bowling_innings,
            player.stats.bowling_avg,
            player.stats.economy,
            player.stats.best_bowling,
            player.is_retained,
            player.status.as_db_string(),
            player.sold_price,
            player.team_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn recompute_teams_in(
    conn: &Connection,
    initial_purse: u32,
    slot_cap: u32,
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("SELECT id FROM teams")?;
    let team_ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for team_id in team_ids {
        let (retained_count, retained_cost): (u32, u32) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(sold_price), 0)
             FROM players WHERE team_id = ?1 AND is_retained = 1",
            params![team_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        conn.execute(
            "UPDATE teams SET
                players_taken = ?1,
                slots_remaining = ?2,
                purse_spent = ?3,
                purse = ?4
             WHERE id = ?5",
            params![
                retained_count,
                slot_cap.saturating_sub(retained_count),
                retained_cost,
                initial_purse.saturating_sub(retained_cost),
                team_id,
            ],
        )?;
    }
    Ok(())
}

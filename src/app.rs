// Gateway between operator consoles and the auction engine.
//
// Each connected console gets a ConnState (who is logged in, plus their
// ephemeral auction session). The gateway parses protocol requests,
// enforces role checks before any engine call, and maps engine results
// and errors back onto the wire. The shared ledgers live behind the
// database; conflicting actions from two consoles are resolved there.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auction::engine::{AuctionEngine, AuctionRules, Offer, Resume, RoundStart};
use crate::auction::session::AuctionSession;
use crate::auction::AuctionError;
use crate::auth::{hash_password, NewUser, Role, User};
use crate::config::Config;
use crate::db::Database;
use crate::export::{self, ExportFilter};
use crate::protocol::{AuctionSnapshot, Request, Response};

/// Per-connection state: the authenticated operator (if any) and their
/// auction session.
#[derive(Default)]
pub struct ConnState {
    pub actor: Option<User>,
    pub session: AuctionSession,
}

/// Shared application core handed to every connection task.
pub struct Gateway {
    pub config: Config,
    pub db: Arc<Database>,
    pub engine: AuctionEngine,
}

impl Gateway {
    pub fn new(config: Config, db: Arc<Database>) -> Self {
        let rules = AuctionRules {
            initial_purse: config.auction.initial_purse,
            slot_cap: config.auction.slot_cap,
        };
        let engine = AuctionEngine::new(db.clone(), rules);
        Gateway { config, db, engine }
    }

    /// First-run seeding: configured teams when the team table is empty,
    /// and the bootstrap Super Admin when no users exist. Safe to call on
    /// every startup.
    pub fn bootstrap(&self) -> anyhow::Result<()> {
        if self.db.team_count()? == 0 {
            let seeds: Vec<(String, String)> = self
                .config
                .teams
                .iter()
                .map(|t| (t.name.clone(), t.captain.clone()))
                .collect();
            let inserted = self.db.seed_teams(
                &seeds,
                self.config.auction.initial_purse,
                self.config.auction.slot_cap,
            )?;
            info!("seeded {inserted} teams");
        }

        if self.db.user_count()? == 0 {
            let admin = &self.config.bootstrap;
            self.db.create_user(&NewUser {
                full_name: admin.full_name.clone(),
                username: admin.username.clone(),
                password_hash: hash_password(&admin.password),
                role: Role::SuperAdmin,
                team_id: None,
            })?;
            info!("created bootstrap Super Admin '{}'", admin.username);
        }

        Ok(())
    }

    /// Handle one text frame from a console: parse, dispatch, and turn
    /// every failure into a protocol error response.
    pub fn handle_request(&self, conn: &mut ConnState, text: &str) -> Response {
        let request: Request = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => {
                warn!("malformed request: {e}");
                return Response::error("validation", format!("malformed request: {e}"));
            }
        };

        match self.dispatch(conn, request) {
            Ok(response) => response,
            Err(e) => Response::error(e.kind(), e.to_string()),
        }
    }

    fn dispatch(&self, conn: &mut ConnState, request: Request) -> Result<Response, AuctionError> {
        match request {
            Request::Login { username, password } => self.login(conn, &username, &password),
            Request::Logout => {
                conn.actor = None;
                conn.session.clear();
                Ok(Response::LoggedOut)
            }
            Request::Overview => self.overview(),
            Request::State => self.state_response(&conn.session, None),

            Request::NextPlayer => {
                if let Some(denied) = self.deny_unless_admin(conn) {
                    return Ok(denied);
                }
                let offer = self.engine.next_player(&mut conn.session)?;
                let message = self.offer_message(&conn.session, &offer);
                self.state_response(&conn.session, message)
            }

            Request::MarkSold {
                player_id,
                team_id,
                price,
            } => {
                if let Some(denied) = self.deny_unless_admin(conn) {
                    return Ok(denied);
                }
                let receipt = self
                    .engine
                    .mark_sold(&mut conn.session, player_id, team_id, price)?;
                let message = format!(
                    "{} sold to {} for {} points!",
                    receipt.player.name, receipt.team.name, receipt.player.sold_price
                );
                self.state_response(&conn.session, Some(message))
            }

            Request::MarkUnsold { player_id } => {
                if let Some(denied) = self.deny_unless_admin(conn) {
                    return Ok(denied);
                }
                let player = self.engine.mark_unsold(&mut conn.session, player_id)?;
                let message = format!(
                    "{} marked as unsold for Round {}. Available in next round.",
                    player.name, conn.session.round
                );
                self.state_response(&conn.session, Some(message))
            }

            Request::StartNextRound => {
                if let Some(denied) = self.deny_unless_admin(conn) {
                    return Ok(denied);
                }
                let message = match self.engine.start_next_round(&mut conn.session)? {
                    RoundStart::Started { round, .. } => {
                        // The new round begins with a player straight up
                        // for bid.
                        self.engine.next_player(&mut conn.session)?;
                        format!("Starting Round {round}!")
                    }
                    RoundStart::Complete => "No players available for the next round.".to_string(),
                };
                self.state_response(&conn.session, Some(message))
            }

            Request::PauseAuction => {
                if let Some(denied) = self.deny_unless_admin(conn) {
                    return Ok(denied);
                }
                self.engine.pause(&mut conn.session)?;
                self.state_response(&conn.session, Some("Auction paused.".to_string()))
            }

            Request::ResumeAuction { password } => {
                if let Some(denied) = self.deny_unless_reauthed(conn, &password) {
                    return Ok(denied);
                }
                let message = match self.engine.resume(&mut conn.session)? {
                    Resume::CurrentOffer(_) => Some("Auction resumed.".to_string()),
                    Resume::SelectNext => {
                        // Nothing to return to; draw the next player right away.
                        let offer = self.engine.next_player(&mut conn.session)?;
                        self.offer_message(&conn.session, &offer)
                    }
                };
                self.state_response(&conn.session, message)
            }

            Request::ResetAuction { password } => {
                if let Some(denied) = self.deny_unless_reauthed(conn, &password) {
                    return Ok(denied);
                }
                self.engine.reset(&mut conn.session)?;
                self.state_response(
                    &conn.session,
                    Some("Auction has been reset! (Retained players kept)".to_string()),
                )
            }

            Request::CreateUser {
                full_name,
                username,
                password,
                role,
                team_id,
            } => self.create_user(conn, full_name, username, password, &role, team_id),

            Request::ExportPlayers { filter } => {
                if let Some(denied) = self.deny_unless_logged_in(conn) {
                    return Ok(denied);
                }
                let filter = ExportFilter::parse(&filter).ok_or_else(|| {
                    AuctionError::Validation(format!("unknown export filter '{filter}'"))
                })?;
                let mut buf = Vec::new();
                export::export_players(&self.db, filter, &mut buf).map_err(map_export_error)?;
                Ok(Response::Export {
                    filename: filter.filename().to_string(),
                    content: String::from_utf8_lossy(&buf).into_owned(),
                })
            }

            Request::ExportTeam { team_id } => {
                if let Some(denied) = self.deny_unless_logged_in(conn) {
                    return Ok(denied);
                }
                let team = self
                    .db
                    .team_by_id(team_id)?
                    .ok_or_else(|| AuctionError::NotFound(format!("team {team_id}")))?;
                let mut buf = Vec::new();
                export::export_team_roster(&self.db, team_id, &mut buf)
                    .map_err(map_export_error)?;
                Ok(Response::Export {
                    filename: format!("{}_players.csv", team.name),
                    content: String::from_utf8_lossy(&buf).into_owned(),
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Request handlers
    // ------------------------------------------------------------------

    fn login(
        &self,
        conn: &mut ConnState,
        username: &str,
        password: &str,
    ) -> Result<Response, AuctionError> {
        let user = self.db.user_by_username(username)?;
        match user {
            Some(user) if user.check_password(password) => {
                info!(username, role = %user.role, "operator logged in");
                let response = Response::LoggedIn {
                    username: user.username.clone(),
                    role: user.role.as_str().to_string(),
                };
                conn.actor = Some(user);
                Ok(response)
            }
            _ => {
                warn!(username, "failed login attempt");
                Ok(Response::error("forbidden", "invalid username or password"))
            }
        }
    }

    fn overview(&self) -> Result<Response, AuctionError> {
        let counts = self.db.pool_counts()?;
        let retained = self.db.retained_count()?;
        let team_count = self.db.team_count()?;
        let max_slots = team_count * self.config.auction.slot_cap as usize;
        Ok(Response::Overview {
            league: self.config.auction.name.clone(),
            auction_pool_count: counts.pool_size,
            team_count,
            slots_open: max_slots.saturating_sub(retained),
            days_to_go: self
                .config
                .auction
                .days_to_go(chrono::Utc::now().date_naive()),
        })
    }

    fn create_user(
        &self,
        conn: &mut ConnState,
        full_name: String,
        username: String,
        password: String,
        role: &str,
        team_id: Option<i64>,
    ) -> Result<Response, AuctionError> {
        if let Some(denied) = self.deny_unless_admin(conn) {
            return Ok(denied);
        }
        let new_role = Role::from_db(role)
            .ok_or_else(|| AuctionError::Validation(format!("unknown role '{role}'")))?;

        // Plain Admins may only create Captains; Super Admins may create
        // anyone.
        let actor = conn.actor.as_ref().expect("checked by deny_unless_admin");
        if actor.role == Role::Admin && new_role != Role::Captain {
            return Ok(Response::error(
                "forbidden",
                "Admins can only create Captains",
            ));
        }

        // Team linkage only makes sense for captains.
        let team_id = if new_role == Role::Captain { team_id } else { None };
        if let Some(team_id) = team_id {
            if self.db.team_by_id(team_id)?.is_none() {
                return Err(AuctionError::NotFound(format!("team {team_id}")));
            }
        }

        self.db.create_user(&NewUser {
            full_name,
            username: username.clone(),
            password_hash: hash_password(&password),
            role: new_role,
            team_id,
        })?;
        info!(username = %username, role = %new_role, "user created");
        Ok(Response::UserCreated { username })
    }

    // ------------------------------------------------------------------
    // Snapshot assembly
    // ------------------------------------------------------------------

    /// Build the full auction view for this operator. Pure read: neither
    /// the session nor the ledgers change here, even when completion
    /// conditions are visible.
    fn state_response(
        &self,
        session: &AuctionSession,
        message: Option<String>,
    ) -> Result<Response, AuctionError> {
        let counts = self.db.pool_counts()?;
        let teams = self.db.list_teams()?;
        let next_round_pending = if session.round_complete {
            self.db.pending_round_count(session.round)?
        } else {
            0
        };

        // Only surface a live, still-unresolved offer.
        let offering =
            session.started && !session.round_complete && !session.complete && !session.paused;
        let current_player = match (offering, session.current_player_id) {
            (true, Some(id)) => self.db.player_by_id(id)?.filter(|p| !p.status.is_resolved()),
            _ => None,
        };

        Ok(Response::State {
            snapshot: AuctionSnapshot {
                round: session.round,
                started: session.started,
                round_complete: session.round_complete,
                complete: session.complete,
                paused: session.paused,
                counts,
                next_round_pending,
                current_player,
                teams,
            },
            message,
        })
    }

    fn offer_message(&self, session: &AuctionSession, offer: &Offer) -> Option<String> {
        match offer {
            Offer::Offered(_) => None,
            Offer::RoundComplete { round, .. } => Some(format!(
                "Round {round} complete. Ready for Round {}.",
                round + 1
            )),
            Offer::Complete => Some(format!(
                "Auction complete after Round {}! All non-retained players processed.",
                session.round
            )),
        }
    }

    // ------------------------------------------------------------------
    // Capability checks (consulted before every mutating engine call;
    // a denial must leave no side effects behind)
    // ------------------------------------------------------------------

    fn deny_unless_logged_in(&self, conn: &ConnState) -> Option<Response> {
        if conn.actor.is_none() {
            return Some(Response::error(
                "forbidden",
                "you must be logged in to perform this action",
            ));
        }
        None
    }

    fn deny_unless_admin(&self, conn: &ConnState) -> Option<Response> {
        match &conn.actor {
            None => Some(Response::error(
                "forbidden",
                "you must be logged in to perform this action",
            )),
            Some(actor) if !actor.has_role(&[Role::Admin]) => Some(Response::error(
                "forbidden",
                "you do not have permission to perform this action",
            )),
            Some(_) => None,
        }
    }

    /// Admin check plus fresh password entry, for destructive operations
    /// (reset) and resuming a paused auction.
    fn deny_unless_reauthed(&self, conn: &ConnState, password: &str) -> Option<Response> {
        if let Some(denied) = self.deny_unless_admin(conn) {
            return Some(denied);
        }
        let actor = conn.actor.as_ref().expect("checked by deny_unless_admin");
        if !actor.check_password(password) {
            warn!(username = %actor.username, "re-authentication failed");
            return Some(Response::error("forbidden", "invalid admin password"));
        }
        None
    }
}

fn map_export_error(e: export::ExportError) -> AuctionError {
    match e {
        export::ExportError::Storage(inner) => inner,
        export::ExportError::Csv(inner) => {
            AuctionError::Validation(format!("export failed: {inner}"))
        }
    }
}

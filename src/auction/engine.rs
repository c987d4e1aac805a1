// The auction state machine.
//
// Flow: Idle -> Offering -> ... -> RoundComplete -> Offering (next round)
// -> ... -> Complete, with Paused as an orthogonal flag that preserves the
// current offer. Every operation runs synchronously to completion; ledger
// mutations happen inside single database transactions, so a failure
// leaves both ledgers and the caller's session untouched.

use std::sync::Arc;

use rand::Rng;
use tracing::info;

use crate::auction::player::Player;
use crate::auction::session::AuctionSession;
use crate::auction::AuctionError;
use crate::db::{Database, SaleReceipt};

/// Fixed league rules the engine needs for reset recomputation.
#[derive(Debug, Clone, Copy)]
pub struct AuctionRules {
    pub initial_purse: u32,
    pub slot_cap: u32,
}

/// Result of asking for the next player.
#[derive(Debug, Clone)]
pub enum Offer {
    /// A player was drawn from the pool and is now up for bid.
    Offered(Player),
    /// The current round's pool is exhausted but `pending` players are
    /// tagged for the next round.
    RoundComplete { round: u32, pending: usize },
    /// No players remain in any round; the auction is over.
    Complete,
}

/// Result of starting the next round.
#[derive(Debug, Clone, Copy)]
pub enum RoundStart {
    /// `restored` players re-entered the pool and `round` is now active.
    Started { round: u32, restored: usize },
    /// Nothing was tagged for another round; the auction is over.
    Complete,
}

/// Result of resuming a paused auction.
#[derive(Debug, Clone)]
pub enum Resume {
    /// The offer that was interrupted by the pause is live again.
    CurrentOffer(Player),
    /// No live offer to return to; the caller should draw the next player.
    SelectNext,
}

/// The auction engine. Stateless itself: every operation is a function of
/// the shared ledgers and the caller's session.
pub struct AuctionEngine {
    db: Arc<Database>,
    rules: AuctionRules,
}

impl AuctionEngine {
    pub fn new(db: Arc<Database>, rules: AuctionRules) -> Self {
        AuctionEngine { db, rules }
    }

    pub fn rules(&self) -> AuctionRules {
        self.rules
    }

    /// Draw the next player, or detect round/auction completion.
    ///
    /// Selection is uniform over a fresh snapshot of the unsold pool, so a
    /// player resolved since the last call can never be drawn again. Only
    /// session state moves here; the ledgers are read, never written.
    pub fn next_player(&self, session: &mut AuctionSession) -> Result<Offer, AuctionError> {
        if session.paused {
            return Err(AuctionError::Conflict(
                "auction is paused; resume before proceeding".into(),
            ));
        }

        let mut pool = self.db.unsold_pool()?;
        if pool.is_empty() {
            session.started = false;
            session.current_player_id = None;
            let pending = self.db.pending_round_count(session.round)?;
            if pending > 0 {
                session.round_complete = true;
                info!(round = session.round, pending, "round complete");
                return Ok(Offer::RoundComplete {
                    round: session.round,
                    pending,
                });
            }
            session.round_complete = false;
            session.complete = true;
            info!(round = session.round, "auction complete");
            return Ok(Offer::Complete);
        }

        let index = rand::thread_rng().gen_range(0..pool.len());
        let player = pool.swap_remove(index);
        session.started = true;
        session.current_player_id = Some(player.id);
        session.round_complete = false;
        session.complete = false;
        info!(player = %player.name, round = session.round, "player up for bid");
        Ok(Offer::Offered(player))
    }

    /// Record a sale for the player currently up for bid.
    ///
    /// Session checks guard the operator's own view; the authoritative
    /// state checks run inside the ledger transaction.
    pub fn mark_sold(
        &self,
        session: &mut AuctionSession,
        player_id: i64,
        team_id: i64,
        price: i64,
    ) -> Result<SaleReceipt, AuctionError> {
        self.check_live_offer(session, player_id)?;
        let price = u32::try_from(price)
            .map_err(|_| AuctionError::Validation("price must be a non-negative integer".into()))?;

        let receipt = self.db.record_sale(player_id, team_id, price)?;
        session.current_player_id = None;
        info!(
            player = %receipt.player.name,
            team = %receipt.team.name,
            price,
            "player sold"
        );
        Ok(receipt)
    }

    /// Mark the player currently up for bid as unsold, tagging them for
    /// reconsideration in the next round.
    pub fn mark_unsold(
        &self,
        session: &mut AuctionSession,
        player_id: i64,
    ) -> Result<Player, AuctionError> {
        self.check_live_offer(session, player_id)?;

        let player = self.db.mark_player_unsold(player_id, session.round)?;
        session.current_player_id = None;
        info!(player = %player.name, round = session.round, "player unsold this round");
        Ok(player)
    }

    /// Start the next round once the current one is complete.
    ///
    /// Exactly the players tagged during the completed round re-enter the
    /// pool. Calling this again before another round-complete detection is
    /// a conflict.
    pub fn start_next_round(
        &self,
        session: &mut AuctionSession,
    ) -> Result<RoundStart, AuctionError> {
        if !session.round_complete {
            return Err(AuctionError::Conflict(
                "cannot start the next round until the current one is complete".into(),
            ));
        }

        let restored = self.db.requeue_round(session.round)?;
        if restored == 0 {
            session.round_complete = false;
            session.started = false;
            session.complete = true;
            info!(round = session.round, "no players left for another round; auction complete");
            return Ok(RoundStart::Complete);
        }

        session.round += 1;
        session.round_complete = false;
        session.started = true;
        session.paused = false;
        info!(round = session.round, restored, "starting next round");
        Ok(RoundStart::Started {
            round: session.round,
            restored,
        })
    }

    /// Suspend the auction. The current offer (if any) is preserved.
    pub fn pause(&self, session: &mut AuctionSession) -> Result<(), AuctionError> {
        if !session.started || session.complete {
            return Err(AuctionError::Conflict(
                "auction is not currently running or is already complete".into(),
            ));
        }
        session.paused = true;
        info!("auction paused");
        Ok(())
    }

    /// Resume a paused auction. Returns to the interrupted offer when the
    /// player is still unresolved; otherwise the caller should draw next.
    pub fn resume(&self, session: &mut AuctionSession) -> Result<Resume, AuctionError> {
        if !session.paused {
            return Err(AuctionError::Conflict("auction is not paused".into()));
        }
        session.paused = false;
        info!("auction resumed");

        if let Some(player_id) = session.current_player_id {
            if let Some(player) = self.db.player_by_id(player_id)? {
                if !player.status.is_resolved() {
                    return Ok(Resume::CurrentOffer(player));
                }
            }
            // Resolved (or gone) behind our back; fall through to a fresh draw.
            session.current_player_id = None;
        }
        Ok(Resume::SelectNext)
    }

    /// Administrative full reset. The caller is responsible for the
    /// elevated re-authentication; this applies the ledger rollback and
    /// clears the session.
    pub fn reset(&self, session: &mut AuctionSession) -> Result<(), AuctionError> {
        self.db
            .reset_auction(self.rules.initial_purse, self.rules.slot_cap)?;
        session.clear();
        info!("auction reset; retained players kept");
        Ok(())
    }

    fn check_live_offer(
        &self,
        session: &AuctionSession,
        player_id: i64,
    ) -> Result<(), AuctionError> {
        if session.paused {
            return Err(AuctionError::Conflict(
                "auction is paused; resume before proceeding".into(),
            ));
        }
        if !session.started || session.current_player_id != Some(player_id) {
            return Err(AuctionError::Conflict(
                "this player is not currently up for auction".into(),
            ));
        }
        Ok(())
    }
}

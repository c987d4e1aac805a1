// Per-operator auction session state.

use serde::{Deserialize, Serialize};

/// The ephemeral view one operator holds of the running auction.
///
/// Scoped to a single authenticated connection and never persisted to the
/// durable store. Two operator consoles each carry their own session, but
/// they mutate the same shared ledgers; "player already resolved" races
/// are therefore caught inside the ledger transaction, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionSession {
    /// Whether a player is currently being offered.
    pub started: bool,
    /// The player up for bid, if any. Survives pause so resume can return
    /// to the same offer.
    pub current_player_id: Option<i64>,
    /// 1-indexed auction round.
    pub round: u32,
    /// Current round's pool is exhausted; waiting for the admin to start
    /// the next round.
    pub round_complete: bool,
    /// Terminal: no players remain in any round.
    pub complete: bool,
    /// Suspends every mutating operation except resume.
    pub paused: bool,
}

impl Default for AuctionSession {
    fn default() -> Self {
        AuctionSession {
            started: false,
            current_player_id: None,
            round: 1,
            round_complete: false,
            complete: false,
            paused: false,
        }
    }
}

impl AuctionSession {
    /// Back to the pre-auction state (used by logout and reset).
    pub fn clear(&mut self) {
        *self = AuctionSession::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_starts_at_round_one() {
        let s = AuctionSession::default();
        assert_eq!(s.round, 1);
        assert!(!s.started);
        assert!(s.current_player_id.is_none());
        assert!(!s.round_complete);
        assert!(!s.complete);
        assert!(!s.paused);
    }

    #[test]
    fn clear_resets_everything() {
        let mut s = AuctionSession {
            started: true,
            current_player_id: Some(7),
            round: 3,
            round_complete: true,
            complete: false,
            paused: true,
        };
        s.clear();
        assert_eq!(s, AuctionSession::default());
    }
}

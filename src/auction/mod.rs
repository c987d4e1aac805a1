// Auction domain: player/team ledger types, per-operator session state,
// and the engine that moves players from "up for bid" to sold/unsold.

pub mod engine;
pub mod player;
pub mod session;
pub mod team;

use thiserror::Error;

/// Typed failures surfaced by every mutating auction operation.
///
/// `Conflict` covers every "the ledger no longer matches what the caller
/// expected" case: a player already resolved by another operator session,
/// a round advanced twice, an action attempted while paused. Conflicts on
/// sale/no-sale are detected inside the database transaction, not from
/// session state, so two racing operator consoles cannot double-sell.
#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{team} has no remaining slots")]
    Capacity { team: String },

    #[error("{team} does not have enough purse (remaining: {purse}, asked: {price})")]
    Budget { team: String, purse: u32, price: u32 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Internal(#[from] rusqlite::Error),
}

impl AuctionError {
    /// Short machine-readable tag for the wire protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            AuctionError::Validation(_) => "validation",
            AuctionError::Conflict(_) => "conflict",
            AuctionError::Capacity { .. } => "capacity",
            AuctionError::Budget { .. } => "budget",
            AuctionError::NotFound(_) => "not_found",
            AuctionError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(AuctionError::Validation("x".into()).kind(), "validation");
        assert_eq!(AuctionError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(
            AuctionError::Capacity { team: "T".into() }.kind(),
            "capacity"
        );
        assert_eq!(
            AuctionError::Budget {
                team: "T".into(),
                purse: 100,
                price: 200
            }
            .kind(),
            "budget"
        );
        assert_eq!(AuctionError::NotFound("x".into()).kind(), "not_found");
    }

    #[test]
    fn budget_error_message_names_amounts() {
        let err = AuctionError::Budget {
            team: "Thunder Strikers".into(),
            purse: 400,
            price: 900,
        };
        let msg = err.to_string();
        assert!(msg.contains("Thunder Strikers"));
        assert!(msg.contains("400"));
        assert!(msg.contains("900"));
    }
}

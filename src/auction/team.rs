// Team ledger types: purse and roster-slot bookkeeping.

use serde::{Deserialize, Serialize};

/// A team row from the ledger.
///
/// Two invariants hold at all times and are re-established wholesale by
/// reset/import recomputation:
///   purse + purse_spent == initial purse
///   players_taken + slots_remaining == slot cap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub captain: String,
    /// Remaining budget in points.
    pub purse: u32,
    pub purse_spent: u32,
    pub players_taken: u32,
    pub slots_remaining: u32,
}

impl Team {
    /// The purse this team started the auction with.
    pub fn initial_purse(&self) -> u32 {
        self.purse + self.purse_spent
    }

    /// The roster cap this team is playing under.
    pub fn slot_cap(&self) -> u32 {
        self.players_taken + self.slots_remaining
    }

    /// Whether the team can take `price` for one more slot.
    pub fn can_afford(&self, price: u32) -> bool {
        self.slots_remaining > 0 && self.purse >= price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team() -> Team {
        Team {
            id: 1,
            name: "Dada Warriors".into(),
            captain: "Praveen P".into(),
            purse: 9000,
            purse_spent: 1000,
            players_taken: 1,
            slots_remaining: 14,
        }
    }

    #[test]
    fn derived_totals() {
        let t = team();
        assert_eq!(t.initial_purse(), 10000);
        assert_eq!(t.slot_cap(), 15);
    }

    #[test]
    fn can_afford_respects_purse_and_slots() {
        let mut t = team();
        assert!(t.can_afford(9000));
        assert!(!t.can_afford(9001));

        t.slots_remaining = 0;
        assert!(!t.can_afford(0));
    }
}

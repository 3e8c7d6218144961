//! The ledger store: durable relational state for the auction.
//!
//! In a deployment this maps onto a relational datastore; this is the
//! in-memory representation the state machine operates on. All mutation
//! happens through an exclusive borrow, so a handler's check-and-set is
//! race-free by construction. The caller (server) provides the outer lock.

use std::collections::HashMap;

use gavel_types::{
    Bid, BidId, GlobalState, Player, PlayerId, PlayerStatus, Team, TeamId, DEFAULT_TEAM_BUDGET,
};

/// The full ledger: teams, players, bids, and the singleton global state.
#[derive(Debug, Default)]
pub struct LedgerState {
    next_player_id: PlayerId,
    next_team_id: TeamId,
    next_bid_id: BidId,

    /// All player records by id.
    pub players: HashMap<PlayerId, Player>,

    /// All team records by id.
    pub teams: HashMap<TeamId, Team>,

    /// Transient active bids for the current lot, in acceptance order.
    /// Cleared by reset and wallet-reset operations.
    pub active_bids: Vec<Bid>,

    /// Permanent append-only bid log. Never cleared.
    pub bid_log: Vec<Bid>,

    /// The singleton global auction state row.
    pub global: GlobalState,

    /// Budget assigned to teams seeded without an explicit allocation,
    /// and restored by wallet resets. Set at genesis.
    pub default_team_budget: u64,
}

impl LedgerState {
    pub fn new() -> Self {
        Self {
            next_player_id: 1,
            next_team_id: 1,
            next_bid_id: 1,
            default_team_budget: DEFAULT_TEAM_BUDGET,
            ..Default::default()
        }
    }

    // ---- id allocation ----

    pub fn allocate_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    pub fn allocate_team_id(&mut self) -> TeamId {
        let id = self.next_team_id;
        self.next_team_id += 1;
        id
    }

    pub fn allocate_bid_id(&mut self) -> BidId {
        let id = self.next_bid_id;
        self.next_bid_id += 1;
        id
    }

    // ---- record access ----

    pub fn get_player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    pub fn get_player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&player_id)
    }

    pub fn get_team(&self, team_id: TeamId) -> Option<&Team> {
        self.teams.get(&team_id)
    }

    pub fn get_team_mut(&mut self, team_id: TeamId) -> Option<&mut Team> {
        self.teams.get_mut(&team_id)
    }

    /// The single player currently open for bidding, if any.
    pub fn current_lot(&self) -> Option<&Player> {
        self.players
            .values()
            .find(|p| p.status == PlayerStatus::Auctioning)
    }

    // ---- bids ----

    /// The leading bid for a lot: highest amount, latest on ties.
    pub fn leading_bid(&self, player_id: PlayerId) -> Option<&Bid> {
        self.active_bids
            .iter()
            .filter(|b| b.player_id == player_id)
            .max_by_key(|b| (b.amount, b.id))
    }

    /// Active bids for a lot, in acceptance order.
    pub fn active_bids_for(&self, player_id: PlayerId) -> Vec<&Bid> {
        self.active_bids
            .iter()
            .filter(|b| b.player_id == player_id)
            .collect()
    }

    /// Append a bid to both the active list and the permanent log.
    pub fn record_bid(&mut self, bid: Bid) {
        self.active_bids.push(bid.clone());
        self.bid_log.push(bid);
    }

    /// Drop the transient active bids for one lot. The permanent log is
    /// untouched; the audit trail is immutable.
    pub fn clear_active_bids(&mut self, player_id: PlayerId) -> usize {
        let before = self.active_bids.len();
        self.active_bids.retain(|b| b.player_id != player_id);
        before - self.active_bids.len()
    }

    /// Drop all transient active bids placed by one team.
    pub fn clear_active_bids_by_team(&mut self, team_id: TeamId) -> usize {
        let before = self.active_bids.len();
        self.active_bids.retain(|b| b.team_id != team_id);
        before - self.active_bids.len()
    }

    // ---- budgets ----

    /// Deduct `amount` from a team's remaining budget.
    ///
    /// Returns false (and leaves the team untouched) if the deduction would
    /// drive the balance below zero, preserving `0 <= remaining <= budget`.
    pub fn debit_team(&mut self, team_id: TeamId, amount: u64) -> bool {
        match self.teams.get_mut(&team_id) {
            Some(team) if team.remaining_budget >= amount => {
                team.remaining_budget -= amount;
                true
            }
            _ => false,
        }
    }

    /// Sum of sold prices for a team's roster.
    pub fn spent_by_team(&self, team_id: TeamId) -> u64 {
        self.players
            .values()
            .filter(|p| p.status == PlayerStatus::Sold && p.team_id == Some(team_id))
            .filter_map(|p| p.sold_price)
            .sum()
    }

    /// Recompute every team's remaining budget from its sold roster.
    ///
    /// This is the drift-correction authority for the denormalized
    /// `remaining_budget` column. Returns the ids of teams whose balance
    /// changed.
    pub fn recompute_budgets(&mut self) -> Vec<TeamId> {
        let spent: HashMap<TeamId, u64> = self
            .teams
            .keys()
            .map(|id| (*id, self.spent_by_team(*id)))
            .collect();

        let mut adjusted = Vec::new();
        for (id, team) in self.teams.iter_mut() {
            let expected = team.budget.saturating_sub(spent[id]);
            if team.remaining_budget != expected {
                team.remaining_budget = expected;
                adjusted.push(*id);
            }
        }
        adjusted.sort_unstable();
        adjusted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_types::{ClassYear, PlayerStats, Sport};

    fn test_team(id: TeamId) -> Team {
        Team {
            id,
            name: format!("Team {id}"),
            sport: Sport::Cricket,
            budget: 2000,
            remaining_budget: 2000,
            logo_url: None,
            is_test_data: false,
        }
    }

    fn test_player(id: PlayerId, status: PlayerStatus) -> Player {
        Player {
            id,
            user_id: id,
            name: format!("Player {id}"),
            sport: Sport::Cricket,
            year: ClassYear::First,
            photo_url: None,
            stats: PlayerStats::new(),
            base_price: 50,
            status,
            team_id: None,
            sold_price: None,
            is_test_data: false,
        }
    }

    fn bid(id: BidId, player_id: PlayerId, team_id: TeamId, amount: u64) -> Bid {
        Bid {
            id,
            player_id,
            team_id,
            amount,
            timestamp: id * 10,
        }
    }

    #[test]
    fn test_id_allocation() {
        let mut state = LedgerState::new();
        assert_eq!(state.allocate_bid_id(), 1);
        assert_eq!(state.allocate_bid_id(), 2);
        assert_eq!(state.allocate_player_id(), 1);
        assert_eq!(state.allocate_team_id(), 1);
    }

    #[test]
    fn test_leading_bid_prefers_highest_then_latest() {
        let mut state = LedgerState::new();
        state.record_bid(bid(1, 7, 1, 60));
        state.record_bid(bid(2, 7, 2, 80));
        state.record_bid(bid(3, 7, 1, 80));
        state.record_bid(bid(4, 9, 2, 500));

        let leading = state.leading_bid(7).unwrap();
        assert_eq!(leading.id, 3);
        assert_eq!(leading.amount, 80);
    }

    #[test]
    fn test_clear_active_bids_keeps_log() {
        let mut state = LedgerState::new();
        state.record_bid(bid(1, 7, 1, 60));
        state.record_bid(bid(2, 7, 2, 80));
        state.record_bid(bid(3, 9, 2, 100));

        assert_eq!(state.clear_active_bids(7), 2);
        assert!(state.leading_bid(7).is_none());
        assert_eq!(state.active_bids.len(), 1);
        assert_eq!(state.bid_log.len(), 3);
    }

    #[test]
    fn test_debit_team_never_overdraws() {
        let mut state = LedgerState::new();
        state.teams.insert(1, test_team(1));

        assert!(state.debit_team(1, 1500));
        assert_eq!(state.get_team(1).unwrap().remaining_budget, 500);

        assert!(!state.debit_team(1, 501));
        assert_eq!(state.get_team(1).unwrap().remaining_budget, 500);

        assert!(state.debit_team(1, 500));
        assert_eq!(state.get_team(1).unwrap().remaining_budget, 0);
    }

    #[test]
    fn test_recompute_budgets_fixes_drift() {
        let mut state = LedgerState::new();
        state.teams.insert(1, test_team(1));

        let mut sold = test_player(7, PlayerStatus::Sold);
        sold.team_id = Some(1);
        sold.sold_price = Some(300);
        state.players.insert(7, sold);

        // Introduce drift: the denormalized balance disagrees with the roster.
        state.get_team_mut(1).unwrap().remaining_budget = 900;

        assert_eq!(state.recompute_budgets(), vec![1]);
        assert_eq!(state.get_team(1).unwrap().remaining_budget, 1700);

        // Converged state is a fixed point.
        assert!(state.recompute_budgets().is_empty());
    }
}

//! Read-only views over the ledger.
//!
//! These are the authoritative fetches clients fall back to after a
//! reconnect: each returns a self-contained snapshot independent of any
//! broadcast message.

use serde::{Deserialize, Serialize};

use gavel_types::{
    Bid, ClassYear, GlobalState, Player, PlayerId, PlayerStats, PlayerStatus, Sport, TeamId,
    Timestamp,
};

use crate::policy;
use crate::state::LedgerState;

/// The leading bid for the current lot, with the team name resolved for
/// display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadingBid {
    pub bid: Bid,
    pub team_name: String,
}

/// The current lot and its price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentLot {
    pub player: Player,
    pub leading_bid: Option<LeadingBid>,
    /// Most recent accepted bid amount, or the base price if none.
    pub current_price: u64,
    /// Minimum legal next bid under the increment schedule.
    pub next_min_bid: u64,
}

/// Response for the current-lot query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentLotView {
    pub current_lot: Option<CurrentLot>,
    pub is_active: bool,
}

/// The current lot plus its leading bid, or `None` when the floor is idle.
pub fn current_lot(state: &LedgerState) -> CurrentLotView {
    let lot = state.current_lot().map(|player| {
        let leading = state.leading_bid(player.id).map(|bid| LeadingBid {
            bid: bid.clone(),
            team_name: state
                .get_team(bid.team_id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
        });
        let current_price = leading
            .as_ref()
            .map(|l| l.bid.amount)
            .unwrap_or(player.base_price);
        let next_min_bid = match leading {
            Some(_) => policy::next_min_bid(&state.global.increment_rules, current_price),
            None => player.base_price,
        };
        CurrentLot {
            player: player.clone(),
            leading_bid: leading,
            current_price,
            next_min_bid,
        }
    });

    CurrentLotView {
        current_lot: lot,
        is_active: state.global.is_active,
    }
}

/// One sold player on a leaderboard roster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player_id: PlayerId,
    pub name: String,
    pub photo_url: Option<String>,
    pub year: ClassYear,
    pub sold_price: u64,
    pub stats: PlayerStats,
}

/// One team on the leaderboard, ordered by total spend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub team_id: TeamId,
    pub name: String,
    pub sport: Sport,
    pub budget: u64,
    pub remaining_budget: u64,
    pub total_spent: u64,
    pub players_count: usize,
    pub players: Vec<RosterEntry>,
}

/// Teams with their sold rosters and spend totals, highest spend first.
///
/// When the sandbox lockdown is engaged, test-flagged teams are hidden
/// from non-admin views.
pub fn leaderboard(state: &LedgerState, is_admin: bool) -> Vec<LeaderboardEntry> {
    let hide_test_data = state.global.testgrounds_locked && !is_admin;

    let mut entries: Vec<LeaderboardEntry> = state
        .teams
        .values()
        .filter(|t| !(hide_test_data && t.is_test_data))
        .map(|team| {
            let mut players: Vec<RosterEntry> = state
                .players
                .values()
                .filter(|p| p.status == PlayerStatus::Sold && p.team_id == Some(team.id))
                .map(|p| RosterEntry {
                    player_id: p.id,
                    name: p.name.clone(),
                    photo_url: p.photo_url.clone(),
                    year: p.year,
                    sold_price: p.sold_price.unwrap_or(0),
                    stats: p.stats.clone(),
                })
                .collect();
            players.sort_by_key(|p| p.player_id);

            LeaderboardEntry {
                team_id: team.id,
                name: team.name.clone(),
                sport: team.sport,
                budget: team.budget,
                remaining_budget: team.remaining_budget,
                total_spent: team.budget.saturating_sub(team.remaining_budget),
                players_count: players.len(),
                players,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.total_spent.cmp(&a.total_spent).then(a.team_id.cmp(&b.team_id)));
    entries
}

/// One row of the permanent bid log, names resolved for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BidLogEntry {
    pub bid_id: u64,
    pub amount: u64,
    pub timestamp: Timestamp,
    pub team_name: String,
    pub player_name: String,
}

/// The most recent entries of the permanent bid log, newest first.
pub fn recent_bids(state: &LedgerState, limit: usize) -> Vec<BidLogEntry> {
    state
        .bid_log
        .iter()
        .rev()
        .take(limit)
        .map(|bid| BidLogEntry {
            bid_id: bid.id,
            amount: bid.amount,
            timestamp: bid.timestamp,
            team_name: state
                .get_team(bid.team_id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            player_name: state
                .get_player(bid.player_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect()
}

/// Snapshot of the singleton global state.
pub fn global_state(state: &LedgerState) -> GlobalState {
    state.global.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{
        handle_place_bid, handle_resolve_sold, handle_seed_player, handle_seed_team,
        handle_start_lot, NewPlayer, OpContext,
    };

    fn ctx() -> OpContext {
        OpContext { timestamp: 500 }
    }

    fn seed(state: &mut LedgerState, name: &str, test_data: bool) -> TeamId {
        let (team, _) = handle_seed_team(
            state,
            &ctx(),
            name.to_string(),
            Sport::Futsal,
            None,
            None,
            test_data,
        )
        .unwrap();
        team.id
    }

    fn seed_player(state: &mut LedgerState, name: &str) -> PlayerId {
        let (player, _) = handle_seed_player(
            state,
            &ctx(),
            NewPlayer {
                user_id: 1,
                name: name.to_string(),
                sport: Sport::Futsal,
                year: ClassYear::First,
                photo_url: None,
                stats: PlayerStats::new(),
                base_price: Some(50),
                status: Some(PlayerStatus::Eligible),
                is_test_data: false,
            },
        )
        .unwrap();
        player.id
    }

    #[test]
    fn test_current_lot_none_when_idle() {
        let state = LedgerState::new();
        let view = current_lot(&state);
        assert!(view.current_lot.is_none());
        assert!(!view.is_active);
    }

    #[test]
    fn test_current_lot_price_tracks_leading_bid() {
        let mut state = LedgerState::new();
        let team_id = seed(&mut state, "Alpha", false);
        let player_id = seed_player(&mut state, "Dev");

        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();
        let view = current_lot(&state);
        let lot = view.current_lot.unwrap();
        assert_eq!(lot.current_price, 50);
        assert_eq!(lot.next_min_bid, 50);
        assert!(lot.leading_bid.is_none());

        handle_place_bid(&mut state, &ctx(), player_id, team_id, 60).unwrap();
        let lot = current_lot(&state).current_lot.unwrap();
        assert_eq!(lot.current_price, 60);
        assert_eq!(lot.next_min_bid, 70);
        assert_eq!(lot.leading_bid.unwrap().team_name, "Alpha");
    }

    #[test]
    fn test_leaderboard_orders_by_spend_and_hides_test_data() {
        let mut state = LedgerState::new();
        let alpha = seed(&mut state, "Alpha", false);
        let beta = seed(&mut state, "Beta", false);
        let sandbox = seed(&mut state, "Sandbox", true);

        let p1 = seed_player(&mut state, "Dev");
        handle_start_lot(&mut state, &ctx(), p1, None).unwrap();
        handle_resolve_sold(&mut state, &ctx(), p1, beta, 300).unwrap();

        let p2 = seed_player(&mut state, "Esha");
        handle_start_lot(&mut state, &ctx(), p2, None).unwrap();
        handle_resolve_sold(&mut state, &ctx(), p2, alpha, 100).unwrap();

        let board = leaderboard(&state, false);
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].team_id, beta);
        assert_eq!(board[0].total_spent, 300);
        assert_eq!(board[0].players_count, 1);
        assert_eq!(board[1].team_id, alpha);

        state.global.testgrounds_locked = true;
        let board = leaderboard(&state, false);
        assert!(board.iter().all(|e| e.team_id != sandbox));
        let board = leaderboard(&state, true);
        assert!(board.iter().any(|e| e.team_id == sandbox));
    }

    #[test]
    fn test_recent_bids_newest_first() {
        let mut state = LedgerState::new();
        let team_id = seed(&mut state, "Alpha", false);
        let player_id = seed_player(&mut state, "Dev");
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();
        handle_place_bid(&mut state, &ctx(), player_id, team_id, 60).unwrap();
        handle_place_bid(&mut state, &ctx(), player_id, team_id, 70).unwrap();
        handle_place_bid(&mut state, &ctx(), player_id, team_id, 80).unwrap();

        let log = recent_bids(&state, 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].amount, 80);
        assert_eq!(log[1].amount, 70);
        assert_eq!(log[0].team_name, "Alpha");
    }
}

//! Operation handlers for the auction state machine.
//!
//! Each handler validates its inputs against the ledger, applies the
//! mutation, and returns the domain events to publish. Handlers never
//! touch the broadcast layer themselves: the caller publishes the returned
//! events only after the surrounding transaction has committed, so a
//! rolled-back mutation can never produce an event.

use serde::{Deserialize, Serialize};

use gavel_types::{
    validate_stats, AuctionEvent, Bid, ClassYear, GlobalState, IncrementRule, LotOutcome, Player,
    PlayerId, PlayerStats, PlayerStatus, Sport, Team, TeamId, Timestamp, UserId,
    DEFAULT_FLOOR_PRICE,
};

use crate::error::AuctionError;
use crate::policy;
use crate::state::LedgerState;

/// Context provided by the caller for each operation.
pub struct OpContext {
    /// Wall-clock timestamp of the request, Unix milliseconds.
    pub timestamp: Timestamp,
}

/// Result type for handlers: the operation's value plus the events to
/// publish after commit.
pub type HandlerResult<T> = Result<(T, Vec<AuctionEvent>), AuctionError>;

// =========================
// STATE MACHINE
// =========================

/// Open a lot for bidding.
///
/// The status predicate and the write happen under one exclusive borrow,
/// so concurrent start attempts cannot both pass the check: at most one
/// player holds `Auctioning` afterwards. The effective base price is the
/// override if given, else the stored base price, else the global floor.
pub fn handle_start_lot(
    state: &mut LedgerState,
    ctx: &OpContext,
    player_id: PlayerId,
    base_price_override: Option<u64>,
) -> HandlerResult<Player> {
    if let Some(p) = base_price_override {
        if p == 0 {
            return Err(AuctionError::Validation(
                "base price must be positive".to_string(),
            ));
        }
    }

    if let Some(active) = state.current_lot() {
        if active.id != player_id {
            return Err(AuctionError::LotAlreadyActive(active.id));
        }
    }

    let player = state
        .get_player(player_id)
        .ok_or(AuctionError::PlayerNotFound(player_id))?;
    if player.status == PlayerStatus::Sold {
        return Err(AuctionError::AlreadySold(player_id));
    }

    let effective_base = match base_price_override {
        Some(p) => p,
        None if player.base_price > 0 => player.base_price,
        None => DEFAULT_FLOOR_PRICE,
    };

    // Stale bids from an earlier pass over the same lot would otherwise
    // skew the leading-bid computation.
    state.clear_active_bids(player_id);

    let player = state.get_player_mut(player_id).ok_or(AuctionError::PlayerNotFound(player_id))?;
    player.status = PlayerStatus::Auctioning;
    player.base_price = effective_base;
    let snapshot = player.clone();

    let event = AuctionEvent::LotStarted {
        player: snapshot.clone(),
        timestamp: ctx.timestamp,
    };
    Ok((snapshot, vec![event]))
}

/// Accept a bid on the active lot.
///
/// Validation order: positive amount, lot is active, team exists, the bid
/// clears the policy minimum, the bid fits the remaining budget. Nothing
/// is written until every check has passed, so a rejection leaves no
/// partial bid visible. The bid lands in both the transient active list
/// and the permanent log.
pub fn handle_place_bid(
    state: &mut LedgerState,
    ctx: &OpContext,
    player_id: PlayerId,
    team_id: TeamId,
    amount: u64,
) -> HandlerResult<Bid> {
    if amount == 0 {
        return Err(AuctionError::Validation(
            "bid amount must be positive".to_string(),
        ));
    }

    let player = state
        .get_player(player_id)
        .ok_or(AuctionError::PlayerNotFound(player_id))?;
    if player.status != PlayerStatus::Auctioning {
        return Err(AuctionError::NotAuctioning {
            player_id,
            status: player.status,
        });
    }
    let player_name = player.name.clone();
    let base_price = player.base_price;

    let team = state
        .get_team(team_id)
        .ok_or(AuctionError::TeamNotFound(team_id))?;
    let team_name = team.name.clone();
    let remaining = team.remaining_budget;

    // Strict monotonicity: the opening bid must reach the floor, and each
    // later bid must clear the scheduled increment over the leader.
    let minimum = match state.leading_bid(player_id) {
        None => base_price,
        Some(leading) => policy::next_min_bid(&state.global.increment_rules, leading.amount),
    };
    if amount < minimum {
        return Err(AuctionError::BidBelowMinimum { amount, minimum });
    }

    if amount > remaining {
        return Err(AuctionError::BudgetExceeded { amount, remaining });
    }

    let bid = Bid {
        id: state.allocate_bid_id(),
        player_id,
        team_id,
        amount,
        timestamp: ctx.timestamp,
    };
    state.record_bid(bid.clone());

    let event = AuctionEvent::BidAccepted {
        player_id,
        player_name,
        team_id,
        team_name,
        amount,
        timestamp: ctx.timestamp,
    };
    Ok((bid, vec![event]))
}

/// Close the lot as sold: record the buyer and final price, and decrement
/// the team's remaining budget.
pub fn handle_resolve_sold(
    state: &mut LedgerState,
    ctx: &OpContext,
    player_id: PlayerId,
    team_id: TeamId,
    final_price: u64,
) -> HandlerResult<LotOutcome> {
    if final_price == 0 {
        return Err(AuctionError::Validation(
            "final price must be positive".to_string(),
        ));
    }

    let player = state
        .get_player(player_id)
        .ok_or(AuctionError::PlayerNotFound(player_id))?;
    if player.status == PlayerStatus::Sold {
        return Err(AuctionError::AlreadySold(player_id));
    }
    let player_name = player.name.clone();

    let team = state
        .get_team(team_id)
        .ok_or(AuctionError::TeamNotFound(team_id))?;
    let team_name = team.name.clone();
    if final_price > team.remaining_budget {
        return Err(AuctionError::BudgetExceeded {
            amount: final_price,
            remaining: team.remaining_budget,
        });
    }

    // All checks passed; apply both sides of the sale.
    let player = state.get_player_mut(player_id).ok_or(AuctionError::PlayerNotFound(player_id))?;
    player.status = PlayerStatus::Sold;
    player.team_id = Some(team_id);
    player.sold_price = Some(final_price);
    state.debit_team(team_id, final_price);

    let outcome = LotOutcome::Sold {
        player_id,
        player_name,
        team_id,
        team_name,
        amount: final_price,
    };
    let events = vec![
        AuctionEvent::LotResolved {
            outcome: outcome.clone(),
            timestamp: ctx.timestamp,
        },
        // Leaderboard and rosters depend on this transition.
        AuctionEvent::ConfigChanged {
            timestamp: ctx.timestamp,
        },
    ];
    Ok((outcome, events))
}

/// Release the lot unsold. Idempotent: repeating the call re-applies the
/// identical state.
pub fn handle_resolve_unsold(
    state: &mut LedgerState,
    ctx: &OpContext,
    player_id: PlayerId,
) -> HandlerResult<LotOutcome> {
    let player = state
        .get_player(player_id)
        .ok_or(AuctionError::PlayerNotFound(player_id))?;
    if player.status == PlayerStatus::Sold {
        return Err(AuctionError::AlreadySold(player_id));
    }

    let player = state.get_player_mut(player_id).ok_or(AuctionError::PlayerNotFound(player_id))?;
    player.status = PlayerStatus::Unsold;

    let outcome = LotOutcome::Unsold { player_id };
    let event = AuctionEvent::LotResolved {
        outcome: outcome.clone(),
        timestamp: ctx.timestamp,
    };
    Ok((outcome, vec![event]))
}

/// Skip the lot: send the player back to the queue at the sport's current
/// minimum bid.
pub fn handle_skip(
    state: &mut LedgerState,
    ctx: &OpContext,
    player_id: PlayerId,
) -> HandlerResult<LotOutcome> {
    let player = state
        .get_player(player_id)
        .ok_or(AuctionError::PlayerNotFound(player_id))?;
    if player.status == PlayerStatus::Sold {
        return Err(AuctionError::AlreadySold(player_id));
    }
    let floor = policy::sport_floor(&state.global.sport_min_bids, player.sport);

    let player = state.get_player_mut(player_id).ok_or(AuctionError::PlayerNotFound(player_id))?;
    player.status = PlayerStatus::Eligible;
    player.base_price = floor;
    let player_name = player.name.clone();

    let outcome = LotOutcome::Skipped {
        player_id,
        player_name,
        floor_price: floor,
    };
    let event = AuctionEvent::LotResolved {
        outcome: outcome.clone(),
        timestamp: ctx.timestamp,
    };
    Ok((outcome, vec![event]))
}

/// Clear the accumulated bids for the current lot without changing the lot
/// itself. The permanent bid log is untouched.
pub fn handle_reset_bid(state: &mut LedgerState, ctx: &OpContext) -> HandlerResult<(PlayerId, u64)> {
    let lot = state.current_lot().ok_or(AuctionError::NoActiveLot)?;
    let player_id = lot.id;
    let player_name = lot.name.clone();
    let floor = if lot.base_price > 0 {
        lot.base_price
    } else {
        DEFAULT_FLOOR_PRICE
    };

    state.clear_active_bids(player_id);

    let event = AuctionEvent::BidReset {
        player_id,
        player_name,
        floor_price: floor,
        timestamp: ctx.timestamp,
    };
    Ok(((player_id, floor), vec![event]))
}

// =========================
// CONFIGURATION
// =========================

fn config_changed(ctx: &OpContext) -> Vec<AuctionEvent> {
    vec![AuctionEvent::ConfigChanged {
        timestamp: ctx.timestamp,
    }]
}

/// Toggle the global auction-active flag.
pub fn handle_set_active(
    state: &mut LedgerState,
    ctx: &OpContext,
    is_active: bool,
) -> HandlerResult<GlobalState> {
    state.global.is_active = is_active;
    Ok((state.global.clone(), config_changed(ctx)))
}

/// Toggle the registration-open flag.
pub fn handle_set_registration_open(
    state: &mut LedgerState,
    ctx: &OpContext,
    is_open: bool,
) -> HandlerResult<GlobalState> {
    state.global.is_registration_open = is_open;
    Ok((state.global.clone(), config_changed(ctx)))
}

/// Toggle the sandbox-data lockdown flag.
pub fn handle_set_lockdown(
    state: &mut LedgerState,
    ctx: &OpContext,
    locked: bool,
) -> HandlerResult<GlobalState> {
    state.global.testgrounds_locked = locked;
    Ok((state.global.clone(), config_changed(ctx)))
}

/// Replace the per-sport minimum opening bids.
pub fn handle_update_sport_min_bids(
    state: &mut LedgerState,
    ctx: &OpContext,
    min_bids: std::collections::BTreeMap<Sport, u64>,
) -> HandlerResult<GlobalState> {
    if min_bids.is_empty() {
        return Err(AuctionError::Validation(
            "sport minimum bids must not be empty".to_string(),
        ));
    }
    if min_bids.values().any(|v| *v == 0) {
        return Err(AuctionError::Validation(
            "sport minimum bids must be positive".to_string(),
        ));
    }
    state.global.sport_min_bids = min_bids;
    Ok((state.global.clone(), config_changed(ctx)))
}

/// Replace the increment schedule. Input order does not matter; the
/// schedule is stored sorted ascending by threshold.
pub fn handle_update_increment_rules(
    state: &mut LedgerState,
    ctx: &OpContext,
    rules: Vec<IncrementRule>,
) -> HandlerResult<Vec<IncrementRule>> {
    let sorted = policy::validate_rules(&rules)?;
    state.global.increment_rules = sorted.clone();
    Ok((sorted, config_changed(ctx)))
}

/// Update presentation timing parameters.
pub fn handle_update_animation(
    state: &mut LedgerState,
    ctx: &OpContext,
    duration: Option<u32>,
    animation_type: Option<String>,
) -> HandlerResult<GlobalState> {
    if let Some(d) = duration {
        if d == 0 {
            return Err(AuctionError::Validation(
                "animation duration must be positive".to_string(),
            ));
        }
        state.global.animation_duration = d;
    }
    if let Some(t) = animation_type {
        if t.is_empty() {
            return Err(AuctionError::Validation(
                "animation type must not be empty".to_string(),
            ));
        }
        state.global.animation_type = t;
    }
    Ok((state.global.clone(), config_changed(ctx)))
}

// =========================
// ADMINISTRATION
// =========================

/// Parameters for seeding a player record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewPlayer {
    pub user_id: UserId,
    pub name: String,
    pub sport: Sport,
    pub year: ClassYear,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub stats: PlayerStats,
    #[serde(default)]
    pub base_price: Option<u64>,
    #[serde(default)]
    pub status: Option<PlayerStatus>,
    #[serde(default)]
    pub is_test_data: bool,
}

/// Create a team record.
pub fn handle_seed_team(
    state: &mut LedgerState,
    ctx: &OpContext,
    name: String,
    sport: Sport,
    budget: Option<u64>,
    logo_url: Option<String>,
    is_test_data: bool,
) -> HandlerResult<Team> {
    if name.trim().is_empty() {
        return Err(AuctionError::Validation(
            "team name must not be empty".to_string(),
        ));
    }
    let budget = budget.unwrap_or(state.default_team_budget);
    if budget == 0 {
        return Err(AuctionError::Validation(
            "team budget must be positive".to_string(),
        ));
    }

    let team = Team {
        id: state.allocate_team_id(),
        name,
        sport,
        budget,
        remaining_budget: budget,
        logo_url,
        is_test_data,
    };
    state.teams.insert(team.id, team.clone());
    Ok((team, config_changed(ctx)))
}

/// Create a player record. The stat payload is validated here, at the
/// ingestion boundary; the state machine treats it as opaque afterwards.
pub fn handle_seed_player(
    state: &mut LedgerState,
    ctx: &OpContext,
    new: NewPlayer,
) -> HandlerResult<Player> {
    if new.name.trim().is_empty() {
        return Err(AuctionError::Validation(
            "player name must not be empty".to_string(),
        ));
    }
    validate_stats(&new.stats).map_err(|e| AuctionError::Validation(e.to_string()))?;

    let base_price = new
        .base_price
        .unwrap_or_else(|| policy::sport_floor(&state.global.sport_min_bids, new.sport));
    if base_price == 0 {
        return Err(AuctionError::Validation(
            "base price must be positive".to_string(),
        ));
    }

    let player = Player {
        id: state.allocate_player_id(),
        user_id: new.user_id,
        name: new.name,
        sport: new.sport,
        year: new.year,
        photo_url: new.photo_url,
        stats: new.stats,
        base_price,
        status: new.status.unwrap_or(PlayerStatus::Pending),
        team_id: None,
        sold_price: None,
        is_test_data: new.is_test_data,
    };
    state.players.insert(player.id, player.clone());
    Ok((player, config_changed(ctx)))
}

fn release_team_roster(state: &mut LedgerState, team_id: TeamId) {
    let released: Vec<PlayerId> = state
        .players
        .values()
        .filter(|p| p.status == PlayerStatus::Sold && p.team_id == Some(team_id))
        .map(|p| p.id)
        .collect();

    for player_id in released {
        let floor = {
            let sport = state.players[&player_id].sport;
            policy::sport_floor(&state.global.sport_min_bids, sport)
        };
        if let Some(player) = state.get_player_mut(player_id) {
            player.status = PlayerStatus::Eligible;
            player.team_id = None;
            player.sold_price = None;
            player.base_price = floor;
        }
    }
}

/// Restore one team's wallet to the default allocation, releasing its
/// roster back to the queue. Active bids by the team are dropped; the
/// permanent bid log is retained.
pub fn handle_reset_team_wallet(
    state: &mut LedgerState,
    ctx: &OpContext,
    team_id: TeamId,
) -> HandlerResult<Team> {
    if state.get_team(team_id).is_none() {
        return Err(AuctionError::TeamNotFound(team_id));
    }

    release_team_roster(state, team_id);
    state.clear_active_bids_by_team(team_id);

    let restored = state.default_team_budget;
    let team = state.get_team_mut(team_id).ok_or(AuctionError::TeamNotFound(team_id))?;
    team.budget = restored;
    team.remaining_budget = restored;
    let snapshot = team.clone();

    Ok((snapshot, config_changed(ctx)))
}

/// Restore every team's wallet and release all rosters. Clears the whole
/// transient active-bid list; the permanent log is retained.
pub fn handle_reset_all_wallets(state: &mut LedgerState, ctx: &OpContext) -> HandlerResult<usize> {
    let team_ids: Vec<TeamId> = state.teams.keys().copied().collect();
    for team_id in &team_ids {
        release_team_roster(state, *team_id);
    }
    let restored = state.default_team_budget;
    for team in state.teams.values_mut() {
        team.budget = restored;
        team.remaining_budget = restored;
    }
    state.active_bids.clear();

    Ok((team_ids.len(), config_changed(ctx)))
}

/// Reconcile every denormalized remaining budget against the sold roster.
/// Returns the ids of teams whose balance was corrected.
pub fn handle_recompute_budgets(
    state: &mut LedgerState,
    ctx: &OpContext,
) -> HandlerResult<Vec<TeamId>> {
    let adjusted = state.recompute_budgets();
    Ok((adjusted, config_changed(ctx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_types::DEFAULT_TEAM_BUDGET;

    fn ctx() -> OpContext {
        OpContext { timestamp: 1_000 }
    }

    fn setup() -> (LedgerState, TeamId, PlayerId) {
        let mut state = LedgerState::new();
        let (team, _) = handle_seed_team(
            &mut state,
            &ctx(),
            "Thunder".to_string(),
            Sport::Cricket,
            None,
            None,
            false,
        )
        .unwrap();
        let (player, _) = handle_seed_player(
            &mut state,
            &ctx(),
            NewPlayer {
                user_id: 1,
                name: "Asha".to_string(),
                sport: Sport::Cricket,
                year: ClassYear::Second,
                photo_url: None,
                stats: PlayerStats::new(),
                base_price: Some(50),
                status: Some(PlayerStatus::Eligible),
                is_test_data: false,
            },
        )
        .unwrap();
        (state, team.id, player.id)
    }

    #[test]
    fn test_start_lot_sets_auctioning() {
        let (mut state, _, player_id) = setup();
        let (player, events) = handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();
        assert_eq!(player.status, PlayerStatus::Auctioning);
        assert_eq!(player.base_price, 50);
        assert!(matches!(events[0], AuctionEvent::LotStarted { .. }));
    }

    #[test]
    fn test_start_lot_base_price_override() {
        let (mut state, _, player_id) = setup();
        let (player, _) = handle_start_lot(&mut state, &ctx(), player_id, Some(120)).unwrap();
        assert_eq!(player.base_price, 120);
    }

    #[test]
    fn test_start_lot_rejects_second_lot() {
        let (mut state, _, first) = setup();
        let (second, _) = handle_seed_player(
            &mut state,
            &ctx(),
            NewPlayer {
                user_id: 2,
                name: "Bina".to_string(),
                sport: Sport::Cricket,
                year: ClassYear::First,
                photo_url: None,
                stats: PlayerStats::new(),
                base_price: None,
                status: Some(PlayerStatus::Eligible),
                is_test_data: false,
            },
        )
        .unwrap();

        handle_start_lot(&mut state, &ctx(), first, None).unwrap();
        let err = handle_start_lot(&mut state, &ctx(), second.id, None).unwrap_err();
        assert_eq!(err, AuctionError::LotAlreadyActive(first));

        // Exactly one player is auctioning.
        let auctioning = state
            .players
            .values()
            .filter(|p| p.status == PlayerStatus::Auctioning)
            .count();
        assert_eq!(auctioning, 1);
    }

    #[test]
    fn test_start_lot_rejects_sold_player() {
        let (mut state, team_id, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();
        handle_resolve_sold(&mut state, &ctx(), player_id, team_id, 60).unwrap();

        let err = handle_start_lot(&mut state, &ctx(), player_id, None).unwrap_err();
        assert_eq!(err, AuctionError::AlreadySold(player_id));
    }

    #[test]
    fn test_place_bid_happy_path() {
        let (mut state, team_id, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();

        let (bid, events) = handle_place_bid(&mut state, &ctx(), player_id, team_id, 60).unwrap();
        assert_eq!(bid.amount, 60);
        assert_eq!(state.active_bids.len(), 1);
        assert_eq!(state.bid_log.len(), 1);
        assert!(matches!(
            events[0],
            AuctionEvent::BidAccepted { amount: 60, .. }
        ));
    }

    #[test]
    fn test_place_bid_requires_active_lot() {
        let (mut state, team_id, player_id) = setup();
        let err = handle_place_bid(&mut state, &ctx(), player_id, team_id, 60).unwrap_err();
        assert!(matches!(err, AuctionError::NotAuctioning { .. }));
        assert!(state.bid_log.is_empty());
    }

    #[test]
    fn test_place_bid_budget_cap_is_exact() {
        let (mut state, team_id, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();

        // Exactly the remaining budget is accepted.
        handle_place_bid(&mut state, &ctx(), player_id, team_id, 2000).unwrap();

        // One unit over is rejected, carrying the actual remaining amount.
        let (second, _) = handle_seed_team(
            &mut state,
            &ctx(),
            "Storm".to_string(),
            Sport::Cricket,
            Some(2000),
            None,
            false,
        )
        .unwrap();
        // 2100 clears the increment over the leading 2000 but not the
        // budget; the error carries the actual remaining amount.
        let err =
            handle_place_bid(&mut state, &ctx(), player_id, second.id, 2100).unwrap_err();
        assert_eq!(
            err,
            AuctionError::BudgetExceeded {
                amount: 2100,
                remaining: 2000
            }
        );
        assert_eq!(state.bid_log.len(), 1);
    }

    #[test]
    fn test_place_bid_monotonicity() {
        let (mut state, team_id, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();

        // Opening bid below the floor is rejected.
        let err = handle_place_bid(&mut state, &ctx(), player_id, team_id, 40).unwrap_err();
        assert_eq!(
            err,
            AuctionError::BidBelowMinimum {
                amount: 40,
                minimum: 50
            }
        );

        handle_place_bid(&mut state, &ctx(), player_id, team_id, 60).unwrap();

        // A follow-up below leading + increment(60) = 70 is rejected.
        let err = handle_place_bid(&mut state, &ctx(), player_id, team_id, 65).unwrap_err();
        assert_eq!(
            err,
            AuctionError::BidBelowMinimum {
                amount: 65,
                minimum: 70
            }
        );

        handle_place_bid(&mut state, &ctx(), player_id, team_id, 70).unwrap();
    }

    #[test]
    fn test_resolve_sold_updates_both_sides() {
        let (mut state, team_id, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();
        handle_place_bid(&mut state, &ctx(), player_id, team_id, 60).unwrap();

        let (outcome, events) =
            handle_resolve_sold(&mut state, &ctx(), player_id, team_id, 60).unwrap();
        assert!(matches!(outcome, LotOutcome::Sold { amount: 60, .. }));
        assert_eq!(events.len(), 2);

        let player = state.get_player(player_id).unwrap();
        assert_eq!(player.status, PlayerStatus::Sold);
        assert_eq!(player.team_id, Some(team_id));
        assert_eq!(player.sold_price, Some(60));
        assert_eq!(state.get_team(team_id).unwrap().remaining_budget, 1940);
    }

    #[test]
    fn test_resolve_sold_twice_is_conflict() {
        let (mut state, team_id, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();
        handle_resolve_sold(&mut state, &ctx(), player_id, team_id, 60).unwrap();

        let err = handle_resolve_sold(&mut state, &ctx(), player_id, team_id, 60).unwrap_err();
        assert_eq!(err, AuctionError::AlreadySold(player_id));
        // The budget was not decremented twice.
        assert_eq!(state.get_team(team_id).unwrap().remaining_budget, 1940);
    }

    #[test]
    fn test_resolve_unsold_is_idempotent() {
        let (mut state, _, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();

        handle_resolve_unsold(&mut state, &ctx(), player_id).unwrap();
        let first = state.get_player(player_id).unwrap().clone();

        handle_resolve_unsold(&mut state, &ctx(), player_id).unwrap();
        let second = state.get_player(player_id).unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(second.status, PlayerStatus::Unsold);
    }

    #[test]
    fn test_skip_resets_to_sport_floor() {
        let (mut state, _, player_id) = setup();
        state.global.sport_min_bids.insert(Sport::Cricket, 75);
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();

        let (outcome, _) = handle_skip(&mut state, &ctx(), player_id).unwrap();
        assert!(matches!(outcome, LotOutcome::Skipped { floor_price: 75, .. }));

        let player = state.get_player(player_id).unwrap();
        assert_eq!(player.status, PlayerStatus::Eligible);
        assert_eq!(player.base_price, 75);
    }

    #[test]
    fn test_reset_bid_clears_active_only() {
        let (mut state, team_id, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();
        handle_place_bid(&mut state, &ctx(), player_id, team_id, 60).unwrap();
        handle_place_bid(&mut state, &ctx(), player_id, team_id, 70).unwrap();

        let ((reset_player, floor), events) = handle_reset_bid(&mut state, &ctx()).unwrap();
        assert_eq!(reset_player, player_id);
        assert_eq!(floor, 50);
        assert!(state.active_bids.is_empty());
        assert_eq!(state.bid_log.len(), 2);
        assert!(matches!(events[0], AuctionEvent::BidReset { .. }));

        // The lot itself is unchanged.
        assert_eq!(
            state.get_player(player_id).unwrap().status,
            PlayerStatus::Auctioning
        );
    }

    #[test]
    fn test_reset_bid_requires_active_lot() {
        let (mut state, _, _) = setup();
        let err = handle_reset_bid(&mut state, &ctx()).unwrap_err();
        assert_eq!(err, AuctionError::NoActiveLot);
    }

    #[test]
    fn test_update_increment_rules_sorted_and_anchored() {
        let (mut state, _, _) = setup();
        let (stored, _) = handle_update_increment_rules(
            &mut state,
            &ctx(),
            vec![
                IncrementRule { threshold: 300, increment: 25 },
                IncrementRule { threshold: 0, increment: 5 },
            ],
        )
        .unwrap();
        assert_eq!(stored[0].threshold, 0);
        assert_eq!(stored[1].threshold, 300);

        let err = handle_update_increment_rules(
            &mut state,
            &ctx(),
            vec![IncrementRule { threshold: 10, increment: 5 }],
        )
        .unwrap_err();
        assert!(matches!(err, AuctionError::Validation(_)));
        // Rejected update leaves the stored schedule intact.
        assert_eq!(state.global.increment_rules[0].increment, 5);
    }

    #[test]
    fn test_wallet_reset_round_trip() {
        let (mut state, team_id, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();
        handle_place_bid(&mut state, &ctx(), player_id, team_id, 60).unwrap();
        handle_resolve_sold(&mut state, &ctx(), player_id, team_id, 60).unwrap();
        assert_eq!(state.get_team(team_id).unwrap().remaining_budget, 1940);

        handle_reset_all_wallets(&mut state, &ctx()).unwrap();

        let team = state.get_team(team_id).unwrap();
        assert_eq!(team.budget, DEFAULT_TEAM_BUDGET);
        assert_eq!(team.remaining_budget, DEFAULT_TEAM_BUDGET);

        // The player returns to the queue; no active bid references the
        // team, but the permanent log is retained.
        let player = state.get_player(player_id).unwrap();
        assert_eq!(player.status, PlayerStatus::Eligible);
        assert_eq!(player.team_id, None);
        assert!(state.active_bids.is_empty());
        assert_eq!(state.bid_log.len(), 1);
    }

    #[test]
    fn test_budget_invariant_over_sequences() {
        let (mut state, team_id, player_id) = setup();
        handle_start_lot(&mut state, &ctx(), player_id, None).unwrap();
        handle_resolve_sold(&mut state, &ctx(), player_id, team_id, 500).unwrap();
        handle_recompute_budgets(&mut state, &ctx()).unwrap();
        handle_reset_team_wallet(&mut state, &ctx(), team_id).unwrap();
        handle_recompute_budgets(&mut state, &ctx()).unwrap();

        for team in state.teams.values() {
            assert!(team.remaining_budget <= team.budget);
        }
    }

    #[test]
    fn test_seed_player_validates_stats() {
        let (mut state, _, _) = setup();
        let mut stats = PlayerStats::new();
        stats.insert("nested".to_string(), serde_json::json!([1, 2]));

        let err = handle_seed_player(
            &mut state,
            &ctx(),
            NewPlayer {
                user_id: 5,
                name: "Chitra".to_string(),
                sport: Sport::Volleyball,
                year: ClassYear::Third,
                photo_url: None,
                stats,
                base_price: None,
                status: None,
                is_test_data: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AuctionError::Validation(_)));
    }

    #[test]
    fn test_failed_operation_returns_no_events() {
        let (mut state, team_id, player_id) = setup();
        // No active lot: the bid is rejected before any mutation, so there
        // is nothing to publish.
        assert!(handle_place_bid(&mut state, &ctx(), player_id, team_id, 60).is_err());
        assert!(state.active_bids.is_empty());
        assert!(state.bid_log.is_empty());
    }
}

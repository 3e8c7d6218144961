//! End-to-end integration tests for the gavel live auction.
//!
//! These tests exercise the full auction lifecycle:
//! 1. Genesis and seeding
//! 2. Opening lots and competitive bidding
//! 3. Sold, unsold, skipped, and reset transitions
//! 4. Wallet resets and budget reconciliation
//! 5. The composed server with its broadcast room

#![cfg(test)]

use gavel_engine::handlers::{self, OpContext};
use gavel_engine::queries;
use gavel_engine::{AuctionError, GenesisConfig, LedgerState, NewPlayer};
use gavel_server::types::{PlaceBidParams, ResolveSoldParams, SeedTeamParams, StartLotParams};
use gavel_server::{AuctionApiServer, AuctionServer};
use gavel_types::{
    AuctionEvent, ClassYear, LotOutcome, PlayerId, PlayerStats, PlayerStatus, Sport, TeamId,
};

fn ctx(timestamp: u64) -> OpContext {
    OpContext { timestamp }
}

fn seed_team(state: &mut LedgerState, name: &str, sport: Sport) -> TeamId {
    let (team, _) = handlers::handle_seed_team(
        state,
        &ctx(0),
        name.to_string(),
        sport,
        None,
        None,
        false,
    )
    .unwrap();
    team.id
}

fn seed_player(state: &mut LedgerState, name: &str, sport: Sport, base_price: u64) -> PlayerId {
    let (player, _) = handlers::handle_seed_player(
        state,
        &ctx(0),
        NewPlayer {
            user_id: 1,
            name: name.to_string(),
            sport,
            year: ClassYear::Second,
            photo_url: None,
            stats: PlayerStats::new(),
            base_price: Some(base_price),
            status: Some(PlayerStatus::Eligible),
            is_test_data: false,
        },
    )
    .unwrap();
    player.id
}

/// Every team's spend plus remaining balance must equal its allocation,
/// and at most one player may be under the hammer.
fn assert_ledger_invariants(state: &LedgerState) {
    for team in state.teams.values() {
        assert_eq!(
            state.spent_by_team(team.id) + team.remaining_budget,
            team.budget,
            "budget conservation broken for team {}",
            team.id
        );
    }
    let auctioning = state
        .players
        .values()
        .filter(|p| p.status == PlayerStatus::Auctioning)
        .count();
    assert!(auctioning <= 1, "more than one lot under the hammer");
}

/// The complete auction-day flow against one ledger.
#[test]
fn test_full_auction_lifecycle() {
    // ========================================
    // Phase 1: Genesis and seeding
    // ========================================

    let mut state = GenesisConfig::default().build().unwrap();
    let thunder = seed_team(&mut state, "Thunder", Sport::Cricket);
    let strikers = seed_team(&mut state, "Strikers", Sport::Cricket);
    let asha = seed_player(&mut state, "Asha", Sport::Cricket, 100);
    let dev = seed_player(&mut state, "Dev", Sport::Cricket, 50);
    let mira = seed_player(&mut state, "Mira", Sport::Cricket, 50);

    let (_, _) = handlers::handle_set_active(&mut state, &ctx(1), true).unwrap();

    // ========================================
    // Phase 2: First lot, competitive bidding
    // ========================================

    let (lot, _) = handlers::handle_start_lot(&mut state, &ctx(10), asha, None).unwrap();
    assert_eq!(lot.base_price, 100);
    assert_eq!(lot.status, PlayerStatus::Auctioning);

    // Below the base price: rejected, ledger untouched.
    let err = handlers::handle_place_bid(&mut state, &ctx(11), asha, thunder, 90).unwrap_err();
    assert!(matches!(err, AuctionError::BidBelowMinimum { minimum: 100, .. }));

    handlers::handle_place_bid(&mut state, &ctx(12), asha, thunder, 100).unwrap();
    // Below leading + increment (100 + 10): rejected.
    let err = handlers::handle_place_bid(&mut state, &ctx(13), asha, strikers, 105).unwrap_err();
    assert!(matches!(err, AuctionError::BidBelowMinimum { minimum: 110, .. }));

    handlers::handle_place_bid(&mut state, &ctx(14), asha, strikers, 150).unwrap();
    handlers::handle_place_bid(&mut state, &ctx(15), asha, thunder, 300).unwrap();

    let view = queries::current_lot(&state);
    let current = view.current_lot.unwrap();
    assert_eq!(current.current_price, 300);
    // Past the 200 threshold the step is 50.
    assert_eq!(current.next_min_bid, 350);

    // ========================================
    // Phase 3: Hammer falls
    // ========================================

    let (outcome, events) =
        handlers::handle_resolve_sold(&mut state, &ctx(20), asha, thunder, 300).unwrap();
    assert!(matches!(outcome, LotOutcome::Sold { amount: 300, .. }));
    assert!(events
        .iter()
        .any(|e| matches!(e, AuctionEvent::LotResolved { .. })));

    let team = state.get_team(thunder).unwrap();
    assert_eq!(team.remaining_budget, 1700);
    let player = state.get_player(asha).unwrap();
    assert_eq!(player.status, PlayerStatus::Sold);
    assert_eq!(player.team_id, Some(thunder));
    assert_eq!(player.sold_price, Some(300));
    assert_ledger_invariants(&state);

    // Selling the same lot twice is a conflict, not a second debit.
    let err =
        handlers::handle_resolve_sold(&mut state, &ctx(21), asha, strikers, 300).unwrap_err();
    assert!(matches!(err, AuctionError::AlreadySold(_)));
    assert_eq!(state.get_team(strikers).unwrap().remaining_budget, 2000);

    // ========================================
    // Phase 4: Unsold, skipped, and reset lots
    // ========================================

    handlers::handle_start_lot(&mut state, &ctx(30), dev, None).unwrap();
    let (outcome, _) = handlers::handle_resolve_unsold(&mut state, &ctx(31), dev).unwrap();
    assert!(matches!(outcome, LotOutcome::Unsold { .. }));
    assert_eq!(state.get_player(dev).unwrap().status, PlayerStatus::Unsold);
    // Releasing an already idle lot is a no-op, not an error.
    handlers::handle_resolve_unsold(&mut state, &ctx(32), dev).unwrap();

    handlers::handle_start_lot(&mut state, &ctx(40), mira, Some(80)).unwrap();
    handlers::handle_place_bid(&mut state, &ctx(41), mira, strikers, 80).unwrap();
    let (cleared_player, _) = handlers::handle_reset_bid(&mut state, &ctx(42)).unwrap();
    assert_eq!(cleared_player.0, mira);
    assert!(state.leading_bid(mira).is_none());

    let (outcome, _) = handlers::handle_skip(&mut state, &ctx(43), mira).unwrap();
    assert!(matches!(outcome, LotOutcome::Skipped { floor_price: 50, .. }));
    assert_eq!(state.get_player(mira).unwrap().status, PlayerStatus::Eligible);
    assert_ledger_invariants(&state);

    // ========================================
    // Phase 5: Wallet reset and reconciliation
    // ========================================

    let log_before = state.bid_log.len();
    let (count, _) = handlers::handle_reset_all_wallets(&mut state, &ctx(50)).unwrap();
    assert_eq!(count, 2);
    assert_eq!(state.get_team(thunder).unwrap().remaining_budget, 2000);
    assert_eq!(state.get_player(asha).unwrap().status, PlayerStatus::Eligible);
    assert!(state.active_bids.is_empty());
    // The audit log survives every reset.
    assert_eq!(state.bid_log.len(), log_before);

    let (adjusted, _) = handlers::handle_recompute_budgets(&mut state, &ctx(51)).unwrap();
    assert!(adjusted.is_empty());
    assert_ledger_invariants(&state);
}

/// A team's remaining budget is a hard cap across consecutive lots.
#[test]
fn test_budget_is_a_hard_cap_across_lots() {
    let mut state = GenesisConfig::default().build().unwrap();
    let team = seed_team(&mut state, "Thunder", Sport::Futsal);
    let first = seed_player(&mut state, "Rohan", Sport::Futsal, 50);
    let second = seed_player(&mut state, "Kiran", Sport::Futsal, 50);

    handlers::handle_start_lot(&mut state, &ctx(1), first, None).unwrap();
    handlers::handle_place_bid(&mut state, &ctx(2), first, team, 1800).unwrap();
    handlers::handle_resolve_sold(&mut state, &ctx(3), first, team, 1800).unwrap();
    assert_eq!(state.get_team(team).unwrap().remaining_budget, 200);

    handlers::handle_start_lot(&mut state, &ctx(4), second, None).unwrap();

    // Exactly the remaining budget is allowed.
    handlers::handle_place_bid(&mut state, &ctx(5), second, team, 200).unwrap();
    let (_, _) = handlers::handle_reset_bid(&mut state, &ctx(6)).unwrap();

    // One unit past it is not.
    let err = handlers::handle_place_bid(&mut state, &ctx(7), second, team, 201).unwrap_err();
    assert!(matches!(err, AuctionError::BudgetExceeded { remaining: 200, .. }));
    assert_ledger_invariants(&state);
}

/// Only one lot can be open; a second start names the blocking lot.
#[test]
fn test_single_lot_at_a_time() {
    let mut state = GenesisConfig::default().build().unwrap();
    seed_team(&mut state, "Thunder", Sport::Volleyball);
    let first = seed_player(&mut state, "Asha", Sport::Volleyball, 50);
    let second = seed_player(&mut state, "Dev", Sport::Volleyball, 50);

    handlers::handle_start_lot(&mut state, &ctx(1), first, None).unwrap();
    let err = handlers::handle_start_lot(&mut state, &ctx(2), second, None).unwrap_err();
    assert!(matches!(err, AuctionError::LotAlreadyActive(id) if id == first));

    // Restarting the already open lot is idempotent.
    handlers::handle_start_lot(&mut state, &ctx(3), first, None).unwrap();
    assert_ledger_invariants(&state);
}

/// Lockdown hides sandbox teams from the public leaderboard but never
/// from the admin view.
#[test]
fn test_lockdown_filters_leaderboard() {
    let mut state = GenesisConfig::default().build().unwrap();
    seed_team(&mut state, "Thunder", Sport::Cricket);
    let (sandbox, _) = handlers::handle_seed_team(
        &mut state,
        &ctx(0),
        "Testground XI".to_string(),
        Sport::Cricket,
        None,
        None,
        true,
    )
    .unwrap();

    assert_eq!(queries::leaderboard(&state, false).len(), 2);

    handlers::handle_set_lockdown(&mut state, &ctx(1), true).unwrap();
    let public = queries::leaderboard(&state, false);
    assert_eq!(public.len(), 1);
    assert!(public.iter().all(|e| e.team_id != sandbox.id));
    assert_eq!(queries::leaderboard(&state, true).len(), 2);
}

/// The composed server: every committed transition reaches the room, in
/// commit order, and failed operations stay silent.
#[tokio::test]
async fn test_server_streams_committed_transitions() {
    let server = AuctionServer::new(GenesisConfig::default().build().unwrap());

    let team = server
        .seed_team(SeedTeamParams {
            name: "Thunder".into(),
            sport: Sport::Cricket,
            budget: None,
            logo_url: None,
            is_test_data: false,
        })
        .await
        .unwrap();
    let player = server
        .seed_player(NewPlayer {
            user_id: 1,
            name: "Asha".into(),
            sport: Sport::Cricket,
            year: ClassYear::First,
            photo_url: None,
            stats: PlayerStats::new(),
            base_price: Some(50),
            status: Some(PlayerStatus::Eligible),
            is_test_data: false,
        })
        .await
        .unwrap();

    let mut room = server.room().join();

    server
        .start_lot(StartLotParams {
            player_id: player.id,
            base_price: None,
        })
        .await
        .unwrap();

    // A doomed bid between two committed operations leaves no trace in
    // the stream.
    server
        .place_bid(PlaceBidParams {
            player_id: player.id,
            team_id: team.id,
            amount: 10,
        })
        .await
        .unwrap_err();

    server
        .place_bid(PlaceBidParams {
            player_id: player.id,
            team_id: team.id,
            amount: 50,
        })
        .await
        .unwrap();
    server
        .resolve_sold(ResolveSoldParams {
            player_id: player.id,
            team_id: team.id,
            final_price: 50,
        })
        .await
        .unwrap();

    assert!(matches!(
        room.recv().await.unwrap(),
        AuctionEvent::LotStarted { .. }
    ));
    assert!(matches!(
        room.recv().await.unwrap(),
        AuctionEvent::BidAccepted { amount: 50, .. }
    ));
    assert!(matches!(
        room.recv().await.unwrap(),
        AuctionEvent::LotResolved {
            outcome: LotOutcome::Sold { amount: 50, .. },
            ..
        }
    ));
}

/// Broadcast order equals commit order under concurrent bidders.
///
/// Strict monotonicity forces every committed bid above the previous
/// leader, so commit order is exactly increasing-amount order; the room
/// must observe the same sequence.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_broadcast_order_matches_commit_order() {
    use std::sync::Arc;
    use tokio::sync::broadcast::error::TryRecvError;

    let server = Arc::new(AuctionServer::new(GenesisConfig::default().build().unwrap()));

    let mut teams = Vec::new();
    for name in ["Thunder", "Strikers", "Titans", "Falcons", "Comets", "Rhinos"] {
        let team = server
            .seed_team(SeedTeamParams {
                name: name.into(),
                sport: Sport::Cricket,
                budget: None,
                logo_url: None,
                is_test_data: false,
            })
            .await
            .unwrap();
        teams.push(team.id);
    }
    let player = server
        .seed_player(NewPlayer {
            user_id: 1,
            name: "Asha".into(),
            sport: Sport::Cricket,
            year: ClassYear::First,
            photo_url: None,
            stats: PlayerStats::new(),
            base_price: Some(50),
            status: Some(PlayerStatus::Eligible),
            is_test_data: false,
        })
        .await
        .unwrap();
    server
        .start_lot(StartLotParams {
            player_id: player.id,
            base_price: None,
        })
        .await
        .unwrap();

    let mut room = server.room().join();

    for _ in 0..20 {
        server.reset_bid().await.unwrap();

        let mut bidders = Vec::new();
        for &team_id in &teams {
            let server = Arc::clone(&server);
            let player_id = player.id;
            bidders.push(tokio::spawn(async move {
                loop {
                    let view = server.current_lot().await.unwrap();
                    let Some(lot) = view.current_lot else { break };
                    if lot.next_min_bid > 1400 {
                        break;
                    }
                    // Losing the race to another bidder is expected; the
                    // stale amount is simply rejected.
                    let _ = server
                        .place_bid(PlaceBidParams {
                            player_id,
                            team_id,
                            amount: lot.next_min_bid,
                        })
                        .await;
                }
            }));
        }
        for bidder in bidders {
            bidder.await.unwrap();
        }

        let mut last = 0;
        loop {
            match room.try_recv() {
                Ok(AuctionEvent::BidAccepted { amount, .. }) => {
                    assert!(
                        amount > last,
                        "broadcast order diverged from commit order: observed {amount} after {last}"
                    );
                    last = amount;
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(err) => panic!("room receiver failed: {err}"),
            }
        }
        assert!(last > 1300, "bidding round stopped short at {last}");
    }
}

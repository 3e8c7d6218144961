//! JSON-RPC surface of the auction server.
//!
//! Every state-changing method runs its handler under the ledger's write
//! lock and publishes the returned events before the lock is released:
//! commit first, broadcast second, and broadcast order equals commit
//! order. A failed operation publishes nothing.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonrpsee::core::{async_trait, SubscriptionResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{PendingSubscriptionSink, SubscriptionMessage};
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use gavel_engine::handlers::{self, OpContext};
use gavel_engine::queries::{self, BidLogEntry, CurrentLotView, LeaderboardEntry};
use gavel_engine::{AuctionError, ErrorKind, HandlerResult, LedgerState, NewPlayer};
use gavel_types::{Bid, GlobalState, IncrementRule, LotOutcome, Player, Team};

use crate::broadcast::{Broadcaster, ChannelBroadcaster};
use crate::types::{
    AnimationParams, IncrementRulesParams, PlaceBidParams, PlayerIdParams, RecomputeResponse,
    ResetBidResponse, ResolveSoldParams, SeedTeamParams, SportMinBidsParams, StartLotParams,
};

/// Default number of rows returned by the bid-log query.
const DEFAULT_BID_LOG_LIMIT: usize = 200;

/// RPC API of the auction server.
#[rpc(server)]
pub trait AuctionApi {
    // ============ Auction Methods ============

    /// Open a lot for bidding.
    #[method(name = "auction_startLot")]
    async fn start_lot(&self, params: StartLotParams) -> Result<Player, ErrorObjectOwned>;

    /// Place a bid on the active lot.
    #[method(name = "auction_placeBid")]
    async fn place_bid(&self, params: PlaceBidParams) -> Result<Bid, ErrorObjectOwned>;

    /// Resolve the lot as sold to a team.
    #[method(name = "auction_resolveSold")]
    async fn resolve_sold(&self, params: ResolveSoldParams)
        -> Result<LotOutcome, ErrorObjectOwned>;

    /// Release the lot unsold.
    #[method(name = "auction_resolveUnsold")]
    async fn resolve_unsold(&self, params: PlayerIdParams)
        -> Result<LotOutcome, ErrorObjectOwned>;

    /// Send the lot back to the queue at its sport's floor price.
    #[method(name = "auction_skipPlayer")]
    async fn skip_player(&self, params: PlayerIdParams) -> Result<LotOutcome, ErrorObjectOwned>;

    /// Clear the accumulated bids for the current lot.
    #[method(name = "auction_resetBid")]
    async fn reset_bid(&self) -> Result<ResetBidResponse, ErrorObjectOwned>;

    // ============ Query Methods ============

    /// The current lot with its leading bid, or null when idle.
    #[method(name = "query_currentLot")]
    async fn current_lot(&self) -> Result<CurrentLotView, ErrorObjectOwned>;

    /// Teams with rosters and spend totals, highest spend first.
    #[method(name = "query_leaderboard")]
    async fn leaderboard(
        &self,
        include_test_data: Option<bool>,
    ) -> Result<Vec<LeaderboardEntry>, ErrorObjectOwned>;

    /// Recent entries of the permanent bid log, newest first.
    #[method(name = "query_bidLog")]
    async fn bid_log(&self, limit: Option<usize>) -> Result<Vec<BidLogEntry>, ErrorObjectOwned>;

    // ============ Global State ============

    /// Snapshot of the singleton global state.
    #[method(name = "state_get")]
    async fn get_state(&self) -> Result<GlobalState, ErrorObjectOwned>;

    /// Toggle the auction-active flag.
    #[method(name = "state_setActive")]
    async fn set_active(&self, is_active: bool) -> Result<GlobalState, ErrorObjectOwned>;

    /// Toggle the registration-open flag.
    #[method(name = "state_setRegistrationOpen")]
    async fn set_registration_open(&self, is_open: bool)
        -> Result<GlobalState, ErrorObjectOwned>;

    /// Toggle the sandbox-data lockdown flag.
    #[method(name = "state_setLockdown")]
    async fn set_lockdown(&self, locked: bool) -> Result<GlobalState, ErrorObjectOwned>;

    /// Replace the per-sport minimum opening bids.
    #[method(name = "state_updateSportMinBids")]
    async fn update_sport_min_bids(
        &self,
        params: SportMinBidsParams,
    ) -> Result<GlobalState, ErrorObjectOwned>;

    /// Replace the increment schedule; stored sorted ascending.
    #[method(name = "state_updateIncrementRules")]
    async fn update_increment_rules(
        &self,
        params: IncrementRulesParams,
    ) -> Result<Vec<IncrementRule>, ErrorObjectOwned>;

    /// Update presentation timing parameters.
    #[method(name = "state_updateAnimation")]
    async fn update_animation(
        &self,
        params: AnimationParams,
    ) -> Result<GlobalState, ErrorObjectOwned>;

    // ============ Administration ============

    /// Create a team record.
    #[method(name = "admin_seedTeam")]
    async fn seed_team(&self, params: SeedTeamParams) -> Result<Team, ErrorObjectOwned>;

    /// Create a player record.
    #[method(name = "admin_seedPlayer")]
    async fn seed_player(&self, params: NewPlayer) -> Result<Player, ErrorObjectOwned>;

    /// Restore one team's wallet and release its roster.
    #[method(name = "admin_resetTeamWallet")]
    async fn reset_team_wallet(&self, team_id: u64) -> Result<Team, ErrorObjectOwned>;

    /// Restore every team's wallet; returns the number of teams reset.
    #[method(name = "admin_resetAllWallets")]
    async fn reset_all_wallets(&self) -> Result<usize, ErrorObjectOwned>;

    /// Reconcile denormalized budgets against sold rosters.
    #[method(name = "admin_recomputeBudgets")]
    async fn recompute_budgets(&self) -> Result<RecomputeResponse, ErrorObjectOwned>;

    // ============ Broadcast ============

    /// Join the auction room and stream every subsequent event.
    #[subscription(name = "auction_subscribeEvents" => "auction_event", unsubscribe = "auction_unsubscribeEvents", item = gavel_types::AuctionEvent)]
    async fn subscribe_events(&self) -> SubscriptionResult;
}

/// The auction server: shared ledger plus the broadcast room.
pub struct AuctionServer {
    state: Arc<RwLock<LedgerState>>,
    room: ChannelBroadcaster,
}

impl AuctionServer {
    pub fn new(state: LedgerState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            room: ChannelBroadcaster::new(),
        }
    }

    /// The broadcast room, for co-hosted consumers.
    pub fn room(&self) -> &ChannelBroadcaster {
        &self.room
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Run one state-changing operation: handler under the write lock,
    /// publish under the same lock. Publishing before the guard drops is
    /// what makes broadcast order equal commit order across concurrent
    /// operations; `broadcast::Sender::send` never blocks, so the lock is
    /// held no longer than the send itself. Expected domain errors are
    /// logged at debug; not-found and internal failures at error with the
    /// operation context.
    fn apply<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut LedgerState, &OpContext) -> HandlerResult<T>,
    ) -> Result<T, ErrorObjectOwned> {
        let ctx = OpContext {
            timestamp: Self::now_ms(),
        };
        let result = {
            let mut state = self.state.write();
            let result = f(&mut state, &ctx);
            if let Ok((_, events)) = &result {
                for event in events {
                    self.room.publish(event.clone());
                }
            }
            result
        };

        match result {
            Ok((value, _)) => Ok(value),
            Err(err) => {
                match err.kind() {
                    ErrorKind::NotFound | ErrorKind::Internal => {
                        error!(op, %err, "operation failed");
                    }
                    _ => debug!(op, %err, "operation rejected"),
                }
                Err(to_rpc_error(&err))
            }
        }
    }
}

/// Map an engine error onto a wire error with a machine-readable code.
/// Budget errors carry the team's actual remaining amount for display.
pub fn to_rpc_error(err: &AuctionError) -> ErrorObjectOwned {
    let code = match err.kind() {
        ErrorKind::Validation => -32001,
        ErrorKind::NotFound => -32002,
        ErrorKind::Conflict => -32003,
        ErrorKind::BudgetExceeded => -32004,
        ErrorKind::Internal => -32603,
    };
    match err {
        AuctionError::BudgetExceeded { remaining, .. } => ErrorObjectOwned::owned(
            code,
            err.to_string(),
            Some(serde_json::json!({ "remaining": remaining })),
        ),
        _ => ErrorObjectOwned::owned(code, err.to_string(), None::<()>),
    }
}

#[async_trait]
impl AuctionApiServer for AuctionServer {
    async fn start_lot(&self, params: StartLotParams) -> Result<Player, ErrorObjectOwned> {
        let player = self.apply("start_lot", |state, ctx| {
            handlers::handle_start_lot(state, ctx, params.player_id, params.base_price)
        })?;
        info!(player_id = player.id, base_price = player.base_price, "lot started");
        Ok(player)
    }

    async fn place_bid(&self, params: PlaceBidParams) -> Result<Bid, ErrorObjectOwned> {
        let bid = self.apply("place_bid", |state, ctx| {
            handlers::handle_place_bid(state, ctx, params.player_id, params.team_id, params.amount)
        })?;
        info!(
            player_id = bid.player_id,
            team_id = bid.team_id,
            amount = bid.amount,
            "bid accepted"
        );
        Ok(bid)
    }

    async fn resolve_sold(
        &self,
        params: ResolveSoldParams,
    ) -> Result<LotOutcome, ErrorObjectOwned> {
        let outcome = self.apply("resolve_sold", |state, ctx| {
            handlers::handle_resolve_sold(
                state,
                ctx,
                params.player_id,
                params.team_id,
                params.final_price,
            )
        })?;
        info!(
            player_id = params.player_id,
            team_id = params.team_id,
            final_price = params.final_price,
            "lot sold"
        );
        Ok(outcome)
    }

    async fn resolve_unsold(
        &self,
        params: PlayerIdParams,
    ) -> Result<LotOutcome, ErrorObjectOwned> {
        self.apply("resolve_unsold", |state, ctx| {
            handlers::handle_resolve_unsold(state, ctx, params.player_id)
        })
    }

    async fn skip_player(&self, params: PlayerIdParams) -> Result<LotOutcome, ErrorObjectOwned> {
        self.apply("skip_player", |state, ctx| {
            handlers::handle_skip(state, ctx, params.player_id)
        })
    }

    async fn reset_bid(&self) -> Result<ResetBidResponse, ErrorObjectOwned> {
        let (player_id, floor_price) = self.apply("reset_bid", handlers::handle_reset_bid)?;
        info!(player_id, floor_price, "bids reset for current lot");
        Ok(ResetBidResponse {
            player_id,
            floor_price,
        })
    }

    async fn current_lot(&self) -> Result<CurrentLotView, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(queries::current_lot(&state))
    }

    async fn leaderboard(
        &self,
        include_test_data: Option<bool>,
    ) -> Result<Vec<LeaderboardEntry>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(queries::leaderboard(&state, include_test_data.unwrap_or(false)))
    }

    async fn bid_log(&self, limit: Option<usize>) -> Result<Vec<BidLogEntry>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(queries::recent_bids(
            &state,
            limit.unwrap_or(DEFAULT_BID_LOG_LIMIT),
        ))
    }

    async fn get_state(&self) -> Result<GlobalState, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(queries::global_state(&state))
    }

    async fn set_active(&self, is_active: bool) -> Result<GlobalState, ErrorObjectOwned> {
        self.apply("set_active", |state, ctx| {
            handlers::handle_set_active(state, ctx, is_active)
        })
    }

    async fn set_registration_open(
        &self,
        is_open: bool,
    ) -> Result<GlobalState, ErrorObjectOwned> {
        self.apply("set_registration_open", |state, ctx| {
            handlers::handle_set_registration_open(state, ctx, is_open)
        })
    }

    async fn set_lockdown(&self, locked: bool) -> Result<GlobalState, ErrorObjectOwned> {
        self.apply("set_lockdown", |state, ctx| {
            handlers::handle_set_lockdown(state, ctx, locked)
        })
    }

    async fn update_sport_min_bids(
        &self,
        params: SportMinBidsParams,
    ) -> Result<GlobalState, ErrorObjectOwned> {
        self.apply("update_sport_min_bids", |state, ctx| {
            handlers::handle_update_sport_min_bids(state, ctx, params.sport_min_bids)
        })
    }

    async fn update_increment_rules(
        &self,
        params: IncrementRulesParams,
    ) -> Result<Vec<IncrementRule>, ErrorObjectOwned> {
        self.apply("update_increment_rules", |state, ctx| {
            handlers::handle_update_increment_rules(state, ctx, params.rules)
        })
    }

    async fn update_animation(
        &self,
        params: AnimationParams,
    ) -> Result<GlobalState, ErrorObjectOwned> {
        self.apply("update_animation", |state, ctx| {
            handlers::handle_update_animation(state, ctx, params.duration, params.animation_type)
        })
    }

    async fn seed_team(&self, params: SeedTeamParams) -> Result<Team, ErrorObjectOwned> {
        self.apply("seed_team", |state, ctx| {
            handlers::handle_seed_team(
                state,
                ctx,
                params.name,
                params.sport,
                params.budget,
                params.logo_url,
                params.is_test_data,
            )
        })
    }

    async fn seed_player(&self, params: NewPlayer) -> Result<Player, ErrorObjectOwned> {
        self.apply("seed_player", |state, ctx| {
            handlers::handle_seed_player(state, ctx, params)
        })
    }

    async fn reset_team_wallet(&self, team_id: u64) -> Result<Team, ErrorObjectOwned> {
        self.apply("reset_team_wallet", |state, ctx| {
            handlers::handle_reset_team_wallet(state, ctx, team_id)
        })
    }

    async fn reset_all_wallets(&self) -> Result<usize, ErrorObjectOwned> {
        self.apply("reset_all_wallets", handlers::handle_reset_all_wallets)
    }

    async fn recompute_budgets(&self) -> Result<RecomputeResponse, ErrorObjectOwned> {
        let adjusted_teams =
            self.apply("recompute_budgets", handlers::handle_recompute_budgets)?;
        Ok(RecomputeResponse { adjusted_teams })
    }

    async fn subscribe_events(&self, pending: PendingSubscriptionSink) -> SubscriptionResult {
        let sink = pending.accept().await?;
        let mut events = self.room.join();

        loop {
            tokio::select! {
                _ = sink.closed() => break,
                next = events.recv() => match next {
                    Ok(event) => {
                        let msg = match SubscriptionMessage::from_json(&event) {
                            Ok(msg) => msg,
                            Err(err) => {
                                warn!(%err, "failed to encode auction event");
                                continue;
                            }
                        };
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // The subscriber fell behind the room buffer; it
                        // will reconcile via the current-lot query.
                        warn!(missed, "subscriber lagged behind auction room");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        Ok(())
    }
}

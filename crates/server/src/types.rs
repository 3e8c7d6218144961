//! RPC parameter types for the auction server.
//!
//! Domain and view types from `gavel-types`/`gavel-engine` are already
//! JSON-serializable and cross the wire as-is; this module only defines
//! the request-side parameter objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gavel_types::{IncrementRule, PlayerId, Sport, TeamId};

/// Parameters for opening a lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartLotParams {
    pub player_id: PlayerId,
    /// Overrides the stored base price when present.
    #[serde(default)]
    pub base_price: Option<u64>,
}

/// Parameters for placing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBidParams {
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub amount: u64,
}

/// Parameters for resolving a lot as sold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveSoldParams {
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub final_price: u64,
}

/// Parameters naming a single player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerIdParams {
    pub player_id: PlayerId,
}

/// Parameters for replacing the per-sport minimum bids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportMinBidsParams {
    pub sport_min_bids: BTreeMap<Sport, u64>,
}

/// Parameters for replacing the increment schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementRulesParams {
    pub rules: Vec<IncrementRule>,
}

/// Parameters for updating presentation timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationParams {
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub animation_type: Option<String>,
}

/// Parameters for seeding a team record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTeamParams {
    pub name: String,
    pub sport: Sport,
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub is_test_data: bool,
}

/// Acknowledgement carrying the reset floor price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetBidResponse {
    pub player_id: PlayerId,
    pub floor_price: u64,
}

/// Acknowledgement for budget reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecomputeResponse {
    /// Teams whose remaining budget was corrected.
    pub adjusted_teams: Vec<TeamId>,
}

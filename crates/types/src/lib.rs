//! Core type definitions for the gavel live-auction system.
//!
//! This crate provides the shared data structures used across the auction
//! system: the player and team records, bid entries, the global auction
//! state, and the domain events fanned out over the broadcast channel.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =========================
// IDENTIFIERS
// =========================

pub type PlayerId = u64;
pub type TeamId = u64;
pub type BidId = u64;
pub type UserId = u64;

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;

// =========================
// DEFAULTS
// =========================

/// Opening-bid floor used when neither an override nor a stored base price
/// nor a sport minimum applies.
pub const DEFAULT_FLOOR_PRICE: u64 = 50;

/// Default total allocation for a new or reset team wallet.
pub const DEFAULT_TEAM_BUDGET: u64 = 2000;

// =========================
// ENUMERATIONS
// =========================

/// The fixed set of sports teams and players belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Cricket,
    Futsal,
    Volleyball,
}

impl Sport {
    pub const ALL: [Sport; 3] = [Sport::Cricket, Sport::Futsal, Sport::Volleyball];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Cricket => "cricket",
            Sport::Futsal => "futsal",
            Sport::Volleyball => "volleyball",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sport {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cricket" => Ok(Sport::Cricket),
            "futsal" => Ok(Sport::Futsal),
            "volleyball" => Ok(Sport::Volleyball),
            other => Err(ParseEnumError {
                kind: "sport",
                got: other.to_string(),
            }),
        }
    }
}

/// Academic year tier of a registered player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassYear {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
    #[serde(rename = "3rd")]
    Third,
}

/// Lifecycle status of a player record.
///
/// `Pending -> Approved -> Eligible -> Auctioning -> {Sold | Unsold}`,
/// where `Unsold` and `Eligible` are re-enterable: a skipped lot returns
/// to `Eligible`, a released sale returns to the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Pending,
    Approved,
    Eligible,
    Auctioning,
    Sold,
    Unsold,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Pending => "pending",
            PlayerStatus::Approved => "approved",
            PlayerStatus::Eligible => "eligible",
            PlayerStatus::Auctioning => "auctioning",
            PlayerStatus::Sold => "sold",
            PlayerStatus::Unsold => "unsold",
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a closed enumeration from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {got:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub got: String,
}

// =========================
// RECORDS
// =========================

/// Open key-value stat payload attached to a player.
///
/// The shape is sport-specific and validated at the ingestion boundary
/// (see [`validate_stats`]); the state machine treats it as opaque.
pub type PlayerStats = serde_json::Map<String, serde_json::Value>;

/// Maximum number of stat entries accepted at ingestion.
pub const MAX_STAT_ENTRIES: usize = 32;

/// Validate a stat payload at the ingestion boundary.
///
/// Values must be JSON scalars (numbers, strings, booleans); nesting is
/// rejected so downstream views can render entries directly.
pub fn validate_stats(stats: &PlayerStats) -> Result<(), StatsError> {
    if stats.len() > MAX_STAT_ENTRIES {
        return Err(StatsError::TooManyEntries(stats.len()));
    }
    for (key, value) in stats {
        if key.is_empty() {
            return Err(StatsError::EmptyKey);
        }
        if value.is_object() || value.is_array() {
            return Err(StatsError::NestedValue(key.clone()));
        }
    }
    Ok(())
}

/// Errors produced by stat-payload validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    #[error("too many stat entries: {0} (max {MAX_STAT_ENTRIES})")]
    TooManyEntries(usize),

    #[error("stat keys must be non-empty")]
    EmptyKey,

    #[error("stat {0:?} must be a scalar value")]
    NestedValue(String),
}

/// A registered player, the unit put up for auction (the "lot").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub user_id: UserId,
    pub name: String,
    pub sport: Sport,
    pub year: ClassYear,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub stats: PlayerStats,
    pub base_price: u64,
    pub status: PlayerStatus,
    #[serde(default)]
    pub team_id: Option<TeamId>,
    #[serde(default)]
    pub sold_price: Option<u64>,
    #[serde(default)]
    pub is_test_data: bool,
}

/// A franchise team holding a bidding budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub sport: Sport,
    pub budget: u64,
    pub remaining_budget: u64,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub is_test_data: bool,
}

/// One accepted bid. Stored both in the transient active-bid list for the
/// current lot and in the permanent bid log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub amount: u64,
    pub timestamp: Timestamp,
}

// =========================
// GLOBAL AUCTION STATE
// =========================

/// One `{threshold, increment}` rule of the increment schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementRule {
    pub threshold: u64,
    pub increment: u64,
}

/// Default increment schedule: +10 from 0, +50 from 200, +100 from 500.
pub fn default_increment_rules() -> Vec<IncrementRule> {
    vec![
        IncrementRule { threshold: 0, increment: 10 },
        IncrementRule { threshold: 200, increment: 50 },
        IncrementRule { threshold: 500, increment: 100 },
    ]
}

/// Default per-sport minimum opening bids.
pub fn default_sport_min_bids() -> BTreeMap<Sport, u64> {
    Sport::ALL
        .iter()
        .map(|s| (*s, DEFAULT_FLOOR_PRICE))
        .collect()
}

/// The singleton global auction state.
///
/// Persisted as exactly one row; created once at initialization and only
/// ever updated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    pub is_active: bool,
    pub is_registration_open: bool,
    pub sport_min_bids: BTreeMap<Sport, u64>,
    pub increment_rules: Vec<IncrementRule>,
    pub testgrounds_locked: bool,
    pub animation_duration: u32,
    pub animation_type: String,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            is_active: false,
            is_registration_open: true,
            sport_min_bids: default_sport_min_bids(),
            increment_rules: default_increment_rules(),
            testgrounds_locked: false,
            animation_duration: 25,
            animation_type: "confetti".to_string(),
        }
    }
}

// =========================
// DOMAIN EVENTS
// =========================

/// Terminal outcome of a lot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum LotOutcome {
    /// The lot was sold to a team at the final price.
    Sold {
        player_id: PlayerId,
        player_name: String,
        team_id: TeamId,
        team_name: String,
        amount: u64,
    },
    /// The lot was released unsold, pending manual re-approval.
    Unsold { player_id: PlayerId },
    /// The lot returns to the queue at its sport's floor price.
    Skipped {
        player_id: PlayerId,
        player_name: String,
        floor_price: u64,
    },
}

/// A state transition published to every member of the auction room.
///
/// Payloads are self-contained: no event requires a follow-up fetch to be
/// meaningful. Clients still re-fetch the current lot on reconnect since
/// delivery is at-most-once with no replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AuctionEvent {
    /// A lot was opened for bidding.
    LotStarted { player: Player, timestamp: Timestamp },

    /// A bid was accepted; it supersedes the previous leading bid.
    BidAccepted {
        player_id: PlayerId,
        player_name: String,
        team_id: TeamId,
        team_name: String,
        amount: u64,
        timestamp: Timestamp,
    },

    /// The current lot reached a terminal transition.
    LotResolved {
        #[serde(flatten)]
        outcome: LotOutcome,
        timestamp: Timestamp,
    },

    /// The active-bid list for the current lot was cleared; price returns
    /// to the floor with no leading team.
    BidReset {
        player_id: PlayerId,
        player_name: String,
        floor_price: u64,
        timestamp: Timestamp,
    },

    /// Global configuration or roster data changed; viewers should refresh
    /// leaderboard and derived views.
    ConfigChanged { timestamp: Timestamp },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sport_round_trip() {
        for sport in Sport::ALL {
            let parsed: Sport = sport.as_str().parse().unwrap();
            assert_eq!(parsed, sport);
        }
        assert!("hockey".parse::<Sport>().is_err());
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&PlayerStatus::Auctioning).unwrap();
        assert_eq!(json, "\"auctioning\"");
        let status: PlayerStatus = serde_json::from_str("\"unsold\"").unwrap();
        assert_eq!(status, PlayerStatus::Unsold);
    }

    #[test]
    fn test_event_tag_names() {
        let event = AuctionEvent::ConfigChanged { timestamp: 7 };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "config-changed");

        let event = AuctionEvent::LotResolved {
            outcome: LotOutcome::Unsold { player_id: 3 },
            timestamp: 9,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "lot-resolved");
        assert_eq!(value["outcome"], "unsold");
        assert_eq!(value["player_id"], 3);
    }

    #[test]
    fn test_default_global_state() {
        let state = GlobalState::default();
        assert!(!state.is_active);
        assert!(state.is_registration_open);
        assert_eq!(state.increment_rules[0].threshold, 0);
        assert_eq!(state.sport_min_bids[&Sport::Cricket], DEFAULT_FLOOR_PRICE);
    }

    #[test]
    fn test_validate_stats() {
        let mut stats = PlayerStats::new();
        stats.insert("batting".into(), serde_json::json!(82));
        stats.insert("style".into(), serde_json::json!("left-arm"));
        assert!(validate_stats(&stats).is_ok());

        stats.insert("nested".into(), serde_json::json!({"a": 1}));
        assert!(matches!(
            validate_stats(&stats),
            Err(StatsError::NestedValue(_))
        ));
    }
}

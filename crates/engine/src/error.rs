//! Auction engine error types.

use thiserror::Error;

use gavel_types::{PlayerId, PlayerStatus, TeamId};

/// Coarse classification used by transport layers to pick a wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input, rejected before any mutation.
    Validation,
    /// A referenced team or player does not exist.
    NotFound,
    /// The operation lost a race or the state machine is in the wrong phase.
    Conflict,
    /// The bid exceeds the team's remaining budget.
    BudgetExceeded,
    /// Unexpected persistence failure.
    Internal,
}

/// Errors that can occur in the auction engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("player {0} is already sold")]
    AlreadySold(PlayerId),

    #[error("another lot is already active: player {0}")]
    LotAlreadyActive(PlayerId),

    #[error("no lot is currently active")]
    NoActiveLot,

    #[error("player {player_id} is not the active lot (status: {status})")]
    NotAuctioning {
        player_id: PlayerId,
        status: PlayerStatus,
    },

    #[error("not enough budget: bid {amount}, remaining {remaining}")]
    BudgetExceeded { amount: u64, remaining: u64 },

    #[error("bid {amount} is below the minimum of {minimum}")]
    BidBelowMinimum { amount: u64, minimum: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuctionError {
    /// Classify into the wire-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuctionError::Validation(_) | AuctionError::BidBelowMinimum { .. } => {
                ErrorKind::Validation
            }
            AuctionError::PlayerNotFound(_) | AuctionError::TeamNotFound(_) => ErrorKind::NotFound,
            AuctionError::AlreadySold(_)
            | AuctionError::LotAlreadyActive(_)
            | AuctionError::NoActiveLot
            | AuctionError::NotAuctioning { .. } => ErrorKind::Conflict,
            AuctionError::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            AuctionError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AuctionError::BudgetExceeded {
                amount: 100,
                remaining: 40
            }
            .kind(),
            ErrorKind::BudgetExceeded
        );
        assert_eq!(AuctionError::NoActiveLot.kind(), ErrorKind::Conflict);
        assert_eq!(AuctionError::PlayerNotFound(9).kind(), ErrorKind::NotFound);
        assert_eq!(
            AuctionError::BidBelowMinimum {
                amount: 40,
                minimum: 70
            }
            .kind(),
            ErrorKind::Validation
        );
    }
}

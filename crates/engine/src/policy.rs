//! The increment/policy engine.
//!
//! Computes the minimum legal next bid from the threshold-based increment
//! schedule and resolves per-sport opening floors.

use std::collections::BTreeMap;

use gavel_types::{IncrementRule, Sport, DEFAULT_FLOOR_PRICE};

use crate::error::AuctionError;

/// Validate an increment schedule and return it sorted ascending by
/// threshold.
///
/// A schedule must be non-empty and must anchor a rule at threshold 0 so
/// every price has an applicable increment.
pub fn validate_rules(rules: &[IncrementRule]) -> Result<Vec<IncrementRule>, AuctionError> {
    if rules.is_empty() {
        return Err(AuctionError::Validation(
            "increment schedule must not be empty".to_string(),
        ));
    }
    if !rules.iter().any(|r| r.threshold == 0) {
        return Err(AuctionError::Validation(
            "increment schedule must contain a rule at threshold 0".to_string(),
        ));
    }
    if rules.iter().any(|r| r.increment == 0) {
        return Err(AuctionError::Validation(
            "increments must be positive".to_string(),
        ));
    }

    let mut sorted = rules.to_vec();
    sorted.sort_by_key(|r| r.threshold);
    sorted.dedup_by_key(|r| r.threshold);
    Ok(sorted)
}

/// The increment applicable at `price`: the increment of the highest
/// threshold rule with `threshold <= price`.
///
/// Expects a schedule that passed [`validate_rules`] (sorted, 0-anchored);
/// falls back to the base floor increment on a malformed schedule rather
/// than panicking.
pub fn increment_for(rules: &[IncrementRule], price: u64) -> u64 {
    rules
        .iter()
        .take_while(|r| r.threshold <= price)
        .last()
        .map(|r| r.increment)
        .unwrap_or(DEFAULT_FLOOR_PRICE)
}

/// Minimum legal next bid above `price`.
pub fn next_min_bid(rules: &[IncrementRule], price: u64) -> u64 {
    price.saturating_add(increment_for(rules, price))
}

/// Minimum opening bid for a sport, falling back to the global floor for
/// sports absent from the mapping.
pub fn sport_floor(min_bids: &BTreeMap<Sport, u64>, sport: Sport) -> u64 {
    min_bids.get(&sport).copied().unwrap_or(DEFAULT_FLOOR_PRICE)
}

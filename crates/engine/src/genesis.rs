//! Initial configuration for the auction system.
//!
//! Defines the state the singleton global row is created with, and the
//! defaults applied to newly seeded teams.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gavel_types::{
    default_increment_rules, default_sport_min_bids, GlobalState, IncrementRule, Sport,
    DEFAULT_TEAM_BUDGET,
};

use crate::policy;
use crate::state::LedgerState;

/// Genesis configuration for the auction system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Budget assigned to teams created without an explicit allocation.
    pub default_team_budget: u64,

    /// Per-sport minimum opening bids.
    pub sport_min_bids: BTreeMap<Sport, u64>,

    /// Increment schedule, any order; stored sorted.
    pub increment_rules: Vec<IncrementRule>,

    /// Whether registration starts open.
    pub registration_open: bool,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            default_team_budget: DEFAULT_TEAM_BUDGET,
            sport_min_bids: default_sport_min_bids(),
            increment_rules: default_increment_rules(),
            registration_open: true,
        }
    }
}

impl GenesisConfig {
    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.default_team_budget == 0 {
            return Err(GenesisValidationError::InvalidBudget(
                "default team budget cannot be zero".into(),
            ));
        }
        if self.sport_min_bids.values().any(|v| *v == 0) {
            return Err(GenesisValidationError::InvalidMinBids(
                "sport minimum bids must be positive".into(),
            ));
        }
        policy::validate_rules(&self.increment_rules)
            .map_err(|e| GenesisValidationError::InvalidSchedule(e.to_string()))?;
        Ok(())
    }

    /// Build the initial ledger from this configuration.
    pub fn build(self) -> Result<LedgerState, GenesisValidationError> {
        self.validate()?;
        let sorted = policy::validate_rules(&self.increment_rules)
            .map_err(|e| GenesisValidationError::InvalidSchedule(e.to_string()))?;

        let mut state = LedgerState::new();
        state.default_team_budget = self.default_team_budget;
        state.global = GlobalState {
            is_active: false,
            is_registration_open: self.registration_open,
            sport_min_bids: self.sport_min_bids,
            increment_rules: sorted,
            ..GlobalState::default()
        };
        Ok(state)
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    #[error("invalid sport minimum bids: {0}")]
    InvalidMinBids(String),

    #[error("invalid increment schedule: {0}")]
    InvalidSchedule(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GenesisConfig::default();
        assert!(config.validate().is_ok());

        let state = config.build().unwrap();
        assert!(!state.global.is_active);
        assert!(state.global.is_registration_open);
        assert_eq!(state.global.increment_rules.len(), 3);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut config = GenesisConfig::default();
        config.default_team_budget = 0;
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidBudget(_))
        ));
    }

    #[test]
    fn test_unanchored_schedule_rejected() {
        let mut config = GenesisConfig::default();
        config.increment_rules = vec![IncrementRule { threshold: 100, increment: 10 }];
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_build_sorts_schedule() {
        let mut config = GenesisConfig::default();
        config.increment_rules = vec![
            IncrementRule { threshold: 200, increment: 50 },
            IncrementRule { threshold: 0, increment: 10 },
        ];
        let state = config.build().unwrap();
        assert_eq!(state.global.increment_rules[0].threshold, 0);
    }
}

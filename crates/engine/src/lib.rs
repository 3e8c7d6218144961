//! Auction engine for the gavel live-auction system.
//!
//! Implements the core bidding/auction transaction machinery:
//!
//! - A single-lot state machine with budget-constrained bid acceptance
//! - The in-memory ledger of teams, players, and bids
//! - A threshold-based increment schedule and per-sport opening floors
//! - Read-only views clients use to reconcile after a reconnect
//!
//! # Architecture
//!
//! - `state`: the ledger store
//! - `handlers`: business logic for each state-changing operation
//! - `policy`: increment schedule and opening-floor rules
//! - `queries`: read-only state access
//! - `genesis`: initial configuration
//! - `error`: error types
//!
//! Handlers return the domain events to publish rather than publishing
//! them; the transport layer fans events out only after the mutation has
//! committed.
//!
//! # Example
//!
//! ```
//! use gavel_engine::{handlers, GenesisConfig, OpContext};
//! use gavel_types::Sport;
//!
//! let mut state = GenesisConfig::default().build().unwrap();
//! let ctx = OpContext { timestamp: 0 };
//!
//! let (team, _) = handlers::handle_seed_team(
//!     &mut state, &ctx, "Thunder".into(), Sport::Cricket, None, None, false,
//! ).unwrap();
//! assert_eq!(team.remaining_budget, team.budget);
//! ```

pub mod error;
pub mod genesis;
pub mod handlers;
pub mod policy;
pub mod queries;
pub mod state;

pub use error::{AuctionError, ErrorKind};
pub use genesis::{GenesisConfig, GenesisValidationError};
pub use handlers::{HandlerResult, NewPlayer, OpContext};
pub use state::LedgerState;

//! Client library for the gavel live auction.
//!
//! Provides the watch/reconciliation loop used by the `gavel watch`
//! command: a WebSocket event stream with an HTTP snapshot re-fetch on
//! every (re)connect.

pub mod sync;

pub use sync::{fetch_current_lot, watch, WatchEndpoints};

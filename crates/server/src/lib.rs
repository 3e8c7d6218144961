//! JSON-RPC server and broadcast room for the gavel live auction.
//!
//! The crate is split into:
//! - [`rpc`]: the `#[rpc(server)]` API trait and its implementation over
//!   the shared ledger
//! - [`broadcast`]: the auction room, a `tokio::sync::broadcast` fan-out
//!   with publish-after-commit semantics
//! - [`types`]: request parameter objects

pub mod broadcast;
pub mod rpc;
pub mod types;

pub use broadcast::{Broadcaster, ChannelBroadcaster, NoopBroadcaster};
pub use rpc::{AuctionApiServer, AuctionServer};

//! The broadcast layer: one shared auction room.
//!
//! Every state-changing operation publishes its events here after the
//! ledger transaction has committed, never before. Delivery is
//! at-most-once and best-effort: a slow subscriber may observe a lag gap,
//! which the client reconciliation layer covers with a full-state
//! re-fetch.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use gavel_types::AuctionEvent;

/// Capacity of the room's event buffer. A subscriber further behind than
/// this observes a lag error and should re-fetch authoritative state.
const ROOM_CAPACITY: usize = 256;

/// Capability for publishing auction events to the room.
///
/// Publishing is non-critical by contract: a failed publish must never
/// fail the operation whose transaction already committed.
pub trait Broadcaster: Send + Sync + 'static {
    fn publish(&self, event: AuctionEvent);
}

/// The real room, backed by a `tokio::sync::broadcast` channel.
#[derive(Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<AuctionEvent>,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(ROOM_CAPACITY);
        Self { sender }
    }

    /// Join the room. Events published after this call are delivered to
    /// the returned receiver.
    pub fn join(&self) -> broadcast::Receiver<AuctionEvent> {
        self.sender.subscribe()
    }

    /// Number of currently connected room members.
    pub fn member_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, event: AuctionEvent) {
        // send only errors when no receiver is connected; an empty room is
        // not a failure.
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers, "event published to auction room"),
            Err(broadcast::error::SendError(event)) => {
                warn!(?event, "no subscribers connected; event dropped");
            }
        }
    }
}

/// No-op broadcaster for tests and scripts that drive the engine without
/// a room. Operations behave identically; events go nowhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn publish(&self, _event: AuctionEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_members() {
        let room = ChannelBroadcaster::new();
        let mut a = room.join();
        let mut b = room.join();

        room.publish(AuctionEvent::ConfigChanged { timestamp: 1 });

        assert_eq!(
            a.recv().await.unwrap(),
            AuctionEvent::ConfigChanged { timestamp: 1 }
        );
        assert_eq!(
            b.recv().await.unwrap(),
            AuctionEvent::ConfigChanged { timestamp: 1 }
        );
    }

    #[tokio::test]
    async fn test_publish_to_empty_room_does_not_panic() {
        let room = ChannelBroadcaster::new();
        room.publish(AuctionEvent::ConfigChanged { timestamp: 1 });
        assert_eq!(room.member_count(), 0);
    }

    #[tokio::test]
    async fn test_late_joiner_misses_earlier_events() {
        let room = ChannelBroadcaster::new();
        room.publish(AuctionEvent::ConfigChanged { timestamp: 1 });

        let mut late = room.join();
        room.publish(AuctionEvent::ConfigChanged { timestamp: 2 });

        // No replay: the first event observed is the one published after
        // joining.
        assert_eq!(
            late.recv().await.unwrap(),
            AuctionEvent::ConfigChanged { timestamp: 2 }
        );
    }
}

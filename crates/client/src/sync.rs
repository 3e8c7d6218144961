//! The watch loop: live event stream with reconnect reconciliation.
//!
//! Broadcast delivery is best-effort, so a watcher that disconnects or
//! lags has no replay to rely on. The loop therefore re-fetches the
//! authoritative current-lot view over HTTP on every (re)connect before
//! resuming the WebSocket stream.

use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::WsClientBuilder;
use tracing::{info, warn};

use gavel_engine::queries::CurrentLotView;
use gavel_types::AuctionEvent;

/// Delay between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Endpoints of one auction server. The server serves HTTP and WebSocket
/// on the same listen address.
#[derive(Debug, Clone)]
pub struct WatchEndpoints {
    pub http_url: String,
    pub ws_url: String,
}

impl WatchEndpoints {
    /// Derive both endpoints from a single `host:port` authority.
    pub fn from_authority(authority: &str) -> Self {
        Self {
            http_url: format!("http://{authority}"),
            ws_url: format!("ws://{authority}"),
        }
    }
}

/// Watch the auction room forever, invoking the callbacks for the
/// snapshot taken at each (re)connect and for every streamed event.
/// Any failure, including a callback error, triggers a reconnect.
pub async fn watch<S, E>(
    endpoints: &WatchEndpoints,
    mut on_snapshot: S,
    mut on_event: E,
) -> Result<()>
where
    S: FnMut(&CurrentLotView) -> Result<()>,
    E: FnMut(&AuctionEvent) -> Result<()>,
{
    loop {
        match watch_session(endpoints, &mut on_snapshot, &mut on_event).await {
            Ok(()) => info!("auction room connection closed; reconnecting"),
            Err(err) => warn!(%err, "auction room connection failed; reconnecting"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// One connect-snapshot-stream cycle. Ends when the subscription closes.
async fn watch_session<S, E>(
    endpoints: &WatchEndpoints,
    on_snapshot: &mut S,
    on_event: &mut E,
) -> Result<()>
where
    S: FnMut(&CurrentLotView) -> Result<()>,
    E: FnMut(&AuctionEvent) -> Result<()>,
{
    // Subscribe first, then snapshot. An event that lands between the
    // snapshot and the first poll is newer than the snapshot, never
    // older, so the watcher only ever re-observes, never misses.
    let ws = WsClientBuilder::default().build(&endpoints.ws_url).await?;
    let mut events: Subscription<AuctionEvent> = ws
        .subscribe(
            "auction_subscribeEvents",
            rpc_params![],
            "auction_unsubscribeEvents",
        )
        .await?;

    let snapshot = fetch_current_lot(&endpoints.http_url).await?;
    on_snapshot(&snapshot)?;

    while let Some(next) = events.next().await {
        match next {
            Ok(event) => on_event(&event)?,
            Err(err) => {
                warn!(%err, "undecodable auction event; skipped");
            }
        }
    }
    Ok(())
}

/// Fetch the authoritative current-lot view over HTTP.
pub async fn fetch_current_lot(http_url: &str) -> Result<CurrentLotView> {
    let client: HttpClient = HttpClientBuilder::default().build(http_url)?;
    let view: CurrentLotView = client.request("query_currentLot", rpc_params![]).await?;
    Ok(view)
}

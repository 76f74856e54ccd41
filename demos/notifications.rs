//! Live notification and comment feed for a single asset.
//!
//! Connects to the live endpoint, subscribes to an asset channel plus the
//! current user's notification channel, and prints events as they arrive.
//!
//! Run with tracing enabled:
//! ```sh
//! ASSETWIRE_TOKEN=... RUST_LOG=info cargo run --example notifications
//! ```

use std::sync::Arc;
use std::time::Duration;

use assetwire_live_sdk::auth::StaticCredentials;
use assetwire_live_sdk::live::{Client, Config};
use assetwire_live_sdk::types::{Channel, EventType};
use tokio::time::sleep;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let token = std::env::var("ASSETWIRE_TOKEN")?;
    let credentials = Arc::new(StaticCredentials::new(token));

    let client = Client::new(
        "wss://live.assetwire.io/ws",
        credentials,
        Config::default(),
    )?;

    client.on(EventType::NotificationNew, |data| {
        info!(event = "notification.new", %data);
    });
    client.on(EventType::CommentAdded, |data| {
        info!(event = "comment_added", %data);
    });
    client.on(EventType::AssetUpdated, |data| {
        info!(event = "asset_updated", %data);
    });

    client.subscribe_to_channel(Channel::asset(42))?;
    client.subscribe_to_channel(Channel::user("me"))?;

    client.connect()?;

    let mut state_rx = client.state_receiver();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow_and_update();
            info!(?state, "connection state changed");
        }
    });

    // Let events flow for a while, then shut down cleanly.
    sleep(Duration::from_secs(60)).await;
    client.disconnect().await;

    Ok(())
}

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use url::Url;

use super::channels::ChannelRegistry;
use super::config::Config;
use super::connection::{ConnectionManager, ConnectionState};
use super::frame::Frame;
use super::router::{EventRouter, HandlerId};
use crate::Result;
use crate::auth::CredentialProvider;
use crate::error::Error;
use crate::types::{Channel, EventType};

/// Client for the live-update connection of the AssetWire backend.
///
/// One client owns one logical connection. Channel subscriptions and event
/// handlers are registered on the client and survive reconnects; the
/// connection itself is started with [`connect`](Self::connect) and torn
/// down with [`disconnect`](Self::disconnect).
///
/// # Examples
///
/// ```rust, no_run
/// use std::sync::Arc;
///
/// use assetwire_live_sdk::auth::StaticCredentials;
/// use assetwire_live_sdk::live::{Client, Config};
/// use assetwire_live_sdk::types::{Channel, EventType};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let credentials = Arc::new(StaticCredentials::new("access-token"));
///     let client = Client::new("wss://live.assetwire.io/ws", credentials, Config::default())?;
///
///     client.on(EventType::CommentAdded, |data| {
///         println!("comment: {data}");
///     });
///     client.subscribe_to_channel(Channel::asset(42))?;
///     client.connect()?;
///
///     // ... application runs; events arrive through the handler ...
///
///     client.disconnect().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

struct ClientInner {
    /// Source of the access token, queried fresh on every connect
    credentials: Arc<dyn CredentialProvider>,
    /// Handler registrations, independent of connection state
    router: Arc<EventRouter>,
    /// Active channel set, independent of connection state
    channels: Arc<ChannelRegistry>,
    /// The one component that talks to the transport
    connection: ConnectionManager,
}

impl Client {
    /// Create a new client for the given live endpoint.
    ///
    /// The endpoint must be a `ws://` or `wss://` URL; the access token is
    /// appended as a query parameter at connect time. No connection is
    /// attempted until [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns a validation error when the endpoint is not a valid
    /// WebSocket URL.
    pub fn new(
        endpoint: &str,
        credentials: Arc<dyn CredentialProvider>,
        config: Config,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::validation(
                "live endpoint must use the ws or wss scheme",
            ));
        }

        let router = Arc::new(EventRouter::new());
        let channels = Arc::new(ChannelRegistry::new());
        let connection = ConnectionManager::new(
            endpoint,
            config,
            Arc::clone(&router),
            Arc::clone(&channels),
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                credentials,
                router,
                channels,
                connection,
            }),
        })
    }

    /// Open the live connection.
    ///
    /// Fetches a fresh access token from the credential provider and starts
    /// the background connection loop. A no-op when already connecting or
    /// connected. All results arrive asynchronously: observe
    /// [`state_receiver`](Self::state_receiver) or register handlers.
    ///
    /// # Errors
    ///
    /// Returns an auth error when no access token is available (the state
    /// stays idle and nothing is retried), or a validation error when the
    /// connection previously failed permanently and `disconnect()` has not
    /// been called since.
    pub fn connect(&self) -> Result<()> {
        let token = self
            .inner
            .credentials
            .access_token()
            .ok_or_else(|| Error::auth("no access token available"))?;
        self.inner.connection.connect(&token)
    }

    /// Close the live connection and return to idle.
    ///
    /// Idempotent. Cancels an in-flight connect and any pending reconnect;
    /// no further connection attempt occurs until a new
    /// [`connect`](Self::connect) call. Registered channels and handlers are
    /// kept.
    pub async fn disconnect(&self) {
        self.inner.connection.disconnect().await;
    }

    /// Register a handler for frames of the given event type.
    ///
    /// Handlers for the same type run in registration order and stay
    /// registered across reconnects. The returned id removes the
    /// registration via [`off`](Self::off).
    pub fn on<F>(&self, event: EventType, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.router.on(event, handler)
    }

    /// Remove a previously registered handler. Returns `false` when the
    /// registration no longer exists.
    pub fn off(&self, event: &EventType, id: HandlerId) -> bool {
        self.inner.router.off(event, id)
    }

    /// Add a channel to the active set.
    ///
    /// When the connection is open the `subscribe` control frame is sent
    /// immediately; otherwise the channel is recorded and replayed on the
    /// next successful open. Subscribing to an already-active channel is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an error when the control frame cannot be serialized.
    pub fn subscribe_to_channel(&self, channel: impl Into<Channel>) -> Result<()> {
        let channel = channel.into();
        if self.inner.channels.add(channel.clone()) {
            self.inner
                .connection
                .send_if_open(&Frame::subscribe(&channel))?;
        }
        Ok(())
    }

    /// Remove a channel from the active set.
    ///
    /// When the connection is open the `unsubscribe` control frame is sent
    /// immediately. Removing an inactive channel is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error when the control frame cannot be serialized.
    pub fn unsubscribe_from_channel(&self, channel: &Channel) -> Result<()> {
        if self.inner.channels.remove(channel) {
            self.inner
                .connection
                .send_if_open(&Frame::unsubscribe(channel))?;
        }
        Ok(())
    }

    /// Whether the connection is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.state().is_open()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Subscribe to connection state changes.
    ///
    /// The read-only connectivity signal: collaborators watch it to render
    /// connected/not-connected and to observe permanent failure.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state_receiver()
    }

    /// The currently active channels, in no particular order.
    #[must_use]
    pub fn active_channels(&self) -> Vec<Channel> {
        self.inner.channels.snapshot()
    }

    /// Number of active channel subscriptions.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }

    /// Number of inbound frames discarded because they failed to parse.
    #[must_use]
    pub fn dropped_frame_count(&self) -> u64 {
        self.inner.connection.dropped_frame_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticCredentials;
    use crate::error::Kind;

    fn client() -> Client {
        Client::new(
            "wss://live.assetwire.io/ws",
            Arc::new(StaticCredentials::new("tok")),
            Config::default(),
        )
        .expect("valid endpoint should produce a client")
    }

    #[test]
    fn rejects_non_websocket_endpoints() {
        let credentials = Arc::new(StaticCredentials::new("tok"));
        let err = Client::new("https://live.assetwire.io", credentials, Config::default())
            .expect_err("https endpoint must be rejected");
        assert_eq!(err.kind(), Kind::Validation);
    }

    #[test]
    fn starts_idle_with_no_channels() {
        let client = client();
        assert!(!client.is_connected());
        assert_eq!(client.connection_state(), ConnectionState::Idle);
        assert_eq!(client.channel_count(), 0);
        assert_eq!(client.dropped_frame_count(), 0);
    }

    #[test]
    fn channel_mutations_work_while_idle() {
        let client = client();
        let channel = Channel::asset(42);

        client
            .subscribe_to_channel(channel.clone())
            .expect("offline subscribe should be recorded");
        // Duplicate subscribe is a no-op, not a second registration.
        client
            .subscribe_to_channel(channel.clone())
            .expect("duplicate subscribe is a no-op");
        assert_eq!(client.channel_count(), 1);
        assert_eq!(client.active_channels(), vec![channel.clone()]);

        client
            .unsubscribe_from_channel(&channel)
            .expect("offline unsubscribe should be recorded");
        assert_eq!(client.channel_count(), 0);
    }

    #[test]
    fn handlers_register_without_a_connection() {
        let client = client();
        let id = client.on(EventType::NotificationNew, |_| {});
        assert!(client.off(&EventType::NotificationNew, id));
        assert!(!client.off(&EventType::NotificationNew, id));
    }
}
